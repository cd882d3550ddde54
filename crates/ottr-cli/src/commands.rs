//! CLI command implementations

use crate::output;
use anyhow::{bail, Context};
use console::style;
use ottr_core::{
    enrich::{enrich_episodes, resolve_episode_number, resolve_season, season_tabs},
    fallback_plan, select_backend, sort_accounts, with_synthetic_all_category, Api, BackendKind,
    ClientConfig, ContentMode, Detail, DeviceCapabilities, HttpApi, PlayRequest, PlayableItem,
};
use tabled::Tabled;
use url::Url;

fn api_for(server: &str) -> anyhow::Result<HttpApi> {
    let config = ClientConfig {
        base_url: Url::parse(server).context("invalid server URL")?,
        ..ClientConfig::default()
    };
    Ok(HttpApi::new(&config)?)
}

fn parse_mode(mode: &str) -> anyhow::Result<ContentMode> {
    match mode.to_lowercase().as_str() {
        "itv" | "live" => Ok(ContentMode::Itv),
        "vod" | "movies" => Ok(ContentMode::Vod),
        "series" => Ok(ContentMode::Series),
        other => bail!("unknown mode '{other}' (expected itv, vod or series)"),
    }
}

#[derive(Tabled, serde::Serialize)]
struct AccountRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Pinned")]
    pinned: bool,
}

/// List configured accounts
pub async fn accounts(server: &str, format: &str) -> anyhow::Result<()> {
    let api = api_for(server)?;
    let mut accounts = api.accounts().await?;
    sort_accounts(&mut accounts);

    let rows: Vec<AccountRow> = accounts
        .iter()
        .map(|a| AccountRow {
            id: a.db_id.clone(),
            name: a.name.clone(),
            kind: format!("{:?}", a.kind),
            pinned: a.pin_to_top,
        })
        .collect();
    output::print_rows(&rows, format);
    Ok(())
}

#[derive(Tabled, serde::Serialize)]
struct CategoryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
}

/// List categories for an account, including the synthetic "All"
pub async fn categories(
    server: &str,
    account_id: &str,
    mode: &str,
    format: &str,
) -> anyhow::Result<()> {
    let api = api_for(server)?;
    let mode = parse_mode(mode)?;

    let account = api
        .accounts()
        .await?
        .into_iter()
        .find(|a| a.db_id == account_id)
        .with_context(|| format!("no account with id {account_id}"))?;

    let categories = api.categories(account_id, mode).await?;
    let categories = with_synthetic_all_category(categories, account.kind);

    let rows: Vec<CategoryRow> = categories
        .iter()
        .map(|c| CategoryRow { id: c.id.clone(), title: c.title.clone() })
        .collect();
    output::print_rows(&rows, format);
    Ok(())
}

#[derive(Tabled, serde::Serialize)]
struct ChannelRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "DRM")]
    drm: bool,
}

/// List channel entries in a category
pub async fn channels(
    server: &str,
    account_id: &str,
    category_id: &str,
    mode: &str,
    limit: usize,
    format: &str,
) -> anyhow::Result<()> {
    let api = api_for(server)?;
    let mode = parse_mode(mode)?;
    let items = api.channels(category_id, account_id, mode, None).await?;

    let total = items.len();
    let rows: Vec<ChannelRow> = items
        .iter()
        .take(limit)
        .map(|i| ChannelRow {
            id: i.identifier().to_string(),
            name: i.name.clone(),
            drm: i.descriptor.has_drm(),
        })
        .collect();
    output::print_rows(&rows, format);
    if total > limit {
        println!("{}", style(format!("... and {} more", total - limit)).dim());
    }
    Ok(())
}

#[derive(Tabled, serde::Serialize)]
struct EpisodeRow {
    #[tabled(rename = "S")]
    season: String,
    #[tabled(rename = "E")]
    episode: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Aired")]
    aired: String,
}

/// List episodes of a series, enriched from its detail metadata
pub async fn episodes(
    server: &str,
    account_id: &str,
    series_id: &str,
    series_name: &str,
    season: Option<u32>,
    format: &str,
) -> anyhow::Result<()> {
    let api = api_for(server)?;

    let details = api.series_details(series_id, account_id, series_name).await?;
    let episodes = if details.episodes.is_empty() {
        api.series_episodes(series_id, account_id).await?
    } else {
        details.episodes.clone()
    };

    let mut detail = Detail::default();
    if let Some(info) = details.season_info {
        detail = info;
    }
    detail.episodes_meta = details.episodes_meta;
    let episodes = enrich_episodes(episodes, &detail);

    let tabs = season_tabs(&episodes);
    if tabs.len() > 1 {
        println!(
            "{}",
            style(format!(
                "Seasons: {}",
                tabs.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
            ))
            .bold()
        );
    }

    let rows: Vec<EpisodeRow> = episodes
        .iter()
        .filter(|e| season.map_or(true, |s| resolve_season(e).unwrap_or(1) == s))
        .map(|e| EpisodeRow {
            season: resolve_season(e).map(|s| s.to_string()).unwrap_or_default(),
            episode: resolve_episode_number(e).map(|n| n.to_string()).unwrap_or_default(),
            title: e.item.name.clone(),
            aired: e.release_date.clone(),
        })
        .collect();
    output::print_rows(&rows, format);
    Ok(())
}

/// Resolve an item against the backend and print the playback plan
pub async fn resolve(
    server: &str,
    account_id: &str,
    category_id: &str,
    channel_id: &str,
    mode: &str,
    format: &str,
) -> anyhow::Result<()> {
    let api = api_for(server)?;
    let mode = parse_mode(mode)?;

    let item = ottr_core::Item { db_id: channel_id.to_string(), ..Default::default() };
    let playable = PlayableItem::Channel {
        item,
        account_id: account_id.to_string(),
        category_id: category_id.to_string(),
        mode,
    };
    let response = api.resolve_player(&PlayRequest::for_item(&playable)).await?;

    if response.url.trim().is_empty() {
        bail!("backend returned no playback URL");
    }

    println!("{} {}", style("URL:").bold(), response.url);
    if let Some(drm) = &response.drm {
        println!("{} {}", style("DRM:").bold(), drm.scheme);
        if let Some(license) = &drm.license_url {
            println!("{} {}", style("License:").bold(), license);
        }
    }
    print_plan(&response.url, response.drm.is_some(), true, false, format);
    Ok(())
}

/// Offline playback plan for a raw URL
pub fn plan(
    url: &str,
    drm: bool,
    native_hls: bool,
    hevc: bool,
    format: &str,
) -> anyhow::Result<()> {
    print_plan(url, drm, native_hls, hevc, format);
    Ok(())
}

#[derive(serde::Serialize)]
struct PlanReport {
    backend: Option<String>,
    fallback: Vec<String>,
}

fn print_plan(url: &str, drm: bool, native_hls: bool, hevc: bool, format: &str) {
    let caps = DeviceCapabilities { native_hls, hevc, avc: true };
    let backend = select_backend(url, None, drm, &caps);

    let fallback: Vec<String> = match backend {
        Some(BackendKind::Native) => fallback_plan(url)
            .iter()
            .map(|step| step.describe().to_string())
            .collect(),
        _ => Vec::new(),
    };

    if format == "json" {
        let report = PlanReport { backend: backend.map(|b| b.to_string()), fallback };
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
        return;
    }

    match backend {
        Some(kind) => println!("{} {}", style("Backend:").bold(), kind),
        None => println!("{}", style("Backend: none (unplayable)").red()),
    }
    if !fallback.is_empty() {
        println!("{} {}", style("Fallback:").bold(), fallback.join(" -> "));
    }
}

#[derive(Tabled, serde::Serialize)]
struct BookmarkRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Mode")]
    mode: String,
}

/// List server-side bookmarks
pub async fn bookmarks(server: &str, format: &str) -> anyhow::Result<()> {
    let api = api_for(server)?;
    let bookmarks = api.bookmarks().await?;

    let rows: Vec<BookmarkRow> = bookmarks
        .iter()
        .map(|b| BookmarkRow {
            id: b.db_id.clone(),
            category: b.category_id.clone(),
            account: b.account_name.clone(),
            name: b.channel_name.clone(),
            mode: b.mode.map(|m| m.to_string()).unwrap_or_else(|| "itv".to_string()),
        })
        .collect();
    output::print_rows(&rows, format);
    Ok(())
}
