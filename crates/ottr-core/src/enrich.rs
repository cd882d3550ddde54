//! Metadata enrichment for sparse episode listings
//!
//! Episode lists from most providers carry only a name and a play
//! command. The series detail endpoint returns a richer `episodesMeta`
//! side list; this module joins the two by (season, episode number)
//! first and normalized title second, filling only fields the episode
//! does not already have. The whole pass is pure, synchronous and
//! idempotent.

use crate::types::{Detail, Episode, EpisodeMeta};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn sxe_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)s\s*([0-9]{1,2})\s*e\s*([0-9]{1,3})").expect("static regex"))
}

fn nxn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)([0-9]{1,2})\s*x\s*([0-9]{1,3})").expect("static regex"))
}

fn season_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)season\s*([0-9]{1,2})").expect("static regex"))
}

fn episode_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:episode|ep)\s*([0-9]{1,3})").expect("static regex"))
}

fn title_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:season\s*\d+|s\d+\s*e\d+|s\d+|\d+\s*x\s*\d+)\s*[-:]\s*",
        )
        .expect("static regex")
    })
}

/// Lowercase, alphanumeric-and-space only, collapsed whitespace
pub fn normalize_title(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_space = true;
    for c in value.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim().to_string()
}

/// Strip leading `Season N -`, `SxxEyy -`, `Sxx -`, `NNxNN -` prefixes
/// from an episode display name
pub fn clean_episode_title(value: &str) -> String {
    title_prefix_re().replace(value, "").trim().to_string()
}

fn capture_u32(re: &Regex, text: &str, group: usize) -> Option<u32> {
    re.captures(text)
        .and_then(|c| c.get(group))
        .and_then(|m| m.as_str().parse().ok())
}

/// Season number for an episode.
///
/// Precedence: explicit field, then `SxxEyy`, then `NNxNN`, then a
/// textual `season N`. First numeric match wins; ambiguous names are
/// deliberately not second-guessed.
pub fn resolve_season(episode: &Episode) -> Option<u32> {
    if let Some(season) = episode.season {
        return Some(season);
    }
    let name = &episode.item.name;
    capture_u32(sxe_re(), name, 1)
        .or_else(|| capture_u32(nxn_re(), name, 1))
        .or_else(|| capture_u32(season_word_re(), name, 1))
}

/// Episode number, with the same precedence as [`resolve_season`]
/// (`episode N` / `ep N` as the textual form).
pub fn resolve_episode_number(episode: &Episode) -> Option<u32> {
    if let Some(num) = episode.episode_num {
        return Some(num);
    }
    let name = &episode.item.name;
    capture_u32(sxe_re(), name, 2)
        .or_else(|| capture_u32(nxn_re(), name, 2))
        .or_else(|| capture_u32(episode_word_re(), name, 1))
}

/// Distinct season numbers present in a list, sorted ascending.
/// Drives the season selector tabs.
pub fn season_tabs(episodes: &[Episode]) -> Vec<u32> {
    let mut seasons: Vec<u32> = episodes.iter().filter_map(resolve_season).collect();
    seasons.sort_unstable();
    seasons.dedup();
    seasons
}

/// Join an episode list against a detail's `episodesMeta`.
///
/// Exact (season, episode) matches are preferred over normalized-title
/// matches; episodes with no match are returned unchanged. Only blank
/// fields are filled, which makes the pass idempotent:
/// `enrich(enrich(e, m), m) == enrich(e, m)`.
pub fn enrich_episodes(episodes: Vec<Episode>, detail: &Detail) -> Vec<Episode> {
    if episodes.is_empty() || detail.episodes_meta.is_empty() {
        return episodes;
    }

    let mut by_season_episode: HashMap<(u32, u32), &EpisodeMeta> = HashMap::new();
    let mut by_title: HashMap<String, &EpisodeMeta> = HashMap::new();
    for meta in &detail.episodes_meta {
        if let (Some(season), Some(num)) = (meta.season, meta.episode_num) {
            by_season_episode.entry((season, num)).or_insert(meta);
        }
        let key = normalize_title(&meta.title);
        if !key.is_empty() {
            by_title.entry(key).or_insert(meta);
        }
    }

    episodes
        .into_iter()
        .map(|mut episode| {
            let season = resolve_season(&episode);
            let number = resolve_episode_number(&episode);
            let meta = match (season, number) {
                (Some(s), Some(n)) => by_season_episode.get(&(s, n)).copied(),
                _ => None,
            }
            .or_else(|| {
                let key = normalize_title(&clean_episode_title(&episode.item.name));
                by_title.get(&key).copied()
            });

            if let Some(meta) = meta {
                if episode.item.logo.is_empty() {
                    episode.item.logo = meta.logo.clone();
                }
                if episode.description.is_empty() {
                    episode.description = meta.plot.clone();
                }
                if episode.release_date.is_empty() {
                    episode.release_date = meta.release_date.clone();
                }
                if episode.season.is_none() {
                    episode.season = meta.season;
                }
                if episode.episode_num.is_none() {
                    episode.episode_num = meta.episode_num;
                }
            }
            episode
        })
        .collect()
}
