//! Backend HTTP contract
//!
//! The aggregator backend is an external collaborator with a fixed
//! surface; this module wraps it behind the [`Api`] trait so the
//! controllers can be driven by a mock in tests. All responses are
//! plain JSON; a non-2xx status maps to [`Error::Status`] and malformed
//! bodies map to [`Error::Decode`], both recoverable.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::{
    Account, Bookmark, BookmarkCategory, Category, ContentMode, Detail, Episode, Item,
    PlayableItem, PlayerResponse,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Everything the client needs to resolve a concrete stream for an item
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayRequest {
    pub account_id: String,
    pub category_id: String,
    pub mode: Option<ContentMode>,
    pub channel_id: String,
    pub series_id: Option<String>,
    pub bookmark_id: Option<String>,
    pub name: String,
    pub logo: String,
    pub cmd: String,
    pub drm_type: String,
    pub drm_license_url: String,
    pub clear_keys_json: String,
    pub inputstream_addon: String,
    pub manifest_type: String,
}

impl PlayRequest {
    /// Build the request for a playable item.
    ///
    /// Items with a stable db id send only that id and let the backend
    /// look the rest up; items without one carry the full descriptor.
    /// Bookmarks are resolved purely by bookmark id.
    pub fn for_item(item: &PlayableItem) -> Self {
        match item {
            PlayableItem::Bookmark { bookmark } => Self {
                bookmark_id: Some(bookmark.db_id.clone()),
                mode: bookmark.mode,
                ..Self::default()
            },
            PlayableItem::Channel { item, account_id, category_id, mode } => {
                Self::for_raw_item(item, account_id, category_id, *mode, None)
            }
            PlayableItem::SeriesItem { item, account_id, category_id } => Self::for_raw_item(
                item,
                account_id,
                category_id,
                ContentMode::Series,
                Some(item.channel_id.clone()),
            ),
            PlayableItem::Episode { episode, account_id, category_id, series_id } => {
                Self::for_raw_item(
                    &episode.item,
                    account_id,
                    category_id,
                    ContentMode::Series,
                    Some(series_id.clone()),
                )
            }
        }
    }

    fn for_raw_item(
        item: &Item,
        account_id: &str,
        category_id: &str,
        mode: ContentMode,
        series_id: Option<String>,
    ) -> Self {
        let mut request = Self {
            account_id: account_id.to_string(),
            category_id: category_id.to_string(),
            mode: Some(mode),
            series_id,
            ..Self::default()
        };
        if !item.db_id.is_empty() {
            request.channel_id = item.db_id.clone();
        } else {
            request.channel_id = item.channel_id.clone();
            request.name = item.name.clone();
            request.logo = item.logo.clone();
            request.cmd = item.descriptor.cmd.clone();
            request.drm_type = item.descriptor.drm_type.clone().unwrap_or_default();
            request.drm_license_url = item.descriptor.drm_license_url.clone().unwrap_or_default();
            request.clear_keys_json = item.descriptor.clear_keys_json.clone().unwrap_or_default();
            request.inputstream_addon = item.descriptor.inputstream_addon.clone().unwrap_or_default();
            request.manifest_type = item
                .descriptor
                .manifest_type
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
        }
        request
    }

    /// Query pairs in backend parameter naming, including the legacy
    /// `streamType`/`action` compatibility parameters.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(bookmark_id) = &self.bookmark_id {
            pairs.push(("bookmarkId", bookmark_id.clone()));
        } else {
            pairs.push(("accountId", self.account_id.clone()));
            pairs.push(("categoryId", self.category_id.clone()));
            pairs.push(("channelId", self.channel_id.clone()));
            if let Some(series_id) = &self.series_id {
                pairs.push(("seriesId", series_id.clone()));
            }
            if !self.name.is_empty() {
                pairs.push(("name", self.name.clone()));
                pairs.push(("logo", self.logo.clone()));
                pairs.push(("cmd", self.cmd.clone()));
                pairs.push(("drmType", self.drm_type.clone()));
                pairs.push(("drmLicenseUrl", self.drm_license_url.clone()));
                pairs.push(("clearKeysJson", self.clear_keys_json.clone()));
                pairs.push(("inputstreamaddon", self.inputstream_addon.clone()));
                pairs.push(("manifestType", self.manifest_type.clone()));
            }
        }
        let mode = self.mode.unwrap_or(ContentMode::Itv);
        pairs.push(("mode", mode.as_str().to_string()));
        pairs.push(("streamType", mode.stream_type().to_string()));
        pairs.push(("action", mode.as_str().to_string()));
        pairs
    }
}

/// Body of a bookmark creation request
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBookmark {
    pub account_id: String,
    pub category_id: String,
    pub mode: String,
    pub channel_id: String,
    pub name: String,
    pub logo: String,
    pub cmd: String,
    pub drm_type: String,
    pub drm_license_url: String,
    pub clear_keys_json: String,
    pub inputstreamaddon: String,
    pub manifest_type: String,
}

/// Body of a bookmark reorder request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkOrder {
    pub category_id: String,
    pub ordered_bookmark_db_ids: Vec<String>,
}

/// Aggregator backend surface
#[async_trait]
pub trait Api: Send + Sync {
    async fn accounts(&self) -> Result<Vec<Account>>;

    async fn categories(&self, account_id: &str, mode: ContentMode) -> Result<Vec<Category>>;

    /// Channel/movie/series list for a category. The `movie_id` variant
    /// returns a series' child episode list on non-API portals.
    async fn channels(
        &self,
        category_id: &str,
        account_id: &str,
        mode: ContentMode,
        movie_id: Option<&str>,
    ) -> Result<Vec<Item>>;

    /// Episode list for API-style accounts
    async fn series_episodes(&self, series_id: &str, account_id: &str) -> Result<Vec<Episode>>;

    async fn series_details(
        &self,
        series_id: &str,
        account_id: &str,
        series_name: &str,
    ) -> Result<SeriesDetailsResponse>;

    async fn vod_details(
        &self,
        account_id: &str,
        category_id: &str,
        channel_id: &str,
        vod_name: &str,
    ) -> Result<VodDetailsResponse>;

    async fn bookmarks(&self) -> Result<Vec<Bookmark>>;

    async fn bookmark_categories(&self) -> Result<Vec<BookmarkCategory>>;

    async fn add_bookmark(&self, bookmark: &NewBookmark) -> Result<()>;

    async fn delete_bookmark(&self, bookmark_id: &str) -> Result<()>;

    async fn reorder_bookmarks(&self, order: &BookmarkOrder) -> Result<()>;

    /// Hand the backend a full playback descriptor; receive the
    /// resolved, time-limited stream locator and optional DRM block.
    async fn resolve_player(&self, request: &PlayRequest) -> Result<PlayerResponse>;
}

/// Series detail envelope
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SeriesDetailsResponse {
    #[serde(rename = "seasonInfo", default)]
    pub season_info: Option<Detail>,
    #[serde(rename = "episodesMeta", default)]
    pub episodes_meta: Vec<crate::types::EpisodeMeta>,
    /// Some portals return the episode list here instead of the
    /// channels endpoint
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

/// VOD detail envelope
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct VodDetailsResponse {
    #[serde(rename = "vodInfo", default)]
    pub vod_info: Option<Detail>,
}

/// `reqwest`-backed implementation of [`Api`]
pub struct HttpApi {
    client: Client,
    base_url: Url,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self { client, base_url: config.base_url.clone() })
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = self.endpoint(path, params)?;
        debug!(%url, "GET");
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Backend returned error status");
            return Err(Error::Status { status: status.as_u16(), url: url.to_string() });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::decode(url, e))
    }

    async fn send_checked(&self, request: reqwest::RequestBuilder, url: &Url) -> Result<()> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status { status: status.as_u16(), url: url.to_string() });
        }
        Ok(())
    }
}

#[async_trait]
impl Api for HttpApi {
    #[instrument(skip(self))]
    async fn accounts(&self) -> Result<Vec<Account>> {
        self.get_json("/accounts", &[]).await
    }

    #[instrument(skip(self))]
    async fn categories(&self, account_id: &str, mode: ContentMode) -> Result<Vec<Category>> {
        self.get_json(
            "/categories",
            &[("accountId", account_id.to_string()), ("mode", mode.as_str().to_string())],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn channels(
        &self,
        category_id: &str,
        account_id: &str,
        mode: ContentMode,
        movie_id: Option<&str>,
    ) -> Result<Vec<Item>> {
        let mut params = vec![
            ("categoryId", category_id.to_string()),
            ("accountId", account_id.to_string()),
            ("mode", mode.as_str().to_string()),
        ];
        if let Some(movie_id) = movie_id {
            params.push(("movieId", movie_id.to_string()));
        }
        self.get_json("/channels", &params).await
    }

    #[instrument(skip(self))]
    async fn series_episodes(&self, series_id: &str, account_id: &str) -> Result<Vec<Episode>> {
        self.get_json(
            "/seriesEpisodes",
            &[("seriesId", series_id.to_string()), ("accountId", account_id.to_string())],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn series_details(
        &self,
        series_id: &str,
        account_id: &str,
        series_name: &str,
    ) -> Result<SeriesDetailsResponse> {
        self.get_json(
            "/seriesDetails",
            &[
                ("seriesId", series_id.to_string()),
                ("accountId", account_id.to_string()),
                ("seriesName", series_name.to_string()),
            ],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn vod_details(
        &self,
        account_id: &str,
        category_id: &str,
        channel_id: &str,
        vod_name: &str,
    ) -> Result<VodDetailsResponse> {
        self.get_json(
            "/vodDetails",
            &[
                ("accountId", account_id.to_string()),
                ("categoryId", category_id.to_string()),
                ("channelId", channel_id.to_string()),
                ("vodName", vod_name.to_string()),
            ],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn bookmarks(&self) -> Result<Vec<Bookmark>> {
        self.get_json("/bookmarks", &[]).await
    }

    #[instrument(skip(self))]
    async fn bookmark_categories(&self) -> Result<Vec<BookmarkCategory>> {
        self.get_json("/bookmarks", &[("view", "categories".to_string())]).await
    }

    #[instrument(skip(self, bookmark))]
    async fn add_bookmark(&self, bookmark: &NewBookmark) -> Result<()> {
        let url = self.endpoint("/bookmarks", &[])?;
        self.send_checked(self.client.post(url.clone()).json(bookmark), &url).await
    }

    #[instrument(skip(self))]
    async fn delete_bookmark(&self, bookmark_id: &str) -> Result<()> {
        let url = self.endpoint("/bookmarks", &[("bookmarkId", bookmark_id.to_string())])?;
        self.send_checked(self.client.delete(url.clone()), &url).await
    }

    #[instrument(skip(self, order))]
    async fn reorder_bookmarks(&self, order: &BookmarkOrder) -> Result<()> {
        let url = self.endpoint("/bookmarks", &[])?;
        self.send_checked(self.client.put(url.clone()).json(order), &url).await
    }

    #[instrument(skip(self, request))]
    async fn resolve_player(&self, request: &PlayRequest) -> Result<PlayerResponse> {
        self.get_json("/player", &request.query_pairs()).await
    }
}
