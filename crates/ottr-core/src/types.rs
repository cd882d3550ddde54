//! Core types for the ottr client

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content browsing context. Each mode keeps independent navigation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    /// Live TV channels
    Itv,
    /// Video on demand
    Vod,
    /// Series with episodes
    Series,
}

impl ContentMode {
    pub const ALL: [ContentMode; 3] = [ContentMode::Itv, ContentMode::Vod, ContentMode::Series];

    /// Query value the backend expects for this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentMode::Itv => "itv",
            ContentMode::Vod => "vod",
            ContentMode::Series => "series",
        }
    }

    /// Legacy `streamType` compatibility value carried on play requests
    pub fn stream_type(&self) -> &'static str {
        match self {
            ContentMode::Itv => "live",
            ContentMode::Vod | ContentMode::Series => "video",
        }
    }
}

impl std::fmt::Display for ContentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of credentialed source behind an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountKind {
    StalkerPortal,
    XtremeApi,
    M3uPlaylist,
    RssFeed,
}

impl AccountKind {
    /// Only portal and API style accounts expose VOD/series trees
    pub fn supports_multi_mode(&self) -> bool {
        matches!(self, AccountKind::StalkerPortal | AccountKind::XtremeApi)
    }
}

/// A configured upstream account. Immutable once loaded; a reload
/// replaces the whole list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "dbId")]
    pub db_id: String,
    #[serde(rename = "accountName")]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AccountKind,
    #[serde(rename = "pinToTop", default)]
    pub pin_to_top: bool,
}

/// Pinned accounts first, then numeric db id, then case-insensitive name.
pub fn sort_accounts(accounts: &mut [Account]) {
    accounts.sort_by(|a, b| {
        b.pin_to_top
            .cmp(&a.pin_to_top)
            .then_with(|| numeric_db_id(a).cmp(&numeric_db_id(b)))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

fn numeric_db_id(account: &Account) -> u64 {
    account.db_id.parse().unwrap_or(u64::MAX)
}

/// One category within an (account, content mode) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "categoryId")]
    pub id: String,
    pub title: String,
}

impl Category {
    /// The synthetic catch-all category injected when an upstream
    /// exposes too few real ones.
    pub fn synthetic_all() -> Self {
        Self {
            id: "All".to_string(),
            title: "All".to_string(),
        }
    }
}

/// Prepend a synthetic "All" category unless one already exists.
/// Portal/API accounts with fewer than two real categories are left
/// alone since "All" would duplicate the single real entry.
pub fn with_synthetic_all_category(mut categories: Vec<Category>, kind: AccountKind) -> Vec<Category> {
    let has_all = categories.iter().any(|c| c.title.eq_ignore_ascii_case("all"));
    if has_all {
        return categories;
    }
    if kind.supports_multi_mode() && categories.len() < 2 {
        return categories;
    }
    categories.insert(0, Category::synthetic_all());
    categories
}

/// DRM scheme identifiers as the backend reports them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrmScheme {
    #[serde(rename = "com.widevine.alpha")]
    Widevine,
    #[serde(rename = "com.microsoft.playready")]
    PlayReady,
    #[serde(rename = "org.w3.clearkey")]
    ClearKey,
}

impl std::fmt::Display for DrmScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrmScheme::Widevine => write!(f, "com.widevine.alpha"),
            DrmScheme::PlayReady => write!(f, "com.microsoft.playready"),
            DrmScheme::ClearKey => write!(f, "org.w3.clearkey"),
        }
    }
}

/// Manifest container hint supplied by some providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Hls,
    Mpd,
}

impl ManifestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestKind::Hls => "hls",
            ManifestKind::Mpd => "mpd",
        }
    }
}

/// How an item is played: either a direct play command string, or a
/// DRM-protected manifest with license configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackDescriptor {
    /// Provider-native play command (a URL, possibly `ffmpeg `-prefixed)
    #[serde(default)]
    pub cmd: String,
    #[serde(rename = "drmType", default, skip_serializing_if = "Option::is_none")]
    pub drm_type: Option<String>,
    #[serde(rename = "drmLicenseUrl", default, skip_serializing_if = "Option::is_none")]
    pub drm_license_url: Option<String>,
    /// Raw clear-key map as JSON, passed through untouched
    #[serde(rename = "clearKeysJson", default, skip_serializing_if = "Option::is_none")]
    pub clear_keys_json: Option<String>,
    /// App-specific addon hint some portals attach
    #[serde(rename = "inputstreamaddon", default, skip_serializing_if = "Option::is_none")]
    pub inputstream_addon: Option<String>,
    #[serde(rename = "manifestType", default, skip_serializing_if = "Option::is_none")]
    pub manifest_type: Option<ManifestKind>,
}

impl PlaybackDescriptor {
    /// True when any DRM field is populated
    pub fn has_drm(&self) -> bool {
        self.drm_type.is_some() || self.drm_license_url.is_some() || self.clear_keys_json.is_some()
    }
}

/// A channel, movie, or series entry inside a category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable database id when the backend has one
    #[serde(rename = "dbId", default)]
    pub db_id: String,
    /// Provider-native id
    #[serde(rename = "channelId", default)]
    pub channel_id: String,
    pub name: String,
    #[serde(default)]
    pub logo: String,
    #[serde(flatten)]
    pub descriptor: PlaybackDescriptor,
}

impl Item {
    /// The identifier used for navigation and play requests: the stable
    /// db id when present, else the provider id.
    pub fn identifier(&self) -> &str {
        if !self.db_id.is_empty() {
            &self.db_id
        } else {
            &self.channel_id
        }
    }
}

/// An episode of a series. Season/episode numbers are frequently absent
/// and have to be inferred from the display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    #[serde(flatten)]
    pub item: Item,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(rename = "episodeNum", default)]
    pub episode_num: Option<u32>,
    #[serde(rename = "releaseDate", default)]
    pub release_date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration: String,
}

/// Per-episode metadata row used only as an enrichment join source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(rename = "episodeNum", default)]
    pub episode_num: Option<u32>,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub plot: String,
    #[serde(rename = "releaseDate", default)]
    pub release_date: String,
}

/// Aggregate metadata for a series or a VOD title
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Detail {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub plot: String,
    #[serde(default)]
    pub cast: String,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub genre: String,
    #[serde(rename = "releaseDate", default)]
    pub release_date: String,
    #[serde(default)]
    pub rating: String,
    /// External id, usually an IMDb `tt` id
    #[serde(default)]
    pub tmdb: String,
    #[serde(rename = "imdbUrl", default)]
    pub imdb_url: String,
    #[serde(default)]
    pub duration: String,
    /// Join source for episode enrichment; never rendered directly
    #[serde(rename = "episodesMeta", default)]
    pub episodes_meta: Vec<EpisodeMeta>,
}

impl Detail {
    /// Seed a detail from the list entry the user clicked so the view
    /// has something to show while the full fetch is in flight.
    pub fn seeded_from(item: &Item) -> Self {
        Self {
            name: item.name.clone(),
            cover: item.logo.clone(),
            ..Self::default()
        }
    }

    /// Fill blank fields from another detail without overwriting
    /// anything already present.
    pub fn merge_blank_from(&mut self, other: &Detail) {
        fn fill(target: &mut String, source: &str) {
            if target.trim().is_empty() && !source.trim().is_empty() {
                *target = source.to_string();
            }
        }
        fill(&mut self.name, &other.name);
        fill(&mut self.cover, &other.cover);
        fill(&mut self.plot, &other.plot);
        fill(&mut self.cast, &other.cast);
        fill(&mut self.director, &other.director);
        fill(&mut self.genre, &other.genre);
        fill(&mut self.release_date, &other.release_date);
        fill(&mut self.rating, &other.rating);
        fill(&mut self.tmdb, &other.tmdb);
        fill(&mut self.imdb_url, &other.imdb_url);
        fill(&mut self.duration, &other.duration);
        if !other.episodes_meta.is_empty() {
            self.episodes_meta = other.episodes_meta.clone();
        }
    }

    /// IMDb link, derived from the `tt` external id when no explicit
    /// URL was supplied
    pub fn imdb_link(&self) -> Option<String> {
        if !self.imdb_url.is_empty() {
            return Some(self.imdb_url.clone());
        }
        let id = self.tmdb.trim();
        let digits = id.strip_prefix("tt").or_else(|| id.strip_prefix("TT"))?;
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return Some(format!("https://www.imdb.com/title/{}/", id.to_lowercase()));
        }
        None
    }
}

/// A persisted reference to a playable item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bookmark {
    #[serde(rename = "dbId", default)]
    pub db_id: String,
    #[serde(rename = "accountName", default)]
    pub account_name: String,
    #[serde(rename = "categoryId", default)]
    pub category_id: String,
    #[serde(rename = "channelId", default)]
    pub channel_id: String,
    #[serde(rename = "channelName", default)]
    pub channel_name: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub cmd: String,
    /// Mode the bookmark was taken in; older rows may carry it under
    /// the legacy `accountAction` name
    #[serde(rename = "mode", alias = "accountAction", default)]
    pub mode: Option<ContentMode>,
}

/// A user-defined bookmark grouping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkCategory {
    pub id: String,
    pub name: String,
}

/// Anything the playback controller can be asked to play
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlayableItem {
    Channel {
        item: Item,
        account_id: String,
        category_id: String,
        mode: ContentMode,
    },
    Episode {
        episode: Episode,
        account_id: String,
        category_id: String,
        /// Provider id of the owning series
        series_id: String,
    },
    Bookmark { bookmark: Bookmark },
    SeriesItem {
        item: Item,
        account_id: String,
        category_id: String,
    },
}

impl PlayableItem {
    /// Display name for UI and logs
    pub fn display_name(&self) -> &str {
        match self {
            PlayableItem::Channel { item, .. } | PlayableItem::SeriesItem { item, .. } => &item.name,
            PlayableItem::Episode { episode, .. } => &episode.item.name,
            PlayableItem::Bookmark { bookmark } => &bookmark.channel_name,
        }
    }

    /// Content mode the play request should carry
    pub fn mode(&self) -> ContentMode {
        match self {
            PlayableItem::Channel { mode, .. } => *mode,
            PlayableItem::Episode { .. } | PlayableItem::SeriesItem { .. } => ContentMode::Series,
            PlayableItem::Bookmark { bookmark } => bookmark.mode.unwrap_or(ContentMode::Itv),
        }
    }

    pub fn descriptor(&self) -> Option<&PlaybackDescriptor> {
        match self {
            PlayableItem::Channel { item, .. } | PlayableItem::SeriesItem { item, .. } => {
                Some(&item.descriptor)
            }
            PlayableItem::Episode { episode, .. } => Some(&episode.item.descriptor),
            PlayableItem::Bookmark { .. } => None,
        }
    }
}

/// DRM block returned alongside a resolved playback URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrmInfo {
    #[serde(rename = "type")]
    pub scheme: DrmScheme,
    #[serde(rename = "licenseUrl", default)]
    pub license_url: Option<String>,
    /// key id -> key, both hex
    #[serde(rename = "clearKeys", default)]
    pub clear_keys: std::collections::HashMap<String, String>,
}

/// Response of the player endpoint: a concrete, time-limited stream
/// locator plus optional DRM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerResponse {
    pub url: String,
    #[serde(default)]
    pub drm: Option<DrmInfo>,
}

/// One encoded rendition reported by the manifest player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantTrack {
    pub id: u32,
    /// Codec string, e.g. `hvc1.1.6.L93.B0` or `avc1.4d401f`
    #[serde(default)]
    pub codecs: String,
    /// Vertical resolution in pixels
    #[serde(default)]
    pub height: u32,
    /// Peak bandwidth in bits per second
    #[serde(default)]
    pub bandwidth: u64,
    #[serde(rename = "audioOnly", default)]
    pub audio_only: bool,
}

/// Mechanism rendering the video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    /// Browser-native media element, zero overhead but inflexible
    Native,
    /// Manifest-aware player capable of DASH/HLS and DRM
    ManifestPlayer,
    /// Third-party video embed
    YoutubeEmbed,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Native => write!(f, "native"),
            BackendKind::ManifestPlayer => write!(f, "manifest-player"),
            BackendKind::YoutubeEmbed => write!(f, "youtube-embed"),
        }
    }
}

/// Decode capabilities of the runtime, probed once at startup
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// Runtime advertises native HLS demuxing
    pub native_hls: bool,
    /// HEVC/H.265 decode available
    pub hevc: bool,
    /// AVC/H.264 decode available
    pub avc: bool,
}

/// Where the browse UI currently sits within one content mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewPosition {
    #[default]
    Accounts,
    Categories,
    Channels,
    Episodes,
    SeriesDetail,
    VodDetail,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(db_id: &str, name: &str, pinned: bool) -> Account {
        Account {
            db_id: db_id.to_string(),
            name: name.to_string(),
            kind: AccountKind::StalkerPortal,
            pin_to_top: pinned,
        }
    }

    #[test]
    fn account_ordering_pins_first_then_numeric_id() {
        let mut accounts = vec![
            account("3", "zeta", false),
            account("1", "alpha", false),
            account("9", "pinned", true),
        ];
        sort_accounts(&mut accounts);
        let names: Vec<&str> = accounts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["pinned", "alpha", "zeta"]);
    }

    #[test]
    fn synthetic_all_skipped_for_small_portal_lists() {
        let one = vec![Category { id: "5".into(), title: "Sports".into() }];
        let out = with_synthetic_all_category(one.clone(), AccountKind::StalkerPortal);
        assert_eq!(out, one);

        let out = with_synthetic_all_category(one, AccountKind::M3uPlaylist);
        assert_eq!(out[0].title, "All");
    }

    #[test]
    fn synthetic_all_not_duplicated() {
        let cats = vec![
            Category { id: "All".into(), title: "all".into() },
            Category { id: "2".into(), title: "News".into() },
        ];
        let out = with_synthetic_all_category(cats, AccountKind::XtremeApi);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn item_identifier_prefers_db_id() {
        let mut item = Item { channel_id: "prov-1".into(), ..Item::default() };
        assert_eq!(item.identifier(), "prov-1");
        item.db_id = "42".into();
        assert_eq!(item.identifier(), "42");
    }

    #[test]
    fn detail_merge_fills_only_blanks() {
        let mut seeded = Detail { name: "Original".into(), ..Detail::default() };
        let server = Detail {
            name: "Server Name".into(),
            plot: "A plot".into(),
            ..Detail::default()
        };
        seeded.merge_blank_from(&server);
        assert_eq!(seeded.name, "Original");
        assert_eq!(seeded.plot, "A plot");
    }

    #[test]
    fn imdb_link_from_tt_id() {
        let detail = Detail { tmdb: "tt1234567".into(), ..Detail::default() };
        assert_eq!(
            detail.imdb_link().as_deref(),
            Some("https://www.imdb.com/title/tt1234567/")
        );
        let bogus = Detail { tmdb: "12345".into(), ..Detail::default() };
        assert_eq!(bogus.imdb_link(), None);
    }
}
