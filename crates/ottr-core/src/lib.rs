//! Ottr Core - aggregator client library
//!
//! This crate provides the client-side logic of a personal IPTV/VOD/
//! series aggregator:
//! - Hierarchical browse state machine (accounts, categories,
//!   channels, episodes) with sticky per-mode state and snapshot-based
//!   back navigation
//! - Episode metadata enrichment from detail responses
//! - Playback backend selection (YouTube embed, native pipeline,
//!   manifest player) and the native failure fallback chain
//! - Variant track selection by codec family, resolution and bandwidth
//! - Playback session lifecycle with repeat-on-end
//! - Server-synchronized bookmarks
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                         Ottr Core                          │
//! ├────────────────────────────────────────────────────────────┤
//! │                                                            │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐         │
//! │  │   Browse   │   │  Metadata  │   │  Bookmark  │         │
//! │  │ Controller │   │  Enricher  │   │    Sync    │         │
//! │  └─────┬──────┘   └─────┬──────┘   └─────┬──────┘         │
//! │        │                │                │                 │
//! │        └────────────────┼────────────────┘                 │
//! │                         │                                  │
//! │                  ┌──────┴──────┐                           │
//! │                  │  Api trait  │                           │
//! │                  └──────┬──────┘                           │
//! │                         │                                  │
//! │  ┌────────────┐  ┌──────┴──────┐  ┌────────────┐          │
//! │  │  Backend   │  │  Playback   │  │  Fallback  │          │
//! │  │  Selector  │  │ Controller  │  │   Chain    │          │
//! │  └────────────┘  └─────────────┘  └────────────┘          │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod bookmarks;
pub mod browser;
pub mod config;
pub mod enrich;
pub mod error;
pub mod fallback;
pub mod launch;
pub mod selector;
pub mod session;
pub mod store;
pub mod tracks;
pub mod types;

pub use api::{Api, HttpApi, PlayRequest};
pub use bookmarks::{BookmarkKey, BookmarkSync, Favorite};
pub use browser::{BrowseController, BrowserState};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use fallback::{fallback_plan, FallbackStep};
pub use launch::{parse_launch_payload, LaunchPayload};
pub use selector::{extract_youtube_id, select_backend};
pub use session::{
    BackendProvider, ElementGate, MediaBackend, PlaybackController, SessionState,
};
pub use store::{KeyValueStore, MemoryStore};
pub use tracks::{rank_tracks, select_best};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the client library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Ottr Core initialized");
}
