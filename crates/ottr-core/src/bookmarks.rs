//! Bookmark synchronizer
//!
//! Bookmarks live server-side; the client keeps a cached copy and
//! re-fetches after every mutation rather than patching locally, so the
//! cache is always what the backend last confirmed. Identity is the
//! (account name, channel id, lowercased channel name) triple, which
//! survives portals that renumber db ids between refreshes.

use crate::api::{Api, BookmarkOrder, NewBookmark};
use crate::error::Result;
use crate::store::{KeyValueStore, FAVORITES_KEY};
use crate::types::{Bookmark, BookmarkCategory, ContentMode, Item, PlayableItem};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Identity key for a bookmark. Name comparison is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookmarkKey {
    pub account_name: String,
    pub channel_id: String,
    pub name: String,
}

impl BookmarkKey {
    pub fn new(account_name: &str, channel_id: &str, name: &str) -> Self {
        Self {
            account_name: account_name.to_string(),
            channel_id: channel_id.to_string(),
            name: name.trim().to_lowercase(),
        }
    }

    pub fn of_bookmark(bookmark: &Bookmark) -> Self {
        Self::new(&bookmark.account_name, &bookmark.channel_id, &bookmark.channel_name)
    }
}

/// Locally persisted favorite row. Rows may reference a bookmark by id
/// while carrying only partial display fields; refresh fills the
/// blanks from the matching bookmark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Favorite {
    pub bookmark_id: Option<String>,
    pub account_name: String,
    pub channel_id: String,
    pub name: String,
    pub logo: String,
}

impl Favorite {
    fn of_bookmark(bookmark: &Bookmark) -> Self {
        Self {
            bookmark_id: Some(bookmark.db_id.clone()),
            account_name: bookmark.account_name.clone(),
            channel_id: bookmark.channel_id.clone(),
            name: bookmark.channel_name.clone(),
            logo: bookmark.logo.clone(),
        }
    }

    pub fn key(&self) -> BookmarkKey {
        BookmarkKey::new(&self.account_name, &self.channel_id, &self.name)
    }

    /// Copy fields from the bookmark into empty slots only, so rows a
    /// user already filled in keep their values.
    fn fill_blank_from(&mut self, bookmark: &Bookmark) {
        if self.bookmark_id.is_none() {
            self.bookmark_id = Some(bookmark.db_id.clone());
        }
        if self.account_name.is_empty() {
            self.account_name = bookmark.account_name.clone();
        }
        if self.channel_id.is_empty() {
            self.channel_id = bookmark.channel_id.clone();
        }
        if self.name.is_empty() {
            self.name = bookmark.channel_name.clone();
        }
        if self.logo.is_empty() {
            self.logo = bookmark.logo.clone();
        }
    }
}

/// Cached, backend-confirmed bookmark state
pub struct BookmarkSync {
    api: Arc<dyn Api>,
    bookmarks: RwLock<Vec<Bookmark>>,
    categories: RwLock<Vec<BookmarkCategory>>,
    /// Local mirror of favorite identities for instant marking before
    /// the first refresh completes
    store: Option<Arc<dyn KeyValueStore>>,
}

impl BookmarkSync {
    pub fn new(api: Arc<dyn Api>) -> Self {
        Self {
            api,
            bookmarks: RwLock::new(Vec::new()),
            categories: RwLock::new(Vec::new()),
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Pull the full bookmark list and category list from the backend.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        let bookmarks = self.api.bookmarks().await?;
        let categories = self.api.bookmark_categories().await?;
        debug!(count = bookmarks.len(), "Refreshed bookmarks");
        self.mirror_favorites(&bookmarks);
        *self.bookmarks.write().await = bookmarks;
        *self.categories.write().await = categories;
        Ok(())
    }

    /// Merge the confirmed bookmarks into the local favorites store.
    /// Existing rows keep their fields with blanks filled in; bookmarks
    /// without a row are appended.
    fn mirror_favorites(&self, bookmarks: &[Bookmark]) {
        let mut favorites = self.stored_favorites();
        for bookmark in bookmarks {
            let found = favorites.iter_mut().find(|f| {
                f.bookmark_id.as_deref() == Some(bookmark.db_id.as_str())
                    || f.key() == BookmarkKey::of_bookmark(bookmark)
            });
            match found {
                Some(row) => row.fill_blank_from(bookmark),
                None => favorites.push(Favorite::of_bookmark(bookmark)),
            }
        }
        self.persist_favorites(&favorites);
    }

    /// Fill blank display fields on stored favorites that reference a
    /// cached bookmark by id, persist the result and return it.
    pub async fn enrich_favorites(&self) -> Vec<Favorite> {
        let mut favorites = self.stored_favorites();
        {
            let bookmarks = self.bookmarks.read().await;
            for favorite in &mut favorites {
                let Some(id) = favorite.bookmark_id.clone() else { continue };
                if let Some(bookmark) = bookmarks.iter().find(|b| b.db_id == id) {
                    favorite.fill_blank_from(bookmark);
                }
            }
        }
        self.persist_favorites(&favorites);
        favorites
    }

    /// Favorite rows persisted by the last refresh, usable before any
    /// network call has completed.
    pub fn stored_favorites(&self) -> Vec<Favorite> {
        let Some(store) = &self.store else { return Vec::new() };
        let Some(json) = store.get(FAVORITES_KEY) else { return Vec::new() };
        serde_json::from_str(&json).unwrap_or_default()
    }

    /// Identities of the stored favorites.
    pub fn mirrored_favorites(&self) -> Vec<BookmarkKey> {
        self.stored_favorites().iter().map(Favorite::key).collect()
    }

    fn persist_favorites(&self, favorites: &[Favorite]) {
        let Some(store) = &self.store else { return };
        match serde_json::to_string(favorites) {
            Ok(json) => store.set(FAVORITES_KEY, &json),
            Err(err) => warn!(error = %err, "Favorites serialization failed"),
        }
    }

    pub async fn all(&self) -> Vec<Bookmark> {
        self.bookmarks.read().await.clone()
    }

    pub async fn categories(&self) -> Vec<BookmarkCategory> {
        self.categories.read().await.clone()
    }

    /// Bookmarks for one category, in backend order.
    pub async fn in_category(&self, category_id: &str) -> Vec<Bookmark> {
        self.bookmarks
            .read()
            .await
            .iter()
            .filter(|b| b.category_id == category_id)
            .cloned()
            .collect()
    }

    /// The cached bookmark matching an item, if any.
    pub async fn find_for_item(&self, account_name: &str, item: &Item) -> Option<Bookmark> {
        let key = BookmarkKey::new(account_name, item.identifier(), &item.name);
        self.bookmarks
            .read()
            .await
            .iter()
            .find(|b| BookmarkKey::of_bookmark(b) == key)
            .cloned()
    }

    pub async fn is_bookmarked(&self, account_name: &str, item: &Item) -> bool {
        self.find_for_item(account_name, item).await.is_some()
    }

    /// Add the item if it has no bookmark, otherwise delete the one it
    /// has, then refresh. Returns whether the item is bookmarked after
    /// the toggle.
    #[instrument(skip(self, playable), fields(name = playable.display_name()))]
    pub async fn toggle(&self, account_name: &str, playable: &PlayableItem) -> Result<bool> {
        let (item, account_id, category_id, mode) = match playable {
            PlayableItem::Channel { item, account_id, category_id, mode } => {
                (item, account_id.as_str(), category_id.as_str(), *mode)
            }
            PlayableItem::SeriesItem { item, account_id, category_id } => {
                (item, account_id.as_str(), category_id.as_str(), ContentMode::Series)
            }
            PlayableItem::Episode { episode, account_id, category_id, .. } => {
                (&episode.item, account_id.as_str(), category_id.as_str(), ContentMode::Series)
            }
            PlayableItem::Bookmark { bookmark } => {
                // Toggling an existing bookmark can only remove it.
                info!(id = %bookmark.db_id, "Removing bookmark");
                self.api.delete_bookmark(&bookmark.db_id).await?;
                self.refresh().await?;
                return Ok(false);
            }
        };

        match self.find_for_item(account_name, item).await {
            Some(existing) => {
                info!(id = %existing.db_id, "Removing bookmark");
                self.api.delete_bookmark(&existing.db_id).await?;
                self.refresh().await?;
                Ok(false)
            }
            None => {
                let new = NewBookmark {
                    account_id: account_id.to_string(),
                    category_id: category_id.to_string(),
                    mode: mode.as_str().to_string(),
                    channel_id: item.identifier().to_string(),
                    name: item.name.clone(),
                    logo: item.logo.clone(),
                    cmd: item.descriptor.cmd.clone(),
                    drm_type: item.descriptor.drm_type.clone().unwrap_or_default(),
                    drm_license_url: item.descriptor.drm_license_url.clone().unwrap_or_default(),
                    clear_keys_json: item.descriptor.clear_keys_json.clone().unwrap_or_default(),
                    inputstreamaddon: item
                        .descriptor
                        .inputstream_addon
                        .clone()
                        .unwrap_or_default(),
                    manifest_type: item
                        .descriptor
                        .manifest_type
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default(),
                };
                info!(name = %new.name, "Adding bookmark");
                self.api.add_bookmark(&new).await?;
                self.refresh().await?;
                Ok(true)
            }
        }
    }

    /// Move a bookmark before another within the same category and push
    /// the resulting order to the backend. Cross-category moves are
    /// refused with no backend call.
    #[instrument(skip(self))]
    pub async fn reorder(&self, moved_db_id: &str, target_db_id: &str) -> Result<bool> {
        let ordered = {
            let bookmarks = self.bookmarks.read().await;
            let Some(moved) = bookmarks.iter().find(|b| b.db_id == moved_db_id) else {
                return Ok(false);
            };
            let Some(target) = bookmarks.iter().find(|b| b.db_id == target_db_id) else {
                return Ok(false);
            };
            if moved.category_id != target.category_id || moved_db_id == target_db_id {
                return Ok(false);
            }
            let category_id = moved.category_id.clone();
            let mut ids: Vec<String> = bookmarks
                .iter()
                .filter(|b| b.category_id == category_id)
                .map(|b| b.db_id.clone())
                .collect();
            // splice the moved id in front of the target
            ids.retain(|id| id != moved_db_id);
            let at = ids.iter().position(|id| id == target_db_id).unwrap_or(ids.len());
            ids.insert(at, moved_db_id.to_string());
            BookmarkOrder { category_id, ordered_bookmark_db_ids: ids }
        };
        self.api.reorder_bookmarks(&ordered).await?;
        self.refresh().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookmark(db_id: &str, account: &str, channel: &str, name: &str, cat: &str) -> Bookmark {
        Bookmark {
            db_id: db_id.into(),
            account_name: account.into(),
            channel_id: channel.into(),
            channel_name: name.into(),
            category_id: cat.into(),
            ..Bookmark::default()
        }
    }

    #[test]
    fn key_is_case_insensitive_on_name() {
        let a = BookmarkKey::new("home", "77", "News HD");
        let b = BookmarkKey::of_bookmark(&bookmark("1", "home", "77", "  news hd ", "c"));
        assert_eq!(a, b);
    }

    #[test]
    fn key_distinguishes_accounts() {
        let a = BookmarkKey::new("home", "77", "News");
        let b = BookmarkKey::new("office", "77", "News");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn find_matches_on_identity_not_db_id() {
        let api = crate::api::tests_support::MockApi::default();
        api.set_bookmarks(vec![bookmark("901", "home", "77", "News HD", "c1")]);
        let sync = BookmarkSync::new(Arc::new(api));
        sync.refresh().await.unwrap();

        let item = Item {
            db_id: "77".into(),
            name: "NEWS hd".into(),
            ..Item::default()
        };
        let found = sync.find_for_item("home", &item).await;
        assert_eq!(found.map(|b| b.db_id), Some("901".to_string()));
    }

    #[tokio::test]
    async fn refresh_mirrors_favorites_to_the_store() {
        let api = crate::api::tests_support::MockApi::default();
        api.set_bookmarks(vec![bookmark("1", "home", "77", "News HD", "c1")]);
        let store = Arc::new(crate::store::MemoryStore::new());
        let sync = BookmarkSync::new(Arc::new(api)).with_store(store.clone());
        sync.refresh().await.unwrap();

        let mirrored = sync.mirrored_favorites();
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0], BookmarkKey::new("home", "77", "News HD"));
        assert!(store.get(crate::store::FAVORITES_KEY).is_some());
    }

    #[tokio::test]
    async fn refresh_fills_blank_favorite_rows_from_bookmarks() {
        let api = crate::api::tests_support::MockApi::default();
        let mut confirmed = bookmark("901", "home", "77", "News HD", "c1");
        confirmed.logo = "http://img/n.png".into();
        api.set_bookmarks(vec![confirmed]);
        let store = Arc::new(crate::store::MemoryStore::new());
        // row written by an earlier build, carrying only the id
        store.set(crate::store::FAVORITES_KEY, r#"[{"bookmarkId":"901"}]"#);
        let sync = BookmarkSync::new(Arc::new(api)).with_store(store);
        sync.refresh().await.unwrap();

        let favorites = sync.stored_favorites();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].name, "News HD");
        assert_eq!(favorites[0].account_name, "home");
        assert_eq!(favorites[0].logo, "http://img/n.png");
    }

    #[tokio::test]
    async fn enrich_favorites_leaves_filled_fields_alone() {
        let api = crate::api::tests_support::MockApi::default();
        api.set_bookmarks(vec![bookmark("901", "home", "77", "News HD", "c1")]);
        let store = Arc::new(crate::store::MemoryStore::new());
        let sync = BookmarkSync::new(Arc::new(api)).with_store(store.clone());
        sync.refresh().await.unwrap();

        store.set(
            crate::store::FAVORITES_KEY,
            r#"[{"bookmarkId":"901","name":"My News"},{"bookmarkId":"999","name":"Orphan"}]"#,
        );
        let favorites = sync.enrich_favorites().await;
        assert_eq!(favorites.len(), 2);
        // the filled name survives; blanks come from the bookmark
        assert_eq!(favorites[0].name, "My News");
        assert_eq!(favorites[0].account_name, "home");
        assert_eq!(favorites[0].channel_id, "77");
        // no cached bookmark with that id, row passes through
        assert_eq!(favorites[1].name, "Orphan");
        assert!(favorites[1].account_name.is_empty());
        // the enriched list is persisted back
        assert_eq!(sync.stored_favorites(), favorites);
    }

    #[tokio::test]
    async fn reorder_refuses_cross_category_moves() {
        let api = crate::api::tests_support::MockApi::default();
        api.set_bookmarks(vec![
            bookmark("1", "home", "a", "A", "c1"),
            bookmark("2", "home", "b", "B", "c2"),
        ]);
        let sync = BookmarkSync::new(Arc::new(api));
        sync.refresh().await.unwrap();
        assert!(!sync.reorder("1", "2").await.unwrap());
    }

    #[tokio::test]
    async fn reorder_splices_before_target() {
        let api = crate::api::tests_support::MockApi::default();
        api.set_bookmarks(vec![
            bookmark("1", "home", "a", "A", "c1"),
            bookmark("2", "home", "b", "B", "c1"),
            bookmark("3", "home", "c", "C", "c1"),
        ]);
        let api = Arc::new(api);
        let sync = BookmarkSync::new(api.clone());
        sync.refresh().await.unwrap();
        assert!(sync.reorder("3", "1").await.unwrap());
        let sent = api.last_reorder().expect("reorder was sent");
        assert_eq!(sent.ordered_bookmark_db_ids, vec!["3", "1", "2"]);
    }
}
