//! Hierarchical browse controller
//!
//! Navigation is a stack machine over accounts, categories, channel
//! lists and episode lists. Each content mode keeps its own sticky
//! [`BrowserState`], so flipping between live TV and VOD returns the
//! user to where they left off. Descending pushes a snapshot of the
//! current state; going back pops one. A failed load leaves the
//! current state untouched.

use crate::api::Api;
use crate::config::ClientConfig;
use crate::enrich::{enrich_episodes, season_tabs};
use crate::error::{Error, Result};
use crate::types::{
    sort_accounts, with_synthetic_all_category, Account, AccountKind, Category, ContentMode,
    Detail, Episode, Item, ViewPosition,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Mutable navigation state for one content mode
#[derive(Debug, Clone, Default)]
pub struct BrowserState {
    pub view: ViewPosition,
    pub category: Option<Category>,
    pub items: Vec<Item>,
    /// Size of the rendered window into `items`
    pub visible_count: usize,
    pub episodes: Vec<Episode>,
    pub season_tabs: Vec<u32>,
    pub selected_season: Option<u32>,
    pub detail: Option<Detail>,
    /// Series whose episodes are currently shown
    pub series: Option<Item>,
    /// Snapshots for back navigation within this mode. Snapshots are
    /// stored without their own stack.
    pub stack: Vec<BrowserState>,
}

impl BrowserState {
    fn at_categories() -> Self {
        Self { view: ViewPosition::Categories, ..Self::default() }
    }

    fn snapshot(&self) -> BrowserState {
        BrowserState { stack: Vec::new(), ..self.clone() }
    }

    /// Items inside the current pagination window
    pub fn visible_items(&self) -> &[Item] {
        let end = self.visible_count.min(self.items.len());
        &self.items[..end]
    }

    pub fn has_more(&self) -> bool {
        self.visible_count < self.items.len()
    }

    /// Episodes for the selected season tab, or all of them when the
    /// list has no season structure.
    pub fn episodes_for_selected_season(&self) -> Vec<&Episode> {
        match self.selected_season {
            Some(season) => self
                .episodes
                .iter()
                .filter(|e| crate::enrich::resolve_season(e).unwrap_or(1) == season)
                .collect(),
            None => self.episodes.iter().collect(),
        }
    }
}

struct Inner {
    accounts: Vec<Account>,
    account: Option<Account>,
    mode: ContentMode,
    /// Sticky per-mode state, survives mode switches
    states: HashMap<ContentMode, BrowserState>,
    categories: HashMap<ContentMode, Vec<Category>>,
}

impl Inner {
    fn state(&self) -> BrowserState {
        self.states.get(&self.mode).cloned().unwrap_or_default()
    }

    fn state_mut(&mut self) -> &mut BrowserState {
        self.states.entry(self.mode).or_default()
    }
}

/// Drives the account/category/channel/episode hierarchy
pub struct BrowseController {
    api: Arc<dyn Api>,
    config: ClientConfig,
    inner: RwLock<Inner>,
    /// Rejects overlapping list loads instead of queuing them
    load_in_flight: AtomicBool,
    /// Bumped on every navigation; slow responses from a superseded
    /// navigation are discarded on arrival
    generation: AtomicU64,
}

/// Releases the in-flight flag even on the error path.
struct LoadGuard<'a>(&'a AtomicBool);

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl BrowseController {
    pub fn new(api: Arc<dyn Api>, config: ClientConfig) -> Self {
        Self {
            api,
            config,
            inner: RwLock::new(Inner {
                accounts: Vec::new(),
                account: None,
                mode: ContentMode::Itv,
                states: HashMap::new(),
                categories: HashMap::new(),
            }),
            load_in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    fn acquire_load(&self) -> Option<LoadGuard<'_>> {
        if self
            .load_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Load already in flight, ignoring");
            return None;
        }
        Some(LoadGuard(&self.load_in_flight))
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Fetch and sort the account list. Pinned accounts first, then
    /// numeric db id order, then name.
    #[instrument(skip(self))]
    pub async fn load_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts = self.api.accounts().await?;
        sort_accounts(&mut accounts);
        let mut inner = self.inner.write().await;
        inner.accounts = accounts.clone();
        Ok(accounts)
    }

    pub async fn accounts(&self) -> Vec<Account> {
        self.inner.read().await.accounts.clone()
    }

    pub async fn current_account(&self) -> Option<Account> {
        self.inner.read().await.account.clone()
    }

    pub async fn mode(&self) -> ContentMode {
        self.inner.read().await.mode
    }

    pub async fn state(&self) -> BrowserState {
        self.inner.read().await.state()
    }

    pub async fn categories(&self) -> Vec<Category> {
        let inner = self.inner.read().await;
        inner.categories.get(&inner.mode).cloned().unwrap_or_default()
    }

    /// Select an account and load its category list. Re-selecting the
    /// current account keeps all sticky state; switching accounts
    /// clears it.
    #[instrument(skip(self), fields(account = %account.name))]
    pub async fn select_account(&self, account: Account) -> Result<()> {
        let generation = self.bump_generation();
        let switching = {
            let inner = self.inner.read().await;
            inner.account.as_ref().map(|a| a.db_id != account.db_id).unwrap_or(true)
        };
        let mode = if switching || !account.kind.supports_multi_mode() {
            ContentMode::Itv
        } else {
            self.inner.read().await.mode
        };

        let categories = self.fetch_categories(&account, mode).await?;
        if !self.is_current(generation) {
            debug!("Discarding stale account selection");
            return Ok(());
        }

        let mut inner = self.inner.write().await;
        if switching {
            info!(account = %account.name, "Switched account");
            inner.states.clear();
            inner.categories.clear();
        }
        inner.account = Some(account);
        inner.mode = mode;
        inner.categories.insert(mode, categories);
        if !inner.states.contains_key(&mode) {
            *inner.state_mut() = BrowserState::at_categories();
        }
        Ok(())
    }

    /// Switch content mode on the current account, restoring that
    /// mode's sticky state. Categories are fetched only when this mode
    /// has none cached.
    #[instrument(skip(self))]
    pub async fn set_mode(&self, mode: ContentMode) -> Result<()> {
        let generation = self.bump_generation();
        let (account, cached) = {
            let inner = self.inner.read().await;
            let account = inner.account.clone().ok_or(Error::InvalidStateTransition {
                from: "no-account".into(),
                to: "browse".into(),
            })?;
            (account, inner.categories.contains_key(&mode))
        };
        if !account.kind.supports_multi_mode() && mode != ContentMode::Itv {
            return Err(Error::UnsupportedMedia(format!(
                "account {} has no {mode} listing",
                account.name
            )));
        }

        if cached {
            let mut inner = self.inner.write().await;
            inner.mode = mode;
            return Ok(());
        }

        let categories = self.fetch_categories(&account, mode).await?;
        if !self.is_current(generation) {
            return Ok(());
        }
        let mut inner = self.inner.write().await;
        inner.mode = mode;
        inner.categories.insert(mode, categories);
        if !inner.states.contains_key(&mode) {
            *inner.state_mut() = BrowserState::at_categories();
        }
        Ok(())
    }

    async fn fetch_categories(&self, account: &Account, mode: ContentMode) -> Result<Vec<Category>> {
        let categories = self.api.categories(&account.db_id, mode).await?;
        Ok(with_synthetic_all_category(categories, account.kind))
    }

    /// Descend into a category: snapshot the current state and load the
    /// channel list. On failure the snapshot is not pushed and the
    /// prior state stays current.
    #[instrument(skip(self), fields(category = %category.title))]
    pub async fn enter_category(&self, category: Category) -> Result<()> {
        let Some(_guard) = self.acquire_load() else { return Ok(()) };
        let generation = self.bump_generation();
        let account = self.require_account().await?;
        let mode = self.inner.read().await.mode;

        let items = self
            .api
            .channels(&category.id, &account.db_id, mode, None)
            .await?;
        if !self.is_current(generation) {
            debug!(category = %category.title, "Discarding stale channel list");
            return Ok(());
        }

        let mut inner = self.inner.write().await;
        let visible = self.config.page_batch_size.min(items.len());
        let state = inner.state_mut();
        let mut stack = std::mem::take(&mut state.stack);
        stack.push(state.snapshot());
        *state = BrowserState {
            view: ViewPosition::Channels,
            category: Some(category),
            items,
            visible_count: visible,
            stack,
            ..BrowserState::default()
        };
        Ok(())
    }

    /// Descend into a series: snapshot, fetch details and episodes,
    /// then enrich the episode list from the detail metadata. Episodes
    /// arriving after the user has moved to a different series are
    /// dropped.
    #[instrument(skip(self), fields(series = %series.name))]
    pub async fn enter_series(&self, series: Item) -> Result<()> {
        let Some(_guard) = self.acquire_load() else { return Ok(()) };
        let generation = self.bump_generation();
        let account = self.require_account().await?;
        let series_id = series.identifier().to_string();

        let details = self
            .api
            .series_details(&series_id, &account.db_id, &series.name)
            .await
            .unwrap_or_else(|err| {
                // Detail metadata is decoration; a missing detail
                // endpoint must not block the episode list.
                warn!(error = %err, "Series details unavailable");
                Default::default()
            });

        let mut episodes = if details.episodes.is_empty() {
            match account.kind {
                AccountKind::XtremeApi => {
                    self.api.series_episodes(&series_id, &account.db_id).await?
                }
                _ => {
                    let category_id = self
                        .inner
                        .read()
                        .await
                        .state()
                        .category
                        .as_ref()
                        .map(|c| c.id.clone())
                        .unwrap_or_default();
                    // Portal episode rows come back as plain channel
                    // items; season and number are extracted later.
                    self.api
                        .channels(&category_id, &account.db_id, ContentMode::Series, Some(&series_id))
                        .await?
                        .into_iter()
                        .map(|item| Episode { item, ..Episode::default() })
                        .collect()
                }
            }
        } else {
            details.episodes.clone()
        };

        if !self.is_current(generation) {
            debug!(series = %series.name, "Discarding stale episode list");
            return Ok(());
        }

        let mut detail = Detail::seeded_from(&series);
        if let Some(info) = &details.season_info {
            detail.merge_blank_from(info);
        }
        detail.episodes_meta = details.episodes_meta;
        episodes = enrich_episodes(episodes, &detail);
        let tabs = season_tabs(&episodes);

        let mut inner = self.inner.write().await;
        let state = inner.state_mut();
        let category = state.category.clone();
        let mut stack = std::mem::take(&mut state.stack);
        stack.push(state.snapshot());
        *state = BrowserState {
            view: ViewPosition::Episodes,
            category,
            selected_season: tabs.first().copied(),
            season_tabs: tabs,
            episodes,
            detail: Some(detail),
            series: Some(series),
            stack,
            ..BrowserState::default()
        };
        Ok(())
    }

    /// Open the detail view for a VOD item. Missing detail metadata
    /// falls back to what the listing already carried.
    #[instrument(skip(self), fields(item = %item.name))]
    pub async fn enter_vod_detail(&self, item: Item) -> Result<()> {
        let Some(_guard) = self.acquire_load() else { return Ok(()) };
        let generation = self.bump_generation();
        let account = self.require_account().await?;
        let category_id = {
            let inner = self.inner.read().await;
            inner.state().category.as_ref().map(|c| c.id.clone()).unwrap_or_default()
        };

        let mut detail = Detail::seeded_from(&item);
        match self
            .api
            .vod_details(&account.db_id, &category_id, item.identifier(), &item.name)
            .await
        {
            Ok(response) => {
                if let Some(info) = response.vod_info {
                    detail.merge_blank_from(&info);
                }
            }
            Err(err) => warn!(error = %err, "VOD details unavailable"),
        }
        if !self.is_current(generation) {
            return Ok(());
        }

        let mut inner = self.inner.write().await;
        let state = inner.state_mut();
        let category = state.category.clone();
        let mut stack = std::mem::take(&mut state.stack);
        stack.push(state.snapshot());
        *state = BrowserState {
            view: ViewPosition::VodDetail,
            category,
            detail: Some(detail),
            series: Some(item),
            stack,
            ..BrowserState::default()
        };
        Ok(())
    }

    /// Widen the pagination window. Purely local, idempotent at the end
    /// of the list.
    pub async fn load_more(&self) -> bool {
        let mut inner = self.inner.write().await;
        let batch = self.config.page_batch_size;
        let state = inner.state_mut();
        if !state.has_more() {
            return false;
        }
        state.visible_count = (state.visible_count + batch).min(state.items.len());
        true
    }

    pub async fn select_season(&self, season: u32) {
        let mut inner = self.inner.write().await;
        let state = inner.state_mut();
        if state.season_tabs.contains(&season) {
            state.selected_season = Some(season);
        }
    }

    /// Step one level back within the current mode. Pops this mode's
    /// snapshot stack; with the stack empty the view falls to its
    /// structural parent instead (lists and details to categories,
    /// categories to accounts). Never changes the content mode.
    /// Returns false only at the account list.
    #[instrument(skip(self))]
    pub async fn go_back(&self) -> bool {
        self.bump_generation();
        let mut inner = self.inner.write().await;
        let state = inner.state_mut();
        if let Some(snapshot) = state.stack.pop() {
            let stack = std::mem::take(&mut state.stack);
            *state = snapshot;
            state.stack = stack;
            return true;
        }
        match state.view {
            ViewPosition::Accounts => false,
            ViewPosition::Categories => {
                *state = BrowserState::default();
                true
            }
            _ => {
                *state = BrowserState::at_categories();
                true
            }
        }
    }

    /// Snapshot depth of the current mode's stack.
    pub async fn stack_depth(&self) -> usize {
        self.inner.read().await.state().stack.len()
    }

    async fn require_account(&self) -> Result<Account> {
        self.inner.read().await.account.clone().ok_or(Error::InvalidStateTransition {
            from: "no-account".into(),
            to: "browse".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests_support::MockApi;

    fn account(db_id: &str, name: &str, kind: AccountKind) -> Account {
        Account { db_id: db_id.into(), name: name.into(), kind, pin_to_top: false }
    }

    fn item(id: &str, name: &str) -> Item {
        Item { db_id: id.into(), name: name.into(), ..Item::default() }
    }

    fn controller(api: Arc<MockApi>) -> BrowseController {
        let mut config = ClientConfig::default();
        config.page_batch_size = 2;
        BrowseController::new(api, config)
    }

    fn seeded_api() -> Arc<MockApi> {
        let api = MockApi::default();
        api.set_accounts(vec![
            account("1", "home", AccountKind::StalkerPortal),
            account("2", "office", AccountKind::XtremeApi),
            account("3", "playlist", AccountKind::M3uPlaylist),
        ]);
        api.set_categories(vec![Category { id: "c1".into(), title: "Movies".into() }]);
        api.set_channels(
            "c1",
            vec![item("10", "Alpha"), item("11", "Beta"), item("12", "Gamma")],
        );
        Arc::new(api)
    }

    #[tokio::test]
    async fn entering_category_pushes_snapshot_and_pages() {
        let api = seeded_api();
        let browser = controller(api);
        browser.load_accounts().await.unwrap();
        let acc = browser.accounts().await[0].clone();
        browser.select_account(acc).await.unwrap();

        browser
            .enter_category(Category { id: "c1".into(), title: "Movies".into() })
            .await
            .unwrap();
        let state = browser.state().await;
        assert_eq!(state.view, ViewPosition::Channels);
        assert_eq!(state.items.len(), 3);
        assert_eq!(state.visible_items().len(), 2);
        assert_eq!(browser.stack_depth().await, 1);

        assert!(browser.load_more().await);
        assert_eq!(browser.state().await.visible_items().len(), 3);
        // idempotent at the end of the list
        assert!(!browser.load_more().await);
    }

    #[tokio::test]
    async fn go_back_restores_previous_state() {
        let api = seeded_api();
        let browser = controller(api);
        browser.load_accounts().await.unwrap();
        let acc = browser.accounts().await[0].clone();
        browser.select_account(acc).await.unwrap();
        browser
            .enter_category(Category { id: "c1".into(), title: "Movies".into() })
            .await
            .unwrap();

        assert!(browser.go_back().await);
        let state = browser.state().await;
        assert_eq!(state.view, ViewPosition::Categories);
        assert!(state.items.is_empty());
        // empty stack falls back to the structural parent
        assert!(browser.go_back().await);
        assert_eq!(browser.state().await.view, ViewPosition::Accounts);
        // at the root now
        assert!(!browser.go_back().await);
    }

    #[tokio::test]
    async fn go_back_stays_within_the_current_mode() {
        let api = seeded_api();
        let browser = controller(api);
        browser.load_accounts().await.unwrap();
        let acc = browser.accounts().await[0].clone(); // multi-mode portal
        browser.select_account(acc).await.unwrap();
        browser
            .enter_category(Category { id: "c1".into(), title: "Movies".into() })
            .await
            .unwrap();

        browser.set_mode(ContentMode::Vod).await.unwrap();
        assert!(browser.go_back().await);
        // VOD has no snapshots of its own; back walks its structural
        // parent and never pops the live TV stack
        assert_eq!(browser.mode().await, ContentMode::Vod);
        assert_eq!(browser.state().await.view, ViewPosition::Accounts);

        browser.set_mode(ContentMode::Itv).await.unwrap();
        assert_eq!(browser.state().await.view, ViewPosition::Channels);
        assert!(browser.go_back().await);
        assert_eq!(browser.state().await.view, ViewPosition::Categories);
    }

    #[tokio::test]
    async fn reselecting_the_same_account_keeps_sticky_state() {
        let api = seeded_api();
        let browser = controller(api);
        browser.load_accounts().await.unwrap();
        let acc = browser.accounts().await[0].clone();
        browser.select_account(acc.clone()).await.unwrap();
        browser
            .enter_category(Category { id: "c1".into(), title: "Movies".into() })
            .await
            .unwrap();

        browser.select_account(acc).await.unwrap();
        let state = browser.state().await;
        assert_eq!(state.view, ViewPosition::Channels);
        assert_eq!(state.items.len(), 3);
        assert_eq!(browser.stack_depth().await, 1);
    }

    #[tokio::test]
    async fn failed_load_keeps_current_state() {
        let api = seeded_api();
        let browser = controller(api.clone());
        browser.load_accounts().await.unwrap();
        let acc = browser.accounts().await[0].clone();
        browser.select_account(acc).await.unwrap();

        api.set_failing(true);
        let result = browser
            .enter_category(Category { id: "c1".into(), title: "Movies".into() })
            .await;
        assert!(result.is_err());
        let state = browser.state().await;
        assert_eq!(state.view, ViewPosition::Categories);
        assert_eq!(browser.stack_depth().await, 0);
    }

    #[tokio::test]
    async fn switching_accounts_clears_sticky_state() {
        let api = seeded_api();
        let browser = controller(api);
        browser.load_accounts().await.unwrap();
        let accounts = browser.accounts().await;
        browser.select_account(accounts[0].clone()).await.unwrap();
        browser
            .enter_category(Category { id: "c1".into(), title: "Movies".into() })
            .await
            .unwrap();

        browser.select_account(accounts[1].clone()).await.unwrap();
        assert_eq!(browser.stack_depth().await, 0);
        assert_eq!(browser.state().await.view, ViewPosition::Categories);
    }

    #[tokio::test]
    async fn series_entry_enriches_and_builds_season_tabs() {
        let api = seeded_api();
        let mut ep1 = crate::types::Episode {
            item: item("e1", "S01E01 - Pilot"),
            ..Default::default()
        };
        ep1.item.db_id.clear();
        ep1.item.channel_id = "e1".into();
        let mut ep2 = crate::types::Episode {
            item: item("e2", "S02E01 - Return"),
            ..Default::default()
        };
        ep2.item.db_id.clear();
        ep2.item.channel_id = "e2".into();
        api.set_episodes("s1", vec![ep1, ep2]);

        let browser = controller(api);
        browser.load_accounts().await.unwrap();
        let acc = browser.accounts().await[1].clone(); // XtremeApi
        browser.select_account(acc).await.unwrap();
        browser.set_mode(ContentMode::Series).await.unwrap();
        browser
            .enter_category(Category { id: "c1".into(), title: "Movies".into() })
            .await
            .unwrap();
        browser.enter_series(item("s1", "Some Show")).await.unwrap();

        let state = browser.state().await;
        assert_eq!(state.view, ViewPosition::Episodes);
        assert_eq!(state.season_tabs, vec![1, 2]);
        assert_eq!(state.selected_season, Some(1));
        assert_eq!(state.episodes_for_selected_season().len(), 1);
        assert!(state.detail.is_some());
    }

    #[tokio::test]
    async fn portal_series_entry_wraps_channel_rows_as_episodes() {
        let api = seeded_api();
        api.set_channels("s1", vec![item("e1", "S01E01 - Pilot"), item("e2", "S01E02 - Arrival")]);

        let browser = controller(api);
        browser.load_accounts().await.unwrap();
        let acc = browser.accounts().await[0].clone(); // StalkerPortal
        browser.select_account(acc).await.unwrap();
        browser.set_mode(ContentMode::Series).await.unwrap();
        browser
            .enter_category(Category { id: "c1".into(), title: "Movies".into() })
            .await
            .unwrap();
        browser.enter_series(item("s1", "Some Show")).await.unwrap();

        let state = browser.state().await;
        assert_eq!(state.view, ViewPosition::Episodes);
        assert_eq!(state.episodes.len(), 2);
        assert_eq!(state.season_tabs, vec![1]);
        assert_eq!(state.episodes[0].item.name, "S01E01 - Pilot");
    }

    #[tokio::test]
    async fn playlist_account_rejects_vod() {
        let api = seeded_api();
        let browser = controller(api);
        browser.load_accounts().await.unwrap();
        let acc = browser.accounts().await[2].clone(); // M3uPlaylist
        browser.select_account(acc).await.unwrap();
        assert!(browser.set_mode(ContentMode::Vod).await.is_err());
    }
}
