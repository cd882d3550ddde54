//! Playback session controller
//!
//! Coordinates:
//! - Stream resolution through the backend `/player` endpoint
//! - Backend selection (YouTube embed, native, manifest player)
//! - The native failure fallback chain
//! - Variant track auto-selection on the manifest player
//! - Repeat-on-end
//!
//! Starting a new item always tears the previous one down first; there
//! is never more than one active media load.

use crate::api::{Api, PlayRequest};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::fallback::{fallback_plan, FallbackStep};
use crate::selector::{extract_youtube_id, select_backend};
use crate::tracks::select_best;
use crate::types::{
    BackendKind, DeviceCapabilities, DrmInfo, PlayableItem, SessionId, VariantTrack,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, instrument, warn};

/// Lifecycle of one playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Playing,
    Stopped,
    Failed,
}

impl SessionState {
    /// Valid transitions. Any state may restart into `Starting`; that
    /// is how zapping and repeat work.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Playing)
                | (Starting, Failed)
                | (Starting, Stopped)
                | (Playing, Stopped)
                | (Playing, Failed)
                | (Playing, Starting)
                | (Stopped, Starting)
                | (Stopped, Idle)
                | (Failed, Starting)
                | (Failed, Idle)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Playing => "playing",
            SessionState::Stopped => "stopped",
            SessionState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A concrete media surface (native pipeline or manifest player)
#[async_trait]
pub trait MediaBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn load(&self, url: &str, drm: Option<&DrmInfo>) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Variant tracks the loaded stream exposes. Empty for backends
    /// without track control.
    async fn variant_tracks(&self) -> Vec<VariantTrack>;

    async fn select_track(&self, id: u32) -> Result<()>;
}

/// Hands out the media surface for a backend kind
pub trait BackendProvider: Send + Sync {
    fn backend(&self, kind: BackendKind) -> Option<Arc<dyn MediaBackend>>;
}

/// Readiness gate for the playback surface.
///
/// The surface flips the gate when it is attached and able to accept a
/// load; starting playback waits on it with bounded retries instead of
/// polling forever.
pub struct ElementGate {
    ready_tx: watch::Sender<bool>,
}

impl ElementGate {
    pub fn new() -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self { ready_tx }
    }

    pub fn set_ready(&self, ready: bool) {
        // send_replace stores the value even with no receiver alive;
        // the surface usually signals before anyone waits on the gate
        self.ready_tx.send_replace(ready);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_tx.subscribe().borrow()
    }

    pub async fn wait_ready(&self, retries: u32, wait_ms: u64) -> Result<()> {
        let mut rx = self.ready_tx.subscribe();
        for _ in 0..retries {
            if *rx.borrow_and_update() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }
        if *rx.borrow() {
            Ok(())
        } else {
            Err(Error::ElementUnavailable)
        }
    }
}

impl Default for ElementGate {
    fn default() -> Self {
        Self::new()
    }
}

/// What is currently loaded
#[derive(Clone)]
pub struct CurrentPlayback {
    pub playable: PlayableItem,
    pub url: String,
    pub backend: BackendKind,
    pub youtube_id: Option<String>,
    pub drm: Option<DrmInfo>,
    pub selected_track: Option<VariantTrack>,
}

/// Orchestrates one playback surface across many played items
pub struct PlaybackController {
    id: SessionId,
    config: ClientConfig,
    api: Arc<dyn Api>,
    backends: Arc<dyn BackendProvider>,
    capabilities: DeviceCapabilities,
    gate: Arc<ElementGate>,
    state: Arc<RwLock<SessionState>>,
    state_tx: watch::Sender<SessionState>,
    current: Arc<RwLock<Option<CurrentPlayback>>>,
    /// Last item a start was requested for. Survives failed starts, so
    /// an explicit reload has something to retry.
    last_playable: Arc<RwLock<Option<PlayableItem>>>,
    active_backend: Arc<RwLock<Option<Arc<dyn MediaBackend>>>>,
    repeat: AtomicBool,
    /// Collapses overlapping repeat restarts into one
    restart_in_flight: AtomicBool,
}

impl PlaybackController {
    pub fn new(
        api: Arc<dyn Api>,
        backends: Arc<dyn BackendProvider>,
        capabilities: DeviceCapabilities,
        config: ClientConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            id: SessionId::new(),
            config,
            api,
            backends,
            capabilities,
            gate: Arc::new(ElementGate::new()),
            state: Arc::new(RwLock::new(SessionState::Idle)),
            state_tx,
            current: Arc::new(RwLock::new(None)),
            last_playable: Arc::new(RwLock::new(None)),
            active_backend: Arc::new(RwLock::new(None)),
            repeat: AtomicBool::new(false),
            restart_in_flight: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn gate(&self) -> &ElementGate {
        &self.gate
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub async fn current(&self) -> Option<CurrentPlayback> {
        self.current.read().await.clone()
    }

    pub fn repeat_enabled(&self) -> bool {
        self.repeat.load(Ordering::SeqCst)
    }

    pub fn toggle_repeat(&self) -> bool {
        let enabled = !self.repeat.load(Ordering::SeqCst);
        self.repeat.store(enabled, Ordering::SeqCst);
        info!(enabled, "Repeat toggled");
        enabled
    }

    async fn set_state(&self, next: SessionState) -> Result<()> {
        let current = *self.state.read().await;
        if !current.can_transition_to(next) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        *self.state.write().await = next;
        let _ = self.state_tx.send(next);
        info!(from = %current, to = %next, "Session state");
        Ok(())
    }

    async fn force_state(&self, next: SessionState) {
        *self.state.write().await = next;
        let _ = self.state_tx.send(next);
    }

    async fn fail(&self, err: Error) -> Error {
        self.force_state(SessionState::Failed).await;
        err
    }

    /// Start playing an item. Any active playback is fully torn down
    /// first.
    #[instrument(skip(self, playable), fields(session_id = %self.id, name = playable.display_name()))]
    pub async fn start(&self, playable: PlayableItem) -> Result<()> {
        self.teardown().await;
        *self.last_playable.write().await = Some(playable.clone());
        self.set_state(SessionState::Starting).await?;

        let request = PlayRequest::for_item(&playable);
        let response = match self.api.resolve_player(&request).await {
            Ok(response) => response,
            Err(err) => return Err(self.fail(err).await),
        };
        if response.url.trim().is_empty() {
            let err = Error::NoPlaybackUrl { name: playable.display_name().to_string() };
            return Err(self.fail(err).await);
        }
        let url = response.url.trim().to_string();
        debug!(%url, drm = response.drm.is_some(), "Stream resolved");

        // YouTube items never touch the media pipeline.
        if let Some(youtube_id) = extract_youtube_id(&url) {
            info!(%youtube_id, "YouTube embed");
            *self.current.write().await = Some(CurrentPlayback {
                playable,
                url,
                backend: BackendKind::YoutubeEmbed,
                youtube_id: Some(youtube_id),
                drm: None,
                selected_track: None,
            });
            self.set_state(SessionState::Playing).await?;
            return Ok(());
        }

        let has_drm = response.drm.is_some()
            || playable.descriptor().map(|d| d.has_drm()).unwrap_or(false);
        let Some(kind) = select_backend(&url, playable.descriptor(), has_drm, &self.capabilities)
        else {
            let err = Error::UnsupportedMedia(format!("no backend can play {url}"));
            return Err(self.fail(err).await);
        };

        if let Err(err) = self
            .gate
            .wait_ready(self.config.element_ready_retries, self.config.element_ready_wait_ms)
            .await
        {
            return Err(self.fail(err).await);
        }

        let drm = response.drm.clone();
        let loaded = match self.load_with_fallback(kind, &url, drm.as_ref()).await {
            Ok(loaded) => loaded,
            Err(err) => return Err(self.fail(err).await),
        };

        let selected_track = if loaded.backend.kind() == BackendKind::ManifestPlayer {
            self.auto_select_track(&loaded.backend).await
        } else {
            None
        };

        *self.active_backend.write().await = Some(loaded.backend.clone());
        *self.current.write().await = Some(CurrentPlayback {
            playable,
            url: loaded.url,
            backend: loaded.backend.kind(),
            youtube_id: None,
            drm,
            selected_track,
        });
        self.set_state(SessionState::Playing).await?;
        Ok(())
    }

    /// Stop playback and release the backend. Safe to call in any
    /// state.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn stop(&self) -> Result<()> {
        self.teardown().await;
        self.force_state(SessionState::Stopped).await;
        Ok(())
    }

    /// Restart playback from the last requested item with a fresh
    /// stream resolution. Works after a failed start as well as during
    /// playback.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn reload(&self) -> Result<()> {
        let Some(playable) = self.last_playable.read().await.clone() else {
            let from = self.state().await;
            return Err(Error::InvalidStateTransition {
                from: from.to_string(),
                to: "reload".into(),
            });
        };
        info!(name = playable.display_name(), "Reloading");
        self.start(playable).await
    }

    /// Signal that the stream reached its end. With repeat enabled the
    /// same item is re-resolved and restarted after a short delay;
    /// otherwise the session stops.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn on_ended(&self) -> Result<()> {
        if !self.repeat.load(Ordering::SeqCst) {
            return self.stop().await;
        }
        self.restart_current().await
    }

    /// Signal a backend error during playback. With repeat enabled the
    /// item is restarted through the same path as end-of-stream;
    /// otherwise the session tears down and fails, leaving reload
    /// available.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn on_error(&self) -> Result<()> {
        if !self.repeat.load(Ordering::SeqCst) {
            self.teardown().await;
            self.force_state(SessionState::Failed).await;
            return Ok(());
        }
        self.restart_current().await
    }

    /// Overlapping restart signals trigger at most one restart.
    async fn restart_current(&self) -> Result<()> {
        if self
            .restart_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Restart already in flight");
            return Ok(());
        }
        let result = async {
            let Some(current) = self.current.read().await.clone() else {
                return self.stop().await;
            };
            info!(name = current.playable.display_name(), "Repeating");
            tokio::time::sleep(Duration::from_millis(self.config.repeat_delay_ms)).await;
            // Re-resolve: stream locators are time-limited.
            self.start(current.playable).await
        }
        .await;
        self.restart_in_flight.store(false, Ordering::SeqCst);
        result
    }

    /// Manually pick a variant track on the active manifest player.
    /// Unknown ids are ignored.
    pub async fn select_track(&self, id: u32) -> Result<()> {
        let Some(backend) = self.active_backend.read().await.clone() else {
            return Err(Error::PlaybackBackend("no active backend".into()));
        };
        let tracks = backend.variant_tracks().await;
        let Some(track) = crate::tracks::find_track(&tracks, id).cloned() else {
            warn!(id, "Unknown track id, ignoring");
            return Ok(());
        };
        backend.select_track(id).await?;
        if let Some(current) = self.current.write().await.as_mut() {
            current.selected_track = Some(track);
        }
        Ok(())
    }

    async fn teardown(&self) {
        if let Some(backend) = self.active_backend.write().await.take() {
            if let Err(err) = backend.stop().await {
                warn!(error = %err, "Backend stop failed during teardown");
            }
        }
        *self.current.write().await = None;
    }

    async fn auto_select_track(&self, backend: &Arc<dyn MediaBackend>) -> Option<VariantTrack> {
        let tracks = backend.variant_tracks().await;
        let best = select_best(&tracks, &self.capabilities)?;
        match backend.select_track(best.id).await {
            Ok(()) => {
                info!(id = best.id, height = best.height, bandwidth = best.bandwidth, "Track selected");
                Some(best)
            }
            Err(err) => {
                warn!(error = %err, "Track selection failed, keeping backend default");
                None
            }
        }
    }

    async fn load_with_fallback(
        &self,
        kind: BackendKind,
        url: &str,
        drm: Option<&DrmInfo>,
    ) -> Result<LoadedBackend> {
        let backend = self.require_backend(kind)?;
        match backend.load(url, drm).await {
            Ok(()) => {
                return Ok(LoadedBackend { backend, url: url.to_string() });
            }
            Err(err) if kind == BackendKind::Native => {
                warn!(error = %err, "Native load failed, starting fallback chain");
            }
            Err(err) => return Err(err),
        }

        for step in fallback_plan(url) {
            debug!(step = step.describe(), "Fallback attempt");
            let (retry_kind, retry_url) = match &step {
                FallbackStep::UnwrapProxy { source_url } => (BackendKind::Native, source_url.clone()),
                FallbackStep::DowngradeScheme { downgraded_url } => {
                    (BackendKind::Native, downgraded_url.clone())
                }
                FallbackStep::ManifestPlayer { url } => (BackendKind::ManifestPlayer, url.clone()),
            };
            let backend = self.require_backend(retry_kind)?;
            match backend.load(&retry_url, drm).await {
                Ok(()) => {
                    info!(step = step.describe(), url = %retry_url, "Fallback succeeded");
                    return Ok(LoadedBackend { backend, url: retry_url });
                }
                Err(err) => {
                    warn!(step = step.describe(), error = %err, "Fallback step failed");
                }
            }
        }

        Err(Error::PlaybackFailed { url: url.to_string() })
    }

    fn require_backend(&self, kind: BackendKind) -> Result<Arc<dyn MediaBackend>> {
        self.backends
            .backend(kind)
            .ok_or_else(|| Error::PlaybackBackend(format!("no {kind} backend available")))
    }
}

struct LoadedBackend {
    backend: Arc<dyn MediaBackend>,
    url: String,
}
