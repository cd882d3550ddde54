//! Integration tests for Ottr Core

use ottr_core::{
    enrich::{enrich_episodes, resolve_episode_number, resolve_season},
    fallback_plan, parse_launch_payload, rank_tracks, select_backend, sort_accounts,
    with_synthetic_all_category, Account, AccountKind, BackendKind, Category, ContentMode,
    Detail, DeviceCapabilities, Episode, EpisodeMeta, FallbackStep, Item, SessionState,
    VariantTrack,
};

// =============================================================================
// Account and Category Tests
// =============================================================================

fn account(db_id: &str, name: &str, pinned: bool) -> Account {
    Account {
        db_id: db_id.into(),
        name: name.into(),
        kind: AccountKind::StalkerPortal,
        pin_to_top: pinned,
    }
}

#[test]
fn test_account_ordering_pinned_then_numeric() {
    let mut accounts = vec![
        account("10", "zeta", false),
        account("2", "alpha", false),
        account("30", "pinned", true),
    ];
    sort_accounts(&mut accounts);
    let names: Vec<&str> = accounts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["pinned", "alpha", "zeta"]);
}

#[test]
fn test_synthetic_all_not_duplicated() {
    let categories = vec![
        Category { id: "9".into(), title: "ALL".into() },
        Category { id: "1".into(), title: "Sports".into() },
    ];
    let result = with_synthetic_all_category(categories, AccountKind::StalkerPortal);
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].title, "ALL");
}

#[test]
fn test_synthetic_all_prepended_for_playlists() {
    let categories = vec![Category { id: "1".into(), title: "Music".into() }];
    let result = with_synthetic_all_category(categories, AccountKind::M3uPlaylist);
    assert_eq!(result[0].id, "All");
    assert_eq!(result.len(), 2);
}

// =============================================================================
// Enrichment Tests
// =============================================================================

fn episode(name: &str) -> Episode {
    Episode {
        item: Item { name: name.into(), ..Item::default() },
        ..Episode::default()
    }
}

#[test]
fn test_sxe_notation_wins_over_nxn() {
    let ep = episode("Show S02E05 also known as 3x07");
    assert_eq!(resolve_season(&ep), Some(2));
    assert_eq!(resolve_episode_number(&ep), Some(5));
}

#[test]
fn test_explicit_fields_win_over_title_extraction() {
    let mut ep = episode("Show S02E05");
    ep.season = Some(4);
    ep.episode_num = Some(9);
    assert_eq!(resolve_season(&ep), Some(4));
    assert_eq!(resolve_episode_number(&ep), Some(9));
}

#[test]
fn test_enrichment_is_idempotent_and_fills_only_blanks() {
    let mut ep = episode("S01E02 - The Visit");
    ep.description = "already written".into();
    let detail = Detail {
        episodes_meta: vec![EpisodeMeta {
            title: "The Visit".into(),
            season: Some(1),
            episode_num: Some(2),
            logo: "http://img/ep.png".into(),
            plot: "meta plot".into(),
            release_date: "2020-01-02".into(),
        }],
        ..Detail::default()
    };

    let once = enrich_episodes(vec![ep], &detail);
    assert_eq!(once[0].description, "already written");
    assert_eq!(once[0].item.logo, "http://img/ep.png");
    assert_eq!(once[0].release_date, "2020-01-02");

    let twice = enrich_episodes(once.clone(), &detail);
    assert_eq!(once, twice);
}

// =============================================================================
// Backend Selection Tests
// =============================================================================

fn caps(native_hls: bool) -> DeviceCapabilities {
    DeviceCapabilities { native_hls, hevc: false, avc: true }
}

#[test]
fn test_backend_selection_order() {
    // YouTube first, regardless of anything else
    assert_eq!(
        select_backend("https://youtu.be/dQw4w9WgXcQ", None, true, &caps(true)),
        Some(BackendKind::YoutubeEmbed)
    );
    // DRM forces the manifest player
    assert_eq!(
        select_backend("https://cdn/x.m3u8", None, true, &caps(true)),
        Some(BackendKind::ManifestPlayer)
    );
    // Progressive extensions go native
    assert_eq!(
        select_backend("https://cdn/movie.mkv", None, false, &caps(false)),
        Some(BackendKind::Native)
    );
    // HLS splits on native capability
    assert_eq!(
        select_backend("https://cdn/x.m3u8", None, false, &caps(true)),
        Some(BackendKind::Native)
    );
    assert_eq!(
        select_backend("https://cdn/x.m3u8", None, false, &caps(false)),
        Some(BackendKind::ManifestPlayer)
    );
}

#[test]
fn test_youtube_host_without_id_fails_closed() {
    assert_eq!(
        select_backend("https://www.youtube.com/playlist?list=abc", None, false, &caps(true)),
        None
    );
}

// =============================================================================
// Fallback Chain Tests
// =============================================================================

#[test]
fn test_fallback_plan_order() {
    let url = "https://host/proxy-stream?src=https%3A%2F%2Forigin%2Flive%2Fplay%2F7.ts";
    let plan = fallback_plan(url);
    assert!(matches!(plan[0], FallbackStep::UnwrapProxy { .. }));
    assert!(matches!(plan.last(), Some(FallbackStep::ManifestPlayer { .. })));
}

#[test]
fn test_fallback_plan_always_ends_at_manifest_player() {
    let plan = fallback_plan("https://cdn/ordinary.mp4");
    assert_eq!(plan.len(), 1);
    assert!(matches!(plan[0], FallbackStep::ManifestPlayer { .. }));
}

// =============================================================================
// Track Ranking Tests
// =============================================================================

fn track(id: u32, codecs: &str, height: u32, bandwidth: u64) -> VariantTrack {
    VariantTrack { id, codecs: codecs.into(), height, bandwidth, audio_only: false }
}

#[test]
fn test_hevc_preferred_when_decodable() {
    let tracks = vec![
        track(1, "avc1.640028", 1080, 8_000_000),
        track(2, "hvc1.1.6.L120", 1080, 4_000_000),
    ];
    let caps = DeviceCapabilities { native_hls: true, hevc: true, avc: true };
    let ranked = rank_tracks(&tracks, &caps);
    assert_eq!(ranked[0].id, 2);

    let no_hevc = DeviceCapabilities { native_hls: true, hevc: false, avc: true };
    let ranked = rank_tracks(&tracks, &no_hevc);
    assert_eq!(ranked[0].id, 1);
}

#[test]
fn test_resolution_beats_bandwidth() {
    let tracks = vec![
        track(1, "avc1", 720, 9_000_000),
        track(2, "avc1", 1080, 3_000_000),
    ];
    let ranked = rank_tracks(&tracks, &caps(true));
    assert_eq!(ranked[0].id, 2);
}

// =============================================================================
// Session State Tests
// =============================================================================

#[test]
fn test_session_state_transitions() {
    assert!(SessionState::Idle.can_transition_to(SessionState::Starting));
    assert!(SessionState::Starting.can_transition_to(SessionState::Playing));
    assert!(SessionState::Playing.can_transition_to(SessionState::Starting));
    assert!(SessionState::Failed.can_transition_to(SessionState::Starting));

    assert!(!SessionState::Idle.can_transition_to(SessionState::Playing));
    assert!(!SessionState::Stopped.can_transition_to(SessionState::Playing));
}

// =============================================================================
// Launch Payload Tests
// =============================================================================

#[test]
fn test_launch_payload_roundtrip_shape() {
    // {"accountId":"1","categoryId":"5","mode":"vod","channel":{"name":"Movie"}}
    let encoded =
        "eyJhY2NvdW50SWQiOiIxIiwiY2F0ZWdvcnlJZCI6IjUiLCJtb2RlIjoidm9kIiwiY2hhbm5lbCI6eyJuYW1lIjoiTW92aWUifX0";
    let payload = parse_launch_payload(encoded).expect("payload decodes");
    assert_eq!(payload.account_id, "1");
    assert_eq!(payload.mode, ContentMode::Vod);
    assert_eq!(payload.channel.name, "Movie");
}

#[test]
fn test_launch_payload_rejects_garbage() {
    assert!(parse_launch_payload("not base64url!!!").is_none());
    assert!(parse_launch_payload("").is_none());
}
