//! Variant track ranking
//!
//! Pure policy over the manifest player's reported variant tracks.
//! Codec preference partitions the candidates, then resolution and
//! bandwidth impose a total order.

use crate::types::{DeviceCapabilities, VariantTrack};
use std::cmp::Ordering;

fn is_hevc(codecs: &str) -> bool {
    let lower = codecs.to_lowercase();
    lower.contains("hev1") || lower.contains("hvc1") || lower.contains("hevc")
}

fn is_avc(codecs: &str) -> bool {
    let lower = codecs.to_lowercase();
    lower.contains("avc1") || lower.contains("h264") || lower.contains("avc")
}

/// Descending by height, ties broken descending by bandwidth, then by
/// id so equal tracks still order deterministically.
fn rank(a: &VariantTrack, b: &VariantTrack) -> Ordering {
    b.height
        .cmp(&a.height)
        .then_with(|| b.bandwidth.cmp(&a.bandwidth))
        .then_with(|| a.id.cmp(&b.id))
}

/// Rank decodable video tracks best-first.
///
/// Audio-only tracks are excluded up front. If the device decodes HEVC
/// and HEVC tracks exist, only those compete; else the same for AVC;
/// else every video track competes unfiltered.
pub fn rank_tracks(tracks: &[VariantTrack], caps: &DeviceCapabilities) -> Vec<VariantTrack> {
    let video: Vec<&VariantTrack> = tracks.iter().filter(|t| !t.audio_only).collect();
    if video.is_empty() {
        return Vec::new();
    }

    let mut candidates: Vec<&VariantTrack> = if caps.hevc {
        let hevc: Vec<&VariantTrack> = video.iter().copied().filter(|t| is_hevc(&t.codecs)).collect();
        if hevc.is_empty() { video } else { hevc }
    } else if caps.avc {
        let avc: Vec<&VariantTrack> = video.iter().copied().filter(|t| is_avc(&t.codecs)).collect();
        if avc.is_empty() { video } else { avc }
    } else {
        video
    };

    candidates.sort_by(|a, b| rank(a, b));
    candidates.into_iter().cloned().collect()
}

/// Best track for the device, if any video track exists
pub fn select_best(tracks: &[VariantTrack], caps: &DeviceCapabilities) -> Option<VariantTrack> {
    rank_tracks(tracks, caps).into_iter().next()
}

/// Validate a manual track switch against the current set. Unknown ids
/// are a no-op, not an error.
pub fn find_track(tracks: &[VariantTrack], id: u32) -> Option<&VariantTrack> {
    tracks.iter().find(|t| t.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: u32, codecs: &str, height: u32, bandwidth: u64) -> VariantTrack {
        VariantTrack {
            id,
            codecs: codecs.to_string(),
            height,
            bandwidth,
            audio_only: false,
        }
    }

    fn caps(hevc: bool, avc: bool) -> DeviceCapabilities {
        DeviceCapabilities { native_hls: false, hevc, avc }
    }

    #[test]
    fn resolution_dominates_bandwidth() {
        let tracks = vec![
            track(1, "avc1.4d401f", 1080, 5_000_000),
            track(2, "avc1.4d401f", 1080, 3_000_000),
            track(3, "avc1.4d401f", 720, 8_000_000),
        ];
        let ranked = rank_tracks(&tracks, &caps(false, true));
        let ids: Vec<u32> = ranked.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn hevc_preferred_when_decodable() {
        let tracks = vec![
            track(1, "avc1.640028", 2160, 20_000_000),
            track(2, "hvc1.1.6.L93.B0", 1080, 6_000_000),
        ];
        assert_eq!(select_best(&tracks, &caps(true, true)).map(|t| t.id), Some(2));
        assert_eq!(select_best(&tracks, &caps(false, true)).map(|t| t.id), Some(1));
    }

    #[test]
    fn unfiltered_when_no_preferred_codec_present() {
        let tracks = vec![track(7, "vp09.00.10.08", 1440, 9_000_000)];
        assert_eq!(select_best(&tracks, &caps(true, true)).map(|t| t.id), Some(7));
    }

    #[test]
    fn audio_only_excluded_up_front() {
        let mut audio = track(9, "mp4a.40.2", 0, 128_000);
        audio.audio_only = true;
        let tracks = vec![audio, track(1, "avc1.4d401f", 480, 1_000_000)];
        let ranked = rank_tracks(&tracks, &caps(false, true));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, 1);
    }

    #[test]
    fn ranking_is_total_even_on_full_ties() {
        let tracks = vec![
            track(2, "avc1", 720, 4_000_000),
            track(1, "avc1", 720, 4_000_000),
        ];
        let ranked = rank_tracks(&tracks, &caps(false, true));
        assert_eq!(ranked[0].id, 1);
    }

    #[test]
    fn unknown_manual_switch_is_noop() {
        let tracks = vec![track(1, "avc1", 720, 1)];
        assert!(find_track(&tracks, 99).is_none());
        assert_eq!(find_track(&tracks, 1).map(|t| t.id), Some(1));
    }
}
