//! Playback backend selection
//!
//! Inspects a resolved stream URL and its descriptor and decides which
//! backend gets the first attempt. Native playback is zero-overhead but
//! inflexible; the manifest player is the only backend that can do DRM
//! and is the universal fallback; YouTube material must go to an embed.

use crate::types::{BackendKind, DeviceCapabilities, ManifestKind, PlaybackDescriptor};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// File extensions the native media element plays progressively
const PROGRESSIVE_EXTENSIONS: [&str; 8] =
    [".mp4", ".mkv", ".webm", ".avi", ".mov", ".m4v", ".ts", ".mp3"];

/// Path shapes providers use for direct-play streams
const DIRECT_PLAY_MARKERS: [&str; 2] = ["/live/play/", "/play/movie.php"];

fn youtube_patterns() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?i)youtube\.com/watch\?[^#\s]*v=([A-Za-z0-9_-]{11})",
            r"(?i)youtube\.com/embed/([A-Za-z0-9_-]{11})",
            r"(?i)youtu\.be/([A-Za-z0-9_-]{11})",
            r"(?i)youtube\.com/shorts/([A-Za-z0-9_-]{11})",
            r"(?i)youtube-nocookie\.com/embed/([A-Za-z0-9_-]{11})",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
    })
}

fn nested_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:^|[?&])url=([^&]+)").expect("static regex"))
}

/// Minimal percent-decoding; malformed escapes are left as-is
fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            // get() rather than slicing: '%' may sit before a multibyte char
            if let Some(byte) = value
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn match_direct(value: &str) -> Option<String> {
    youtube_patterns()
        .iter()
        .find_map(|re| re.captures(value))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract an 11-character YouTube video id from a URL or play command.
///
/// Handles watch/embed/short-link/shorts/nocookie shapes, an optional
/// `ffmpeg ` command prefix, and one level of URL nesting via a `url=`
/// query parameter. Returns `None` when no id can be extracted.
pub fn extract_youtube_id(value: &str) -> Option<String> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }
    let decoded = percent_decode(raw);
    let cleaned = decoded
        .strip_prefix("ffmpeg ")
        .or_else(|| decoded.strip_prefix("FFMPEG "))
        .unwrap_or(&decoded)
        .trim();

    if let Some(id) = match_direct(cleaned) {
        return Some(id);
    }

    // Some sources hide the real target behind url=https://youtube...
    if let Some(nested) = nested_url_re().captures(cleaned).and_then(|c| c.get(1)) {
        let nested = percent_decode(nested.as_str());
        if let Some(id) = match_direct(&nested) {
            return Some(id);
        }
    }
    None
}

/// First id found across several candidate strings (resolved URL, raw
/// play command, request URL)
pub fn extract_youtube_id_from_any<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    values.into_iter().find_map(extract_youtube_id)
}

fn looks_like_youtube_host(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("youtube.com") || lower.contains("youtu.be") || lower.contains("youtube-nocookie.com")
}

fn url_extension_matches(url: &str, extensions: &[&str]) -> bool {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .to_lowercase();
    extensions.iter().any(|ext| path.ends_with(ext))
}

/// Pick the backend for a resolved playback URL.
///
/// Decision order, a deliberate cost/compatibility trade-off:
/// 1. YouTube-shaped URL -> embed, failing closed when no id extracts
/// 2. DRM present -> manifest player (the only license-aware backend)
/// 3. Progressive file extension or direct-play path -> native
/// 4. Segmented DASH -> manifest player
/// 5. HLS -> native only with native HLS support, else manifest player
/// 6. Anything else -> native first, manifest player as the documented
///    fallback
///
/// `None` means no backend can take the stream (fail closed).
pub fn select_backend(
    url: &str,
    descriptor: Option<&PlaybackDescriptor>,
    has_drm: bool,
    caps: &DeviceCapabilities,
) -> Option<BackendKind> {
    let cmd = descriptor.map(|d| d.cmd.as_str()).unwrap_or("");
    if let Some(id) = extract_youtube_id_from_any([url, cmd]) {
        debug!(video_id = %id, "YouTube URL, using embed backend");
        return Some(BackendKind::YoutubeEmbed);
    }
    if looks_like_youtube_host(url) {
        debug!(url, "YouTube-shaped URL without extractable id, refusing");
        return None;
    }

    let descriptor_drm = descriptor.map(|d| d.has_drm()).unwrap_or(false);
    if has_drm || descriptor_drm {
        return Some(BackendKind::ManifestPlayer);
    }

    let lower = url.to_lowercase();
    if url_extension_matches(url, &PROGRESSIVE_EXTENSIONS)
        || DIRECT_PLAY_MARKERS.iter().any(|m| lower.contains(m))
    {
        return Some(BackendKind::Native);
    }

    let manifest_hint = descriptor.and_then(|d| d.manifest_type);
    if url_extension_matches(url, &[".mpd"]) || manifest_hint == Some(ManifestKind::Mpd) {
        return Some(BackendKind::ManifestPlayer);
    }

    if url_extension_matches(url, &[".m3u8", ".m3u"]) || manifest_hint == Some(ManifestKind::Hls) {
        return Some(if caps.native_hls {
            BackendKind::Native
        } else {
            BackendKind::ManifestPlayer
        });
    }

    // Unknown shape: cheapest backend first, fallback chain covers the rest.
    Some(BackendKind::Native)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(native_hls: bool) -> DeviceCapabilities {
        DeviceCapabilities { native_hls, hevc: false, avc: true }
    }

    #[test]
    fn extracts_watch_url_id() {
        assert_eq!(
            extract_youtube_id("https://www.youtube.com/watch?v=abcDEFghi12&t=5").as_deref(),
            Some("abcDEFghi12")
        );
    }

    #[test]
    fn extracts_short_and_embed_shapes() {
        assert_eq!(
            extract_youtube_id("https://youtu.be/abcDEFghi12").as_deref(),
            Some("abcDEFghi12")
        );
        assert_eq!(
            extract_youtube_id("https://www.youtube-nocookie.com/embed/abcDEFghi12").as_deref(),
            Some("abcDEFghi12")
        );
        assert_eq!(
            extract_youtube_id("https://www.youtube.com/shorts/abcDEFghi12").as_deref(),
            Some("abcDEFghi12")
        );
    }

    #[test]
    fn extracts_nested_url_parameter() {
        let nested = "http://proxy/fetch?url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3DabcDEFghi12";
        assert_eq!(extract_youtube_id(nested).as_deref(), Some("abcDEFghi12"));
    }

    #[test]
    fn strips_ffmpeg_prefix() {
        assert_eq!(
            extract_youtube_id("ffmpeg https://youtu.be/abcDEFghi12").as_deref(),
            Some("abcDEFghi12")
        );
    }

    #[test]
    fn fails_closed_on_short_id() {
        assert_eq!(extract_youtube_id("https://youtu.be/short"), None);
        assert_eq!(
            select_backend("https://www.youtube.com/watch?x=1", None, false, &caps(false)),
            None
        );
    }

    #[test]
    fn drm_forces_manifest_player() {
        let choice = select_backend("http://host/stream.mpd", None, true, &caps(true));
        assert_eq!(choice, Some(BackendKind::ManifestPlayer));
        // Even a progressive extension cannot dodge the license requirement.
        let choice = select_backend("http://host/file.mp4", None, true, &caps(true));
        assert_eq!(choice, Some(BackendKind::ManifestPlayer));
    }

    #[test]
    fn progressive_files_go_native() {
        let choice = select_backend("http://host/movie.mp4?token=1", None, false, &caps(false));
        assert_eq!(choice, Some(BackendKind::Native));
        let choice = select_backend("http://host/live/play/77", None, false, &caps(false));
        assert_eq!(choice, Some(BackendKind::Native));
    }

    #[test]
    fn dash_goes_to_manifest_player() {
        let choice = select_backend("http://host/stream.mpd", None, false, &caps(true));
        assert_eq!(choice, Some(BackendKind::ManifestPlayer));
    }

    #[test]
    fn hls_follows_capability_probe() {
        let url = "http://host/master.m3u8";
        assert_eq!(select_backend(url, None, false, &caps(true)), Some(BackendKind::Native));
        assert_eq!(
            select_backend(url, None, false, &caps(false)),
            Some(BackendKind::ManifestPlayer)
        );
    }

    #[test]
    fn unknown_shape_defaults_to_native() {
        let choice = select_backend("http://host/stream/886", None, false, &caps(false));
        assert_eq!(choice, Some(BackendKind::Native));
    }
}
