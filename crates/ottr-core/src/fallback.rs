//! Ordered recovery for native playback failures
//!
//! When the native element rejects a stream the controller walks this
//! chain, stopping at the first attempt that plays: unwrap a proxied
//! source URL, downgrade the scheme for known insecure-origin paths,
//! and finally hand the original URL to the manifest player. A failure
//! at the last step is terminal for that attempt.

use url::Url;

/// Path shapes that are only ever served over plain HTTP upstream
const INSECURE_ONLY_PATHS: [&str; 2] = ["/live/play/", "/play/movie.php"];

/// One recovery attempt in the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackStep {
    /// Retry natively with the source URL unwrapped from a proxy address
    UnwrapProxy { source_url: String },
    /// Retry natively with the scheme downgraded to HTTP
    DowngradeScheme { downgraded_url: String },
    /// Retry the original URL through the manifest player
    ManifestPlayer { url: String },
}

impl FallbackStep {
    pub fn describe(&self) -> &'static str {
        match self {
            FallbackStep::UnwrapProxy { .. } => "unwrap-proxy",
            FallbackStep::DowngradeScheme { .. } => "downgrade-scheme",
            FallbackStep::ManifestPlayer { .. } => "manifest-player",
        }
    }
}

/// Pull the embedded source URL out of a `/proxy-stream?src=...`
/// address. Anything else returns `None`.
pub fn unwrap_proxy_source(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    if !parsed.path().contains("/proxy-stream") {
        return None;
    }
    parsed
        .query_pairs()
        .find(|(key, _)| key == "src")
        .map(|(_, value)| value.into_owned())
        .filter(|v| !v.is_empty())
}

/// Downgrade `https://` to `http://` for path shapes that upstream only
/// serves over plain HTTP. Other URLs pass through unchanged.
pub fn downgrade_known_insecure_paths(url: &str) -> String {
    let value = url.trim();
    let lower = value.to_lowercase();
    if lower.starts_with("https://") && INSECURE_ONLY_PATHS.iter().any(|p| lower.contains(p)) {
        return format!("http://{}", &value["https://".len()..]);
    }
    value.to_string()
}

/// Build the ordered attempt list for a URL that just failed natively.
/// Steps that do not apply to this URL shape are omitted; the manifest
/// player is always the last resort.
pub fn fallback_plan(url: &str) -> Vec<FallbackStep> {
    let mut plan = Vec::with_capacity(3);

    if let Some(source_url) = unwrap_proxy_source(url) {
        plan.push(FallbackStep::UnwrapProxy { source_url });
    }

    let downgraded = downgrade_known_insecure_paths(url);
    if downgraded != url.trim() {
        plan.push(FallbackStep::DowngradeScheme { downgraded_url: downgraded });
    }

    plan.push(FallbackStep::ManifestPlayer { url: url.trim().to_string() });
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_proxy_source_parameter() {
        let url = "http://127.0.0.1:8888/proxy-stream?src=http%3A%2F%2Fcdn%2Fstream.ts";
        assert_eq!(unwrap_proxy_source(url).as_deref(), Some("http://cdn/stream.ts"));
        assert_eq!(unwrap_proxy_source("http://cdn/stream.ts"), None);
    }

    #[test]
    fn downgrades_only_known_paths() {
        assert_eq!(
            downgrade_known_insecure_paths("https://host/live/play/ID"),
            "http://host/live/play/ID"
        );
        assert_eq!(
            downgrade_known_insecure_paths("https://host/play/movie.php?id=4"),
            "http://host/play/movie.php?id=4"
        );
        assert_eq!(
            downgrade_known_insecure_paths("https://host/other/path"),
            "https://host/other/path"
        );
        assert_eq!(
            downgrade_known_insecure_paths("http://host/live/play/ID"),
            "http://host/live/play/ID"
        );
    }

    #[test]
    fn downgrade_comes_before_manifest_player() {
        let plan = fallback_plan("https://host/live/play/ID");
        assert_eq!(plan.len(), 2);
        assert_eq!(
            plan[0],
            FallbackStep::DowngradeScheme { downgraded_url: "http://host/live/play/ID".into() }
        );
        assert!(matches!(plan[1], FallbackStep::ManifestPlayer { .. }));
    }

    #[test]
    fn proxied_url_unwraps_first() {
        let plan = fallback_plan("http://127.0.0.1:8888/proxy-stream?src=http%3A%2F%2Fcdn%2Fa.ts");
        assert!(matches!(plan[0], FallbackStep::UnwrapProxy { .. }));
        assert!(matches!(plan.last(), Some(FallbackStep::ManifestPlayer { .. })));
    }

    #[test]
    fn plain_url_gets_only_manifest_retry() {
        let plan = fallback_plan("http://host/stream/886");
        assert_eq!(plan.len(), 1);
        assert!(matches!(plan[0], FallbackStep::ManifestPlayer { .. }));
    }
}
