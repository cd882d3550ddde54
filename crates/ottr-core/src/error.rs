//! Error types for ottr-core

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Client error taxonomy.
///
/// Transport and decode failures are never fatal: callers leave the
/// last valid state intact and surface a transient message. Backend
/// playback failures feed the fallback chain; only chain exhaustion
/// yields the terminal `PlaybackFailed`.
#[derive(Error, Debug)]
pub enum Error {
    // Fetch errors
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Malformed response from {url}: {message}")]
    Decode { url: String, message: String },

    // Playback errors
    #[error("Playback backend error: {0}")]
    PlaybackBackend(String),

    #[error("Media not decodable by any available backend: {0}")]
    UnsupportedMedia(String),

    #[error("Playback failed after exhausting fallback chain for {url}")]
    PlaybackFailed { url: String },

    #[error("No playback URL resolved for {name}")]
    NoPlaybackUrl { name: String },

    #[error("Invalid session state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Media output element never became ready")]
    ElementUnavailable,

    // Configuration errors
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Build a decode error from a serde failure
    pub fn decode(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Error::Decode {
            url: url.into(),
            message: err.to_string(),
        }
    }

    /// Transient errors leave prior state intact and may be retried
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Status { .. } | Error::Decode { .. } | Error::PlaybackBackend(_)
        )
    }

    /// Stable code for status surfaces and logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Transport(_) => "TRANSPORT",
            Error::Status { .. } => "HTTP_STATUS",
            Error::Decode { .. } => "DECODE",
            Error::PlaybackBackend(_) => "BACKEND",
            Error::UnsupportedMedia(_) => "UNSUPPORTED_MEDIA",
            Error::PlaybackFailed { .. } => "PLAYBACK_FAILED",
            Error::NoPlaybackUrl { .. } => "NO_URL",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::ElementUnavailable => "NO_ELEMENT",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_recoverable() {
        let err = Error::Status { status: 502, url: "http://x/accounts".into() };
        assert!(err.is_recoverable());
        assert_eq!(err.error_code(), "HTTP_STATUS");
    }

    #[test]
    fn playback_failed_is_terminal() {
        let err = Error::PlaybackFailed { url: "http://x/stream".into() };
        assert!(!err.is_recoverable());
    }
}
