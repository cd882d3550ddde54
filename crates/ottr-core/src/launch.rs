//! External launch payload decoding
//!
//! A base64url-encoded JSON payload on the launch URL jumps the client
//! straight into playback of a specific item. Decoded once at startup;
//! anything malformed is ignored rather than reported.

use crate::types::{ContentMode, Item};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Out-of-band instruction to start playback immediately
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchPayload {
    #[serde(rename = "accountId", default)]
    pub account_id: String,
    #[serde(rename = "categoryId", default)]
    pub category_id: String,
    #[serde(default = "default_mode")]
    pub mode: ContentMode,
    pub channel: Item,
}

fn default_mode() -> ContentMode {
    ContentMode::Itv
}

/// Decode a base64url value, tolerating both padded and unpadded input
pub fn decode_base64url(value: &str) -> Option<Vec<u8>> {
    let trimmed = value.trim().trim_end_matches('=');
    if trimmed.is_empty() {
        return None;
    }
    URL_SAFE_NO_PAD.decode(trimmed).ok()
}

/// Parse the launch payload from its encoded query-parameter value.
/// Returns `None` for anything that does not decode to a valid payload.
pub fn parse_launch_payload(encoded: &str) -> Option<LaunchPayload> {
    let bytes = decode_base64url(encoded)?;
    match serde_json::from_slice::<LaunchPayload>(&bytes) {
        Ok(payload) => Some(payload),
        Err(err) => {
            debug!(%err, "Discarding malformed launch payload");
            None
        }
    }
}
