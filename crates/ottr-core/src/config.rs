//! Client configuration

use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for the ottr client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the aggregator backend
    pub base_url: Url,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// How many items a channel list grows by per local widening step
    pub page_batch_size: usize,
    /// Delay before an auto-repeat restart in milliseconds
    pub repeat_delay_ms: u64,
    /// Bounded retries while waiting for the media element signal
    pub element_ready_retries: u32,
    /// How long each element-ready wait lasts in milliseconds
    pub element_ready_wait_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://127.0.0.1:8888").expect("static URL"),
            request_timeout_ms: 15_000,
            page_batch_size: 50,
            repeat_delay_ms: 1_200,
            element_ready_retries: 6,
            element_ready_wait_ms: 25,
        }
    }
}
