//! Shared HTTP client for every outbound call (RPC, indexer, relay, text backend).

use once_cell::sync::Lazy;
use std::time::Duration;

/// Request timeout applied by the transport; the bot itself keeps no timers.
const REQUEST_TIMEOUT_SECS: u64 = 60;

static SHARED_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|e| {
            log::warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
            reqwest::Client::new()
        })
});

pub fn shared_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}
