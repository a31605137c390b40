// --- File: crates/courtside_common/src/http/client.rs ---
use reqwest::{Client, Error as ReqwestError};
use std::time::Duration;

/// Default timeout for HTTP requests in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Creates a new HTTP client for backend calls.
///
/// # Arguments
///
/// * `timeout_secs` - The timeout in seconds for each request; `0` selects the default
///
/// # Returns
///
/// A new reqwest::Client instance with the specified configuration
pub fn create_client(timeout_secs: u64) -> Result<Client, ReqwestError> {
    let timeout_secs = if timeout_secs == 0 {
        DEFAULT_TIMEOUT_SECS
    } else {
        timeout_secs
    };

    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("courtside-push/", env!("CARGO_PKG_VERSION")))
        .build()
}
