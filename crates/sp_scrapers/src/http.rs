use std::time::Duration;

use reqwest::Client;
use sp_core::{Error, Result};
use url::Url;

pub const USER_AGENT: &str = concat!("stockpulse/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared client for every outbound call. Each request is bounded by `timeout`.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

pub(crate) fn endpoint(base: &str, path: &str) -> Result<Url> {
    Url::parse(base)
        .and_then(|url| url.join(path))
        .map_err(|e| Error::Config(format!("Invalid base URL {}: {}", base, e)))
}
