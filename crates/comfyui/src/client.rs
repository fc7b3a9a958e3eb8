//! Shared upstream HTTP client construction.
//!
//! One [`reqwest::Client`] is built at startup and shared (behind the
//! [`ComfyUIApi`](crate::api::ComfyUIApi)) by every request handler. Its
//! connection pool is the only resource requests contend for.

use std::time::Duration;

/// Timeout and pool settings for the upstream client.
///
/// The budgets are independent: `connect_timeout` bounds TCP/TLS setup,
/// `read_timeout` bounds each read while waiting for the backend, and
/// `total_timeout` caps one whole request including upload of the body.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub total_timeout: Duration,
    /// How long an idle pooled connection is kept open.
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(300),
            total_timeout: Duration::from_secs(600),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 16,
        }
    }
}

/// Build the pooled client used for all backend calls.
pub fn build_http_client(config: &UpstreamConfig) -> Result<reqwest::Client, reqwest::Error> {
    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .timeout(config.total_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build()?;

    tracing::debug!(
        connect_timeout_ms = config.connect_timeout.as_millis() as u64,
        read_timeout_ms = config.read_timeout.as_millis() as u64,
        total_timeout_ms = config.total_timeout.as_millis() as u64,
        "Upstream HTTP client built",
    );

    Ok(client)
}
