use std::str::FromStr;
use std::time::Duration;

use gateway_comfyui::client::UpstreamConfig;
use gateway_comfyui::retry::RetryConfig;
use gateway_comfyui::waiter::WaitPolicy;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// Inbound request timeout in seconds. Must exceed the simple-wait
    /// deadline so that blocking callers see the waiter's 504.
    pub request_timeout_secs: u64,
    /// Base URL of the ComfyUI instance.
    pub comfy_url: String,
    /// Prefix for the `status_url` / `result_url` handed to clients.
    /// Empty yields root-relative URLs.
    pub public_base_url: String,
    /// Upstream client timeouts and pool sizing.
    pub upstream: UpstreamConfig,
    /// Retry-once policy for job submission.
    pub submit_retry: RetryConfig,
    /// Poll cadence and deadline for `POST /image/simple`.
    pub simple_wait: WaitPolicy,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default                 |
    /// |-----------------------------------|-------------------------|
    /// | `HOST`                            | `0.0.0.0`               |
    /// | `PORT`                            | `3000`                  |
    /// | `CORS_ORIGINS`                    | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`            | `660`                   |
    /// | `COMFY_URL`                       | `http://comfyui:8188`   |
    /// | `PUBLIC_BASE_URL`                 | (empty)                 |
    /// | `UPSTREAM_CONNECT_TIMEOUT_SECS`   | `10`                    |
    /// | `UPSTREAM_READ_TIMEOUT_SECS`      | `300`                   |
    /// | `UPSTREAM_TOTAL_TIMEOUT_SECS`     | `600`                   |
    /// | `UPSTREAM_POOL_IDLE_TIMEOUT_SECS` | `90`                    |
    /// | `UPSTREAM_POOL_MAX_IDLE_PER_HOST` | `16`                    |
    /// | `SUBMIT_RETRY_DELAY_MS`           | `1000`                  |
    /// | `SIMPLE_POLL_INTERVAL_MS`         | `1000`                  |
    /// | `SIMPLE_DEADLINE_SECS`            | `600`                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_or("PORT", 3000);

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let comfy_url = std::env::var("COMFY_URL").unwrap_or_else(|_| "http://comfyui:8188".into());
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_default();

        let upstream = UpstreamConfig {
            connect_timeout: Duration::from_secs(env_or("UPSTREAM_CONNECT_TIMEOUT_SECS", 10)),
            read_timeout: Duration::from_secs(env_or("UPSTREAM_READ_TIMEOUT_SECS", 300)),
            total_timeout: Duration::from_secs(env_or("UPSTREAM_TOTAL_TIMEOUT_SECS", 600)),
            pool_idle_timeout: Duration::from_secs(env_or("UPSTREAM_POOL_IDLE_TIMEOUT_SECS", 90)),
            pool_max_idle_per_host: env_or("UPSTREAM_POOL_MAX_IDLE_PER_HOST", 16),
        };

        let submit_retry = RetryConfig {
            delay: Duration::from_millis(env_or("SUBMIT_RETRY_DELAY_MS", 1000)),
        };

        let simple_wait = WaitPolicy {
            interval: Duration::from_millis(env_or("SIMPLE_POLL_INTERVAL_MS", 1000)),
            deadline: Duration::from_secs(env_or("SIMPLE_DEADLINE_SECS", 600)),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 660),
            comfy_url,
            public_base_url,
            upstream,
            submit_retry,
            simple_wait,
        }
    }
}

/// Read and parse an env var, falling back to `default` when unset.
///
/// Panics on a value that does not parse; misconfiguration should fail
/// at startup.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
