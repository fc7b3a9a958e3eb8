//! Retry-once policy for upstream calls that hit a cold or restarting
//! backend.
//!
//! A freshly started backend tends to refuse or reset the first
//! connection. [`retry_once`] repeats an operation exactly one time after
//! a fixed delay when the first failure is transient; any other failure,
//! or a second failure, is returned unchanged.

use std::future::Future;
use std::time::Duration;

/// Tunable parameters for the retry-once policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Pause between the failed attempt and the retry.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
        }
    }
}

/// Run `op`, retrying it once after `config.delay` if it fails with an
/// error `is_transient` accepts.
pub async fn retry_once<T, E, F, Fut>(
    config: &RetryConfig,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match op().await {
        Err(e) if is_transient(&e) => {
            tracing::warn!(
                error = %e,
                delay_ms = config.delay.as_millis() as u64,
                "Transient upstream failure, retrying once",
            );
            tokio::time::sleep(config.delay).await;
            op().await
        }
        other => other,
    }
}

/// Whether a request error is a connection-class failure worth one retry.
///
/// Timeouts are not retried: the backend is reachable but slow, and a
/// second attempt would double the caller's wait.
pub fn is_transient(err: &reqwest::Error) -> bool {
    if err.is_timeout() {
        return false;
    }
    if err.is_connect() {
        return true;
    }
    has_io_kind(err, |kind| {
        matches!(
            kind,
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
        )
    })
}

/// Walk the error's source chain looking for an I/O error of a given kind.
fn has_io_kind(
    err: &(dyn std::error::Error + 'static),
    pred: impl Fn(std::io::ErrorKind) -> bool,
) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if pred(io.kind()) {
                return true;
            }
        }
        source = e.source();
    }
    false
}
