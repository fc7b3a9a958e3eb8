//! Blocking wait for a submitted job's artifact.
//!
//! [`wait_for_artifact`] turns the asynchronous poll protocol into one
//! call: resolve, fetch when ready, otherwise sleep and try again until
//! the deadline passes. Dropping the returned future (for example when the
//! inbound caller disconnects) abandons the in-flight request or sleep.

use std::time::Duration;

use gateway_core::artifact::Artifact;
use tokio::time::Instant;

use crate::api::{ComfyUIApi, ComfyUIApiError, FetchOutcome};
use crate::history::HistoryState;

/// Poll cadence and overall budget for [`wait_for_artifact`].
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    /// Pause between polls while the job is not ready.
    pub interval: Duration,
    /// Total time allowed before giving up with [`WaitError::Timeout`].
    pub deadline: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            deadline: Duration::from_secs(600),
        }
    }
}

/// Errors from [`wait_for_artifact`].
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// The backend rejected a call or could not be reached.
    #[error(transparent)]
    Api(#[from] ComfyUIApiError),

    /// The deadline elapsed before an artifact could be fetched.
    #[error("Job {job_id} not ready after {}s", waited.as_secs())]
    Timeout { job_id: String, waited: Duration },
}

/// Poll `job_id` until its first artifact can be fetched.
///
/// Fails immediately on any upstream error. Against a backend that never
/// becomes ready, returns [`WaitError::Timeout`] no earlier than
/// `policy.deadline` and no later than one `policy.interval` after it.
/// Upstream calls still in flight at the deadline are abandoned.
pub async fn wait_for_artifact(
    api: &ComfyUIApi,
    job_id: &str,
    policy: &WaitPolicy,
) -> Result<Artifact, WaitError> {
    let started = Instant::now();
    let deadline_at = started + policy.deadline;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match tokio::time::timeout_at(deadline_at, poll_once(api, job_id, attempt)).await {
            Ok(Ok(Some(artifact))) => {
                tracing::info!(
                    job_id,
                    attempt,
                    filename = %artifact.filename,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Artifact ready",
                );
                return Ok(artifact);
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(timed_out(job_id, attempt, started)),
        }

        let now = Instant::now();
        if now >= deadline_at {
            return Err(timed_out(job_id, attempt, started));
        }

        // Never oversleep the deadline; the next pass re-polls, then times out.
        tokio::time::sleep_until((now + policy.interval).min(deadline_at)).await;
    }
}

/// One resolve-then-fetch pass. `None` while the job is not ready or the
/// listed file is not retrievable yet.
async fn poll_once(
    api: &ComfyUIApi,
    job_id: &str,
    attempt: u32,
) -> Result<Option<Artifact>, ComfyUIApiError> {
    let HistoryState::Ready(reference) = api.resolve_status(job_id).await? else {
        return Ok(None);
    };

    match api.fetch_artifact(&reference).await? {
        FetchOutcome::Fetched(artifact) => Ok(Some(artifact)),
        FetchOutcome::NotReady => {
            tracing::debug!(job_id, attempt, "Artifact listed but not yet retrievable");
            Ok(None)
        }
    }
}

fn timed_out(job_id: &str, attempt: u32, started: Instant) -> WaitError {
    let waited = started.elapsed();
    tracing::warn!(
        job_id,
        attempt,
        waited_ms = waited.as_millis() as u64,
        "Gave up waiting for artifact",
    );
    WaitError::Timeout {
        job_id: job_id.to_string(),
        waited,
    }
}
