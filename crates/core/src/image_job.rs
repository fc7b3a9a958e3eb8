//! Client-facing vocabulary of the asynchronous image job protocol.
//!
//! Jobs are identified solely by the backend-issued prompt id; nothing in
//! this module (or anywhere else in the gateway) records jobs locally.

use serde::Serialize;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Protocol constants
// ---------------------------------------------------------------------------

/// Seconds a client should wait before polling again (`Retry-After`).
pub const RETRY_AFTER_SECS: u64 = 2;

/// Route prefix for job resources.
pub const JOBS_PATH: &str = "/image/jobs";

/// Longest job id accepted on the polling route.
pub const MAX_JOB_ID_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Status reported to polling clients.
///
/// `Queued` is only returned by Create. A backend that has not indexed the
/// job yet is indistinguishable from one still running it, so polls report
/// `Running` for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    /// History lists the artifact but the file is not retrievable yet.
    Processing,
    Ready,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Processing => "processing",
            JobStatus::Ready => "ready",
        }
    }
}

// ---------------------------------------------------------------------------
// URLs
// ---------------------------------------------------------------------------

/// Polling URL for a job (status-only mode).
pub fn status_url(base: &str, job_id: &str) -> String {
    format!("{}?json=1", result_url(base, job_id))
}

/// Result URL for a job (fetch mode).
pub fn result_url(base: &str, job_id: &str) -> String {
    format!("{}{JOBS_PATH}/{job_id}", base.trim_end_matches('/'))
}

/// Interpret the `json` query flag. Absent means fetch mode.
pub fn parse_status_only_flag(raw: Option<&str>) -> Result<bool, CoreError> {
    match raw.map(str::trim) {
        None | Some("") | Some("0") | Some("false") => Ok(false),
        Some("1") | Some("true") => Ok(true),
        Some(other) => Err(CoreError::Validation(format!(
            "Invalid json flag '{other}'. Must be 0 or 1"
        ))),
    }
}

/// Reject job ids that cannot have been issued by the backend before they
/// are interpolated into an upstream URL path.
pub fn validate_job_id(job_id: &str) -> Result<(), CoreError> {
    if job_id.is_empty() || job_id.len() > MAX_JOB_ID_LEN {
        return Err(CoreError::Validation(format!(
            "Job id must be 1-{MAX_JOB_ID_LEN} characters"
        )));
    }
    if !job_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CoreError::Validation(format!(
            "Job id '{job_id}' contains invalid characters"
        )));
    }
    Ok(())
}
