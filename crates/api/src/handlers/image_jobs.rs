//! Handlers for image generation jobs.
//!
//! Routes:
//! - `POST /image/jobs`           submit a text-to-image job
//! - `GET  /image/jobs/{job_id}`  poll status (`?json=1`) or fetch the image
//! - `POST /image/simple`         submit and block until the image is ready
//! - `POST /image/raw`            forward a prepared graph to `/prompt`
//!
//! Nothing is recorded locally: every poll re-reads the backend's history,
//! so a job the backend has forgotten polls as `running` indefinitely.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use gateway_comfyui::api::{FetchOutcome, SubmitResponse};
use gateway_comfyui::history::HistoryState;
use gateway_comfyui::waiter::wait_for_artifact;
use gateway_core::artifact::Artifact;
use gateway_core::image_job::{self, JobStatus, RETRY_AFTER_SECS};
use gateway_core::workflow::{self, TextToImageParams, TextToImageRequest};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::extract::JsonBody;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// Body of a successful Create.
#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub status_url: String,
    pub result_url: String,
    pub submitted_at: DateTime<Utc>,
}

/// Body of a not-yet-ready poll.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// Body of a status-only poll once the artifact is listed.
#[derive(Debug, Serialize)]
pub struct JobReadyResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub filename: String,
    pub media_type: &'static str,
    pub result_url: String,
}

/// Query string of `GET /image/jobs/{job_id}`.
#[derive(Debug, Deserialize)]
pub struct PollParams {
    /// `1` for status-only JSON, `0` or absent to fetch the image.
    pub json: Option<String>,
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /image/jobs
///
/// Builds the default text-to-image graph, queues it, and returns 202
/// with polling hints.
pub async fn create_job(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<TextToImageRequest>,
) -> AppResult<Response> {
    let submitted = submit_text_to_image(&state, &input).await?;
    let submitted_at = Utc::now();
    let base = &state.config.public_base_url;

    tracing::info!(
        job_id = %submitted.prompt_id,
        queue_number = ?submitted.number,
        %submitted_at,
        "Image job created",
    );

    let body = CreateJobResponse {
        status: JobStatus::Queued,
        status_url: image_job::status_url(base, &submitted.prompt_id),
        result_url: image_job::result_url(base, &submitted.prompt_id),
        job_id: submitted.prompt_id,
        submitted_at,
    };

    Ok((StatusCode::ACCEPTED, retry_after(), Json(body)).into_response())
}

// ---------------------------------------------------------------------------
// Poll / fetch
// ---------------------------------------------------------------------------

/// GET /image/jobs/{job_id}?json={0|1}
///
/// - not ready: 202 `running` with `Retry-After`, in both modes
/// - ready, status-only: 200 JSON describing the artifact
/// - ready, fetch mode: 200 image bytes, or 202 `processing` while the
///   file is listed but not yet retrievable
pub async fn poll_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(params): Query<PollParams>,
) -> AppResult<Response> {
    image_job::validate_job_id(&job_id)?;
    let status_only = image_job::parse_status_only_flag(params.json.as_deref())?;

    let reference = match state.comfyui.resolve_status(&job_id).await? {
        HistoryState::NotReady => return Ok(accepted(job_id, JobStatus::Running)),
        HistoryState::Ready(reference) => reference,
    };

    if status_only {
        let body = JobReadyResponse {
            status: JobStatus::Ready,
            media_type: reference.media_type(),
            filename: reference.filename,
            result_url: image_job::result_url(&state.config.public_base_url, &job_id),
            job_id,
        };
        return Ok((StatusCode::OK, Json(body)).into_response());
    }

    match state.comfyui.fetch_artifact(&reference).await? {
        FetchOutcome::NotReady => Ok(accepted(job_id, JobStatus::Processing)),
        FetchOutcome::Fetched(artifact) => {
            tracing::info!(
                job_id = %job_id,
                filename = %artifact.filename,
                bytes = artifact.bytes.len(),
                "Image job delivered",
            );
            Ok(artifact_response(artifact))
        }
    }
}

// ---------------------------------------------------------------------------
// Simple (blocking)
// ---------------------------------------------------------------------------

/// POST /image/simple
///
/// Submits like Create, then polls internally until the image can be
/// returned or the configured deadline passes (504).
pub async fn simple(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<TextToImageRequest>,
) -> AppResult<Response> {
    let submitted = submit_text_to_image(&state, &input).await?;
    tracing::info!(job_id = %submitted.prompt_id, "Waiting for image job");

    let artifact =
        wait_for_artifact(&state.comfyui, &submitted.prompt_id, &state.config.simple_wait).await?;

    Ok(artifact_response(artifact))
}

// ---------------------------------------------------------------------------
// Raw proxy
// ---------------------------------------------------------------------------

/// POST /image/raw
///
/// Forwards a caller-built graph to the backend's `/prompt` and relays the
/// enqueue response unchanged once it carries a `prompt_id`.
pub async fn raw(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<serde_json::Value>,
) -> AppResult<Json<serde_json::Value>> {
    let (graph, client_id) = workflow::split_raw_payload(body)?;
    let client_id = client_id_or_new(client_id);

    let submitted = state.comfyui.submit_workflow(&graph, &client_id).await?;
    tracing::info!(job_id = %submitted.prompt_id, "Raw graph forwarded");

    Ok(Json(submitted.raw))
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Validate the request, build the default graph and queue it.
async fn submit_text_to_image(
    state: &AppState,
    input: &TextToImageRequest,
) -> AppResult<SubmitResponse> {
    let params = TextToImageParams::from_request(input, fallback_seed())?;
    let graph = workflow::build_text_to_image(&params);
    let client_id = client_id_or_new(input.client_id.clone());

    Ok(state.comfyui.submit_workflow(&graph, &client_id).await?)
}

/// Use the caller's client id, or generate one (UUID v4) per submission.
fn client_id_or_new(client_id: Option<String>) -> String {
    client_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Random seed for requests that do not pin one, kept within 53 bits so
/// JSON consumers read it back exactly.
fn fallback_seed() -> u64 {
    uuid::Uuid::new_v4().as_u64_pair().0 >> 11
}

fn retry_after() -> [(header::HeaderName, String); 1] {
    [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())]
}

/// 202 with `Retry-After` and `{ job_id, status }`.
fn accepted(job_id: String, status: JobStatus) -> Response {
    tracing::debug!(job_id = %job_id, status = status.as_str(), "Image job not ready");
    (
        StatusCode::ACCEPTED,
        retry_after(),
        Json(JobStatusResponse { job_id, status }),
    )
        .into_response()
}

/// 200 with the artifact bytes served inline under their original name.
fn artifact_response(artifact: Artifact) -> Response {
    let disposition = artifact.inline_disposition();
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.media_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_kept_when_present() {
        assert_eq!(client_id_or_new(Some("abc".into())), "abc");
    }

    #[test]
    fn client_id_generated_when_blank() {
        let generated = client_id_or_new(Some("  ".into()));
        assert!(uuid::Uuid::parse_str(&generated).is_ok());
        assert!(uuid::Uuid::parse_str(&client_id_or_new(None)).is_ok());
    }

    #[test]
    fn fallback_seed_fits_53_bits() {
        for _ in 0..32 {
            assert!(fallback_seed() < (1u64 << 53));
        }
    }
}
