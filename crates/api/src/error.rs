use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gateway_comfyui::api::ComfyUIApiError;
use gateway_comfyui::waiter::WaitError;
use gateway_core::error::CoreError;
use serde_json::{json, Value};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`ComfyUIApiError`] for
/// backend failures, and adds the blocking-wait timeout. Implements
/// [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `gateway_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A failure talking to the image backend.
    #[error(transparent)]
    ComfyUI(#[from] ComfyUIApiError),

    /// A blocking wait ran out of time.
    #[error("Image job {job_id} not ready after {waited_secs}s")]
    GatewayTimeout { job_id: String, waited_secs: u64 },
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<WaitError> for AppError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Api(api) => AppError::ComfyUI(api),
            WaitError::Timeout { job_id, waited } => AppError::GatewayTimeout {
                job_id,
                waited_secs: waited.as_secs(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message): (StatusCode, &str, Value) = match &self {
            // --- CoreError variants ---
            AppError::Core(CoreError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", json!(msg))
            }

            // --- Backend errors ---
            AppError::ComfyUI(err) => classify_upstream_error(err),

            AppError::GatewayTimeout { job_id, .. } => {
                tracing::warn!(job_id = %job_id, "Image job wait timed out");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "GATEWAY_TIMEOUT",
                    json!(self.to_string()),
                )
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let AppError::GatewayTimeout { job_id, .. } = &self {
            body["job_id"] = json!(job_id);
        }

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        json!("An internal error occurred"),
    )
}

/// Classify a backend error into an HTTP status, error code, and message.
///
/// - Backend rejections keep their status and relay the backend's body.
/// - Transport failures map to 502.
/// - Contract violations map to 500 with a sanitized message.
fn classify_upstream_error(err: &ComfyUIApiError) -> (StatusCode, &'static str, Value) {
    match err {
        ComfyUIApiError::ApiError { status, .. } => {
            let status = StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            let detail = err.upstream_detail().unwrap_or(Value::Null);
            (status, "UPSTREAM_ERROR", detail)
        }
        ComfyUIApiError::EmptyArtifact { .. } => {
            tracing::warn!(error = %err, "Empty artifact from backend");
            (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", json!(err.to_string()))
        }
        ComfyUIApiError::Request(e) => {
            tracing::warn!(error = %e, "Image backend unreachable");
            (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_UNAVAILABLE",
                json!("Image backend is unavailable"),
            )
        }
        ComfyUIApiError::MissingPromptId | ComfyUIApiError::MalformedResponse(_) => {
            tracing::error!(error = %err, "Image backend contract violation");
            internal()
        }
    }
}
