//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps workflow submission (`POST /prompt`), history retrieval
//! (`GET /history/{prompt_id}`) and artifact download (`GET /view`) using
//! [`reqwest`]. Nothing here keeps state between calls; every status check
//! re-reads the backend.

use gateway_core::artifact::{Artifact, ArtifactRef};
use serde_json::Value;

use crate::history::{self, HistoryState};
use crate::retry::{self, RetryConfig};

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
    retry: RetryConfig,
}

/// Accepted submission, as returned by `/prompt`.
#[derive(Debug, Clone)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue, when reported.
    pub number: Option<i64>,
    /// The full enqueue response body.
    pub raw: Value,
}

/// Result of an artifact download attempt.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Listed in history but not retrievable (yet, or any more).
    NotReady,
    Fetched(Artifact),
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
        /// `Content-Type` of the error response, if any.
        content_type: Option<String>,
    },

    /// `/prompt` succeeded but did not return a `prompt_id`.
    #[error("ComfyUI response is missing prompt_id")]
    MissingPromptId,

    /// A success response whose body could not be parsed.
    #[error("Malformed ComfyUI response: {0}")]
    MalformedResponse(String),

    /// `/view` succeeded with an empty body.
    #[error("ComfyUI returned an empty body for {filename}")]
    EmptyArtifact { filename: String },
}

impl ComfyUIApiError {
    /// The backend's error body as a relayable value: parsed JSON when the
    /// response declared a JSON content type, otherwise the raw text.
    /// `None` for errors that did not come from a backend rejection.
    pub fn upstream_detail(&self) -> Option<Value> {
        match self {
            ComfyUIApiError::ApiError {
                body, content_type, ..
            } => Some(body_detail(body, content_type.as_deref())),
            _ => None,
        }
    }
}

/// Connection-class failures from either the send or the body read.
/// Backend rejections and contract violations are final.
fn is_transient(err: &ComfyUIApiError) -> bool {
    matches!(err, ComfyUIApiError::Request(e) if retry::is_transient(e))
}

fn body_detail(body: &str, content_type: Option<&str>) -> Value {
    let is_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);

    if is_json {
        if let Ok(value) = serde_json::from_str(body) {
            return value;
        }
    }
    Value::String(body.to_string())
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (the pooled client built by [`crate::client::build_http_client`]).
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        }
    }

    /// Override the retry-once policy for submissions.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Base HTTP URL of the instance.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a workflow for execution.
    ///
    /// Sends `POST /prompt` with the workflow and client ID and extracts
    /// the server-assigned `prompt_id`. A success response without one is
    /// [`ComfyUIApiError::MissingPromptId`].
    pub async fn submit_workflow(
        &self,
        workflow: &Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let raw = self.enqueue(workflow, client_id).await?;

        let prompt_id = raw
            .get("prompt_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(ComfyUIApiError::MissingPromptId)?
            .to_string();
        let number = raw.get("number").and_then(Value::as_i64);

        tracing::info!(prompt_id = %prompt_id, ?number, client_id, "Workflow queued");

        Ok(SubmitResponse {
            prompt_id,
            number,
            raw,
        })
    }

    /// Post a workflow to `/prompt` and return the response body as-is.
    ///
    /// A transient connection failure, whether while sending or while
    /// reading the response body, is retried once after
    /// [`RetryConfig::delay`].
    pub async fn enqueue(
        &self,
        workflow: &Value,
        client_id: &str,
    ) -> Result<Value, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });
        let url = format!("{}/prompt", self.api_url);

        let (url, body) = (&url, &body);
        retry::retry_once(&self.retry, is_transient, move || async move {
            let response = self.client.post(url).json(body).send().await?;
            Self::parse_json(response).await
        })
        .await
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Returns `Ok(None)` when ComfyUI answers 404 (the prompt is unknown
    /// or not indexed yet).
    pub async fn get_history(&self, prompt_id: &str) -> Result<Option<Value>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Self::parse_json(response).await.map(Some)
    }

    /// Resolve a prompt to [`HistoryState`].
    ///
    /// Read-only: safe to call any number of times for the same id.
    pub async fn resolve_status(&self, prompt_id: &str) -> Result<HistoryState, ComfyUIApiError> {
        let state = match self.get_history(prompt_id).await? {
            Some(history) => history::classify(&history, prompt_id),
            None => HistoryState::NotReady,
        };

        tracing::debug!(prompt_id, ready = matches!(state, HistoryState::Ready(_)), "Resolved job status");
        Ok(state)
    }

    /// Download an artifact via `GET /view`.
    ///
    /// A 404 means the file is listed in history but not on disk (yet, or
    /// any more) and yields [`FetchOutcome::NotReady`].
    pub async fn fetch_artifact(
        &self,
        reference: &ArtifactRef,
    ) -> Result<FetchOutcome, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", reference.filename.as_str()),
                ("subfolder", reference.subfolder.as_str()),
                ("type", reference.kind.as_str()),
            ])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(filename = %reference.filename, "Artifact listed but not retrievable yet");
            return Ok(FetchOutcome::NotReady);
        }

        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ComfyUIApiError::EmptyArtifact {
                filename: reference.filename.clone(),
            });
        }

        Ok(FetchOutcome::Fetched(Artifact::new(reference, bytes.to_vec())))
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), "ComfyUI rejected request");
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
                content_type,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body. An unparseable body on a
    /// success status is a contract violation, not a transport error.
    async fn parse_json(response: reqwest::Response) -> Result<Value, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ComfyUIApiError::MalformedResponse(e.to_string()))
    }
}
