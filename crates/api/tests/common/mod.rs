#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use gateway_comfyui::client::UpstreamConfig;
use gateway_comfyui::retry::RetryConfig;
use gateway_comfyui::waiter::WaitPolicy;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::MockServer;

use gateway_api::config::ServerConfig;
use gateway_api::router::build_app_router;
use gateway_api::state::AppState;

/// Build a test `ServerConfig` pointing at `comfy_url`.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// a short submit retry delay, and a fast simple-wait policy so timeout
/// paths finish in well under a second.
pub fn test_config(comfy_url: String) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        comfy_url,
        public_base_url: String::new(),
        upstream: UpstreamConfig {
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(5),
            total_timeout: Duration::from_secs(10),
            ..UpstreamConfig::default()
        },
        submit_retry: RetryConfig {
            delay: Duration::from_millis(10),
        },
        simple_wait: WaitPolicy {
            interval: Duration::from_millis(20),
            deadline: Duration::from_millis(300),
        },
    }
}

/// Build the full application router against a mock ComfyUI server.
///
/// Goes through the same [`build_app_router`] that `main.rs` uses, so
/// integration tests exercise the production middleware stack.
pub fn build_test_app(server: &MockServer) -> Router {
    build_test_app_with(test_config(server.uri()))
}

/// Build the application router from an explicit configuration.
pub fn build_test_app_with(config: ServerConfig) -> Router {
    let state = AppState::from_config(config.clone()).expect("test client builds");
    build_app_router(state, &config)
}

/// Send a GET request.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body as raw bytes.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// A history document listing one output image for `prompt_id`.
pub fn history_with_image(prompt_id: &str, filename: &str) -> Value {
    let entry = json!({
        "outputs": {
            "9": {
                "images": [
                    { "filename": filename, "subfolder": "", "type": "output" }
                ]
            }
        }
    });
    let mut by_id = serde_json::Map::new();
    by_id.insert(prompt_id.to_string(), entry);
    json!({ "history": by_id })
}
