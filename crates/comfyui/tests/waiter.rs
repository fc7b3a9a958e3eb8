//! Integration tests for the polling waiter.

use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use gateway_comfyui::api::{ComfyUIApi, ComfyUIApiError};
use gateway_comfyui::waiter::{wait_for_artifact, WaitError, WaitPolicy};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn history_with(filename: &str) -> serde_json::Value {
    json!({
        "history": { "abc123": { "outputs": {
            "9": { "images": [ { "filename": filename, "subfolder": "", "type": "output" } ] }
        } } }
    })
}

fn fast_policy() -> WaitPolicy {
    WaitPolicy {
        interval: Duration::from_millis(20),
        deadline: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn returns_artifact_after_not_ready_polls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history/abc123"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/history/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_with("x.png")))
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/view"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG...".to_vec()))
        .mount(&server)
        .await;

    let api = ComfyUIApi::new(server.uri());
    let artifact = wait_for_artifact(&api, "abc123", &fast_policy())
        .await
        .unwrap();

    assert_eq!(artifact.bytes, b"\x89PNG...");
    assert_eq!(artifact.media_type, "image/png");
}

#[tokio::test]
async fn keeps_polling_through_view_race() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_with("x.jpg")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/view"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/view"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
        .with_priority(2)
        .mount(&server)
        .await;

    let api = ComfyUIApi::new(server.uri());
    let artifact = wait_for_artifact(&api, "abc123", &fast_policy())
        .await
        .unwrap();

    assert_eq!(artifact.media_type, "image/jpeg");
    assert_eq!(artifact.bytes.len(), 3);
}

#[tokio::test]
async fn upstream_error_fails_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history/abc123"))
        .respond_with(ResponseTemplate::new(500).set_body_string("exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let api = ComfyUIApi::new(server.uri());
    let started = Instant::now();
    let err = wait_for_artifact(&api, "abc123", &fast_policy())
        .await
        .unwrap_err();

    assert_matches!(
        err,
        WaitError::Api(ComfyUIApiError::ApiError { status: 500, .. })
    );
    assert!(started.elapsed() < fast_policy().deadline);
}

#[tokio::test]
async fn never_ready_times_out_within_deadline_plus_interval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history/abc123"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let policy = WaitPolicy {
        interval: Duration::from_millis(100),
        deadline: Duration::from_millis(400),
    };
    let api = ComfyUIApi::new(server.uri());

    let started = Instant::now();
    let err = wait_for_artifact(&api, "abc123", &policy).await.unwrap_err();
    let elapsed = started.elapsed();

    assert_matches!(err, WaitError::Timeout { .. });
    assert!(elapsed >= policy.deadline, "timed out early: {elapsed:?}");
    // Allow for the latency of the final local poll.
    assert!(
        elapsed <= policy.deadline + policy.interval + Duration::from_millis(250),
        "timed out late: {elapsed:?}"
    );
}

#[tokio::test]
async fn slow_backend_cannot_push_timeout_past_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history/abc123"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let policy = WaitPolicy {
        interval: Duration::from_millis(100),
        deadline: Duration::from_millis(400),
    };
    let api = ComfyUIApi::new(server.uri());

    let started = Instant::now();
    let err = wait_for_artifact(&api, "abc123", &policy).await.unwrap_err();
    let elapsed = started.elapsed();

    assert_matches!(err, WaitError::Timeout { .. });
    assert!(elapsed >= policy.deadline, "timed out early: {elapsed:?}");
    assert!(
        elapsed <= policy.deadline + policy.interval,
        "timed out late: {elapsed:?}"
    );
}

#[tokio::test]
async fn slow_view_download_is_cut_at_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_with("x.png")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/view"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"\x89PNG...".to_vec())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let policy = WaitPolicy {
        interval: Duration::from_millis(100),
        deadline: Duration::from_millis(400),
    };
    let api = ComfyUIApi::new(server.uri());

    let started = Instant::now();
    let err = wait_for_artifact(&api, "abc123", &policy).await.unwrap_err();

    assert_matches!(err, WaitError::Timeout { .. });
    assert!(started.elapsed() <= policy.deadline + policy.interval);
}
