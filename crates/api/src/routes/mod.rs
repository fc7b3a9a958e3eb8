pub mod health;
pub mod image;

use axum::Router;

use crate::state::AppState;

/// Build the image route tree.
///
/// Route hierarchy:
///
/// ```text
/// /image/jobs                 submit job (POST)
/// /image/jobs/{job_id}        poll status / fetch result (GET)
/// /image/simple               submit and wait (POST)
/// /image/raw                  forward prepared graph (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/image", image::router())
}
