//! Route definitions for image generation jobs.
//!
//! ```text
//! POST   /jobs              create_job
//! GET    /jobs/{job_id}     poll_job
//! POST   /simple            simple
//! POST   /raw               raw
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::image_jobs;
use crate::state::AppState;

/// Routes nested under `/image`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(image_jobs::create_job))
        .route("/jobs/{job_id}", get(image_jobs::poll_job))
        .route("/simple", post(image_jobs::simple))
        .route("/raw", post(image_jobs::raw))
}
