//! ComfyUI REST client library.
//!
//! Provides the pooled upstream HTTP client, typed wrappers over the
//! `/prompt`, `/history` and `/view` endpoints, history classification,
//! the retry-once policy for submissions, and the polling waiter used by
//! blocking callers.

pub mod api;
pub mod client;
pub mod history;
pub mod retry;
pub mod waiter;
