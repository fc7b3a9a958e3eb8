//! Domain logic for the image job gateway.
//!
//! Everything here is pure: no network, no clock, no runtime. The
//! upstream client (`gateway-comfyui`) and the HTTP server
//! (`gateway-api`) build on these types.

pub mod artifact;
pub mod error;
pub mod image_job;
pub mod workflow;
