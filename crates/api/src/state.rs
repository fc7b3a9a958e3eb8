use std::sync::Arc;

use gateway_comfyui::api::ComfyUIApi;
use gateway_comfyui::client::build_http_client;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`). There is no
/// per-job state: the image backend is the only record of submitted jobs.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// ComfyUI REST client over the shared connection pool.
    pub comfyui: Arc<ComfyUIApi>,
}

impl AppState {
    /// Build the upstream client from configuration.
    pub fn from_config(config: ServerConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.upstream)?;
        let comfyui = ComfyUIApi::with_client(client, config.comfy_url.clone())
            .with_retry(config.submit_retry.clone());

        Ok(Self {
            config: Arc::new(config),
            comfyui: Arc::new(comfyui),
        })
    }
}
