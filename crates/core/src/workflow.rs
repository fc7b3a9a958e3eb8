//! Text-to-image request validation and the default execution graph.
//!
//! The backend executes node graphs in its "API format": a JSON object
//! keyed by node id, each node carrying `class_type` and `inputs`. Links
//! between nodes are `[source_node_id, output_index]` pairs. Callers that
//! need a different graph go through the raw proxy route instead.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_CHECKPOINT: &str = "v1-5-pruned-emaonly.safetensors";
pub const DEFAULT_STEPS: u64 = 20;
pub const DEFAULT_CFG: f64 = 7.0;
pub const DEFAULT_SAMPLER: &str = "euler";
pub const DEFAULT_SCHEDULER: &str = "normal";
pub const DEFAULT_SIZE: u64 = 512;
pub const DEFAULT_FILENAME_PREFIX: &str = "ComfyUI";

pub const MAX_STEPS: u64 = 150;
pub const MAX_CFG: f64 = 30.0;
pub const MIN_SIZE: u64 = 64;
pub const MAX_SIZE: u64 = 4096;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Body of `POST /image/jobs` and `POST /image/simple`.
#[derive(Debug, Clone, Deserialize)]
pub struct TextToImageRequest {
    /// Positive prompt. Missing and blank are both rejected by
    /// [`TextToImageParams::from_request`].
    #[serde(default)]
    pub text: String,
    /// Backend client/session id; a fresh one is generated when absent.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Optional graph overrides (`seed`, `steps`, `width`, ...).
    #[serde(default)]
    pub meta: Option<Map<String, Value>>,
}

/// Generation parameters after applying `meta` overrides to the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct TextToImageParams {
    pub text: String,
    pub negative: String,
    pub checkpoint: String,
    pub seed: u64,
    pub steps: u64,
    pub cfg: f64,
    pub sampler: String,
    pub scheduler: String,
    pub width: u64,
    pub height: u64,
    pub filename_prefix: String,
}

impl TextToImageParams {
    /// Validate a request and resolve its parameters.
    ///
    /// `fallback_seed` is used when `meta.seed` is absent so identical
    /// prompts still produce distinct images.
    pub fn from_request(req: &TextToImageRequest, fallback_seed: u64) -> Result<Self, CoreError> {
        let text = req.text.trim();
        if text.is_empty() {
            return Err(CoreError::Validation("Field 'text' is required".into()));
        }

        let empty = Map::new();
        let meta = req.meta.as_ref().unwrap_or(&empty);

        let steps = meta_u64(meta, "steps")?.unwrap_or(DEFAULT_STEPS);
        if steps == 0 || steps > MAX_STEPS {
            return Err(CoreError::Validation(format!(
                "meta.steps must be between 1 and {MAX_STEPS}"
            )));
        }

        let cfg = meta_f64(meta, "cfg")?.unwrap_or(DEFAULT_CFG);
        if !(0.0..=MAX_CFG).contains(&cfg) {
            return Err(CoreError::Validation(format!(
                "meta.cfg must be between 0 and {MAX_CFG}"
            )));
        }

        let width = validate_size("width", meta_u64(meta, "width")?)?;
        let height = validate_size("height", meta_u64(meta, "height")?)?;

        Ok(Self {
            text: text.to_string(),
            negative: meta_str(meta, "negative")?.unwrap_or_default(),
            checkpoint: meta_str(meta, "checkpoint")?
                .unwrap_or_else(|| DEFAULT_CHECKPOINT.to_string()),
            seed: meta_u64(meta, "seed")?.unwrap_or(fallback_seed),
            steps,
            cfg,
            sampler: meta_str(meta, "sampler")?.unwrap_or_else(|| DEFAULT_SAMPLER.to_string()),
            scheduler: meta_str(meta, "scheduler")?
                .unwrap_or_else(|| DEFAULT_SCHEDULER.to_string()),
            width,
            height,
            filename_prefix: meta_str(meta, "filename_prefix")?
                .unwrap_or_else(|| DEFAULT_FILENAME_PREFIX.to_string()),
        })
    }
}

/// Build the default text-to-image graph.
///
/// ```text
/// 4 CheckpointLoaderSimple ─┬─ model ──────────────┐
///                           ├─ clip ─ 6 positive ──┤
///                           ├─ clip ─ 7 negative ──┤
/// 5 EmptyLatentImage ───────┼──────────────────── 3 KSampler ─ 8 VAEDecode ─ 9 SaveImage
///                           └─ vae ──────────────────────────────┘
/// ```
pub fn build_text_to_image(params: &TextToImageParams) -> Value {
    json!({
        "3": {
            "class_type": "KSampler",
            "inputs": {
                "seed": params.seed,
                "steps": params.steps,
                "cfg": params.cfg,
                "sampler_name": params.sampler,
                "scheduler": params.scheduler,
                "denoise": 1.0,
                "model": ["4", 0],
                "positive": ["6", 0],
                "negative": ["7", 0],
                "latent_image": ["5", 0]
            }
        },
        "4": {
            "class_type": "CheckpointLoaderSimple",
            "inputs": { "ckpt_name": params.checkpoint }
        },
        "5": {
            "class_type": "EmptyLatentImage",
            "inputs": { "width": params.width, "height": params.height, "batch_size": 1 }
        },
        "6": {
            "class_type": "CLIPTextEncode",
            "inputs": { "text": params.text, "clip": ["4", 1] }
        },
        "7": {
            "class_type": "CLIPTextEncode",
            "inputs": { "text": params.negative, "clip": ["4", 1] }
        },
        "8": {
            "class_type": "VAEDecode",
            "inputs": { "samples": ["3", 0], "vae": ["4", 2] }
        },
        "9": {
            "class_type": "SaveImage",
            "inputs": { "filename_prefix": params.filename_prefix, "images": ["8", 0] }
        }
    })
}

/// Split a raw proxy body into `(graph, client_id)`.
///
/// Accepts either the enqueue envelope `{"prompt": {...}, "client_id": ..}`
/// or a bare graph object.
pub fn split_raw_payload(body: Value) -> Result<(Value, Option<String>), CoreError> {
    let Value::Object(mut map) = body else {
        return Err(CoreError::Validation(
            "Payload must be a JSON object".into(),
        ));
    };

    match map.remove("prompt") {
        Some(graph @ Value::Object(_)) => {
            let client_id = match map.remove("client_id") {
                None | Some(Value::Null) => None,
                Some(Value::String(id)) => Some(id),
                Some(_) => {
                    return Err(CoreError::Validation(
                        "Field 'client_id' must be a string".into(),
                    ))
                }
            };
            Ok((graph, client_id))
        }
        Some(_) => Err(CoreError::Validation(
            "Field 'prompt' must be a JSON object".into(),
        )),
        None if map.is_empty() => Err(CoreError::Validation("Payload graph is empty".into())),
        None => Ok((Value::Object(map), None)),
    }
}

// ---------------------------------------------------------------------------
// meta accessors
// ---------------------------------------------------------------------------

fn meta_str(meta: &Map<String, Value>, key: &str) -> Result<Option<String>, CoreError> {
    match meta.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(CoreError::Validation(format!("meta.{key} must be a string"))),
    }
}

fn meta_u64(meta: &Map<String, Value>, key: &str) -> Result<Option<u64>, CoreError> {
    match meta.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64().map(Some).ok_or_else(|| {
            CoreError::Validation(format!("meta.{key} must be a non-negative integer"))
        }),
    }
}

fn meta_f64(meta: &Map<String, Value>, key: &str) -> Result<Option<f64>, CoreError> {
    match meta.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| CoreError::Validation(format!("meta.{key} must be a number"))),
    }
}

fn validate_size(key: &str, value: Option<u64>) -> Result<u64, CoreError> {
    let size = value.unwrap_or(DEFAULT_SIZE);
    if !(MIN_SIZE..=MAX_SIZE).contains(&size) || size % 8 != 0 {
        return Err(CoreError::Validation(format!(
            "meta.{key} must be a multiple of 8 between {MIN_SIZE} and {MAX_SIZE}"
        )));
    }
    Ok(size)
}
