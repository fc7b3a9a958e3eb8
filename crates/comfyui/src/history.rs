//! Classification of ComfyUI `/history/{prompt_id}` responses.
//!
//! The history payload nests outputs by node id:
//!
//! ```text
//! { "history": { "<prompt_id>": { "outputs": { "<node>": { "images": [ {..}, .. ] } } } } }
//! ```
//!
//! Stock ComfyUI omits the outer `history` key; both shapes are accepted.
//! Selection is first-match in wire order: the first image descriptor with
//! a filename, from the first node that has one. The workspace enables
//! `serde_json/preserve_order`, so object iteration follows the backend's
//! ordering and repeated polls pick the same artifact.

use gateway_core::artifact::ArtifactRef;
use serde::Deserialize;
use serde_json::Value;

/// Outcome of resolving a job against the backend's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryState {
    /// Unknown, queued, running, or finished without outputs yet.
    NotReady,
    /// At least one artifact is listed; this is the first one.
    Ready(ArtifactRef),
}

/// One entry of a node's `images` array.
#[derive(Debug, Deserialize)]
struct ImageDescriptor {
    filename: Option<String>,
    subfolder: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Classify a successful history response for `prompt_id`.
pub fn classify(history: &Value, prompt_id: &str) -> HistoryState {
    match first_artifact(history, prompt_id) {
        Some(reference) => HistoryState::Ready(reference),
        None => HistoryState::NotReady,
    }
}

/// Find the first artifact reference listed for `prompt_id`, if any.
pub fn first_artifact(history: &Value, prompt_id: &str) -> Option<ArtifactRef> {
    let entry = history
        .get("history")
        .and_then(|h| h.get(prompt_id))
        .or_else(|| history.get(prompt_id))?;

    let outputs = entry.get("outputs")?.as_object()?;

    outputs
        .values()
        .filter_map(|node| node.get("images")?.as_array())
        .flatten()
        .find_map(descriptor_to_ref)
}

fn descriptor_to_ref(value: &Value) -> Option<ArtifactRef> {
    let descriptor = ImageDescriptor::deserialize(value).ok()?;
    let filename = descriptor.filename.filter(|f| !f.is_empty())?;
    Some(ArtifactRef::new(
        filename,
        descriptor.subfolder,
        descriptor.kind,
    ))
}
