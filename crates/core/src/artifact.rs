//! Artifact references and media-type inference.
//!
//! An [`ArtifactRef`] names one output file on the compute backend. It is
//! rebuilt from the backend's history on every poll and never stored.

use serde::Serialize;

/// Artifact kind used when the backend omits the `type` field.
pub const DEFAULT_ARTIFACT_KIND: &str = "output";

pub const MEDIA_TYPE_PNG: &str = "image/png";
pub const MEDIA_TYPE_JPEG: &str = "image/jpeg";
pub const MEDIA_TYPE_WEBP: &str = "image/webp";

/// Filename / subfolder / kind triple identifying a retrievable output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRef {
    /// Backend-assigned filename, usually with extension.
    pub filename: String,
    /// Subfolder under the backend's output root; may be empty.
    pub subfolder: String,
    /// Storage kind (`output`, `temp`, ...), passed verbatim as `type`.
    pub kind: String,
}

impl ArtifactRef {
    /// Build a reference, filling the backend's defaults for missing fields.
    pub fn new(filename: String, subfolder: Option<String>, kind: Option<String>) -> Self {
        Self {
            filename,
            subfolder: subfolder.unwrap_or_default(),
            kind: kind.unwrap_or_else(|| DEFAULT_ARTIFACT_KIND.to_string()),
        }
    }

    /// Media type this artifact will be served with.
    pub fn media_type(&self) -> &'static str {
        media_type_for(&self.filename)
    }
}

/// Raw artifact bytes as fetched from the backend.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub filename: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(reference: &ArtifactRef, bytes: Vec<u8>) -> Self {
        Self {
            filename: reference.filename.clone(),
            media_type: reference.media_type(),
            bytes,
        }
    }

    /// `Content-Disposition` value serving the artifact inline under its
    /// original name.
    pub fn inline_disposition(&self) -> String {
        inline_disposition(&self.filename)
    }
}

/// Infer an image media type from a filename extension.
///
/// Only the extension is consulted, case-insensitively. Anything other
/// than WebP or JPEG is served as PNG, the backend's default format.
pub fn media_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "webp" => MEDIA_TYPE_WEBP,
        "jpg" | "jpeg" => MEDIA_TYPE_JPEG,
        _ => MEDIA_TYPE_PNG,
    }
}

/// Build an `inline; filename="..."` disposition, replacing characters
/// that would break the quoted-string.
pub fn inline_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("inline; filename=\"{safe}\"")
}
