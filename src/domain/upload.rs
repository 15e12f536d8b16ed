//! File payload for evidence uploads.

use std::path::Path;

use anyhow::{Context, Result};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Extension fallbacks for types `infer` cannot sniff from magic bytes
const EXTENSION_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
    ("mp3", "audio/mpeg"),
    ("m4a", "audio/mp4"),
    ("wav", "audio/wav"),
    ("mp4", "video/mp4"),
];

/// A file ready to be attached to a case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl EvidenceUpload {
    /// Build an upload from in-memory bytes, detecting the content type
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = detect_content_type(&file_name, &bytes);
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Read a file from disk
    pub async fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .filter(|name| !name.is_empty())
            .with_context(|| format!("Not a file path: {}", path.display()))?;

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read evidence file: {}", path.display()))?;

        Ok(Self::new(file_name, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Magic bytes first, then the extension, then a generic binary type.
///
/// The backend routes analysis on this value (pdf / audio / video), so a
/// specific type matters.
pub fn detect_content_type(file_name: &str, bytes: &[u8]) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }

    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    extension
        .and_then(|ext| {
            EXTENSION_TYPES
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, mime)| mime.to_string())
        })
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())
}
