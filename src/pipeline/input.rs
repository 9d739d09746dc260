//! Input handling: wrap selected image bytes in a validated `SourceDocument`.
//!
//! ## Why validate up front?
//!
//! Tesseract's error output for unreadable input is famously unhelpful.
//! Sniffing the image format before the engine ever runs turns "Error in
//! pixReadStream" into a typed `UnsupportedMediaType` with the first bytes
//! of the offending file, and lets the run fail before a subprocess is
//! spawned.

use crate::error::ExtractError;
use image::ImageFormat;
use std::path::Path;
use tracing::debug;

/// The image selected for extraction: raw bytes plus a media type.
///
/// Immutable once constructed; the orchestrator consumes it when a run
/// starts. Construct via [`SourceDocument::new`] when the caller already
/// knows the media type (file-picker boundary), [`SourceDocument::from_bytes`]
/// to sniff it, or [`SourceDocument::from_path`] to load from disk.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    bytes: Vec<u8>,
    media_type: String,
}

impl SourceDocument {
    /// Wrap bytes with a caller-declared media type. No validation.
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    /// Wrap bytes, sniffing the media type from the content.
    ///
    /// Fails with [`ExtractError::UnsupportedMediaType`] when the bytes are
    /// not a recognisable image format.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ExtractError> {
        let format = image::guess_format(&bytes).map_err(|_| {
            let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
            ExtractError::UnsupportedMediaType {
                detail: format!("unrecognised image header {magic:02X?}"),
            }
        })?;
        let media_type = format.to_mime_type().to_string();
        debug!("Sniffed media type: {media_type} ({} bytes)", bytes.len());
        Ok(Self { bytes, media_type })
    }

    /// Load and sniff an image file from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ExtractError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ExtractError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => ExtractError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => ExtractError::Internal(format!("read {}: {e}", path.display())),
        })?;
        Self::from_bytes(bytes)
    }

    /// The raw image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The declared or sniffed media type, e.g. `image/png`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// A file-name extension matching the media type, for temp files handed
    /// to external tools. Unknown types fall back to `img`; Tesseract sniffs
    /// content, so the extension is cosmetic.
    pub fn extension_hint(&self) -> &'static str {
        match self.media_type.as_str() {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/tiff" => "tif",
            "image/bmp" => "bmp",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "img",
        }
    }

    /// Validate that the bytes look like a supported image.
    ///
    /// Used by the OCR adapter on documents constructed with a declared
    /// media type, where no sniffing has happened yet.
    pub fn validate(&self) -> Result<ImageFormat, ExtractError> {
        image::guess_format(&self.bytes).map_err(|_| {
            let magic: Vec<u8> = self.bytes.iter().take(4).copied().collect();
            ExtractError::UnsupportedMediaType {
                detail: format!(
                    "declared {} but header is {magic:02X?}",
                    self.media_type
                ),
            }
        })
    }
}
