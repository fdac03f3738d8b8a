use std::io;

use thiserror::Error;

/// Error type for registry setup, configuration, and collaborator I/O.
///
/// Parsing and validation never produce this type: malformed OCR output
/// degrades to a low-confidence verdict instead.
#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("invalid retailer registry: {0}")]
    Registry(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("OCR service unavailable: {reason}")]
    OcrUnavailable { reason: String },
    #[error("OCR service returned an unusable response: {0}")]
    OcrResponse(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}
