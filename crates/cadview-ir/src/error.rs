//! Error types for the shared data model.

use thiserror::Error;

/// Errors produced while decoding or encoding cadview documents.
#[derive(Error, Debug)]
pub enum IrError {
    /// I/O error reading or writing a side document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A color string that is not `#rrggbb` or `#rgb`.
    #[error("invalid hex color: {0:?}")]
    InvalidHex(String),
}

/// Result type for data model operations.
pub type Result<T> = std::result::Result<T, IrError>;
