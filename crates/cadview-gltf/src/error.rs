//! Error types for glTF operations.

use thiserror::Error;

/// Errors that can occur while reading, transforming or writing glTF.
#[derive(Error, Debug)]
pub enum GltfError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The binary container could not be read or written.
    #[error("GLB error: {0}")]
    Glb(#[from] gltf::Error),

    /// The JSON document is malformed.
    #[error("glTF JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Shared data model error.
    #[error(transparent)]
    Ir(#[from] cadview_ir::IrError),

    /// The input is neither GLB nor glTF JSON.
    #[error("not a glTF document: {0}")]
    NotGltf(String),
}

/// Result type for glTF operations.
pub type Result<T> = std::result::Result<T, GltfError>;
