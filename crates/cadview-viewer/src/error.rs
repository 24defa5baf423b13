//! Error types for viewer operations.

use thiserror::Error;

use crate::session::SessionId;

/// Errors returned by [`Viewer`](crate::Viewer) operations.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// A result arrived for a load that has since been replaced.
    #[error("result for stale session {0}")]
    Stale(SessionId),

    /// No model has been loaded yet.
    #[error("no model loaded")]
    NoSession,

    /// The current model's scene has not arrived (or failed to load).
    #[error("scene not loaded")]
    NoScene,

    /// Group color controls are hidden for the current model.
    #[error("model has no color groups")]
    NoGroups,

    /// A tree path does not name a node.
    #[error("no node at path {0:?}")]
    UnknownNode(Vec<usize>),

    /// Shared data model error.
    #[error(transparent)]
    Ir(#[from] cadview_ir::IrError),
}

impl ViewerError {
    /// True for results that should simply be dropped.
    pub fn is_stale(&self) -> bool {
        matches!(self, ViewerError::Stale(_))
    }
}

/// Result type for viewer operations.
pub type Result<T> = std::result::Result<T, ViewerError>;
