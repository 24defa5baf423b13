#![warn(missing_docs)]

//! Browser viewer logic for exported cadview models.
//!
//! The page fetches geometry and sidecars and renders the scene; this crate
//! decides what to fetch, which results still apply, how meshes are grouped
//! and colored, what the hierarchy panel shows, and how the camera frames the
//! model. Build with the `wasm` feature for the JavaScript bindings.

mod camera;
mod error;
mod groups;
mod location;
mod session;
pub mod tree;
#[cfg(feature = "wasm")]
mod wasm;

pub use camera::{camera_view, CameraView, ViewPreset};
pub use error::{Result, ViewerError};
pub use groups::{ColorOverride, GroupControls, GroupState, MeshPaint};
pub use location::{sidecar_url, ViewerLocation};
pub use session::{LoadRequest, LoadStatus, Session, SessionId, Viewer, ViewerConfig};
pub use tree::{SceneTree, TreeRow};
