#![warn(missing_docs)]

//! Shared data model for the cadview conversion pipeline and viewer.
//!
//! - [`ColorMap`]: part name → color, extracted from CAD source files and
//!   baked into the exported model.
//! - [`ColorGroupSet`]: the optional two-group palette consumed by the viewer.
//! - [`SceneNode`]: the loaded scene graph.
//! - [`names`]: the name normalization that reconciles node identities across
//!   conversion stages.

mod color;
mod colormap;
mod error;
mod groups;
pub mod names;
mod scene;

pub use color::{hex, Rgb};
pub use colormap::{ColorEntry, ColorMap, ColorMapDocument};
pub use error::{IrError, Result};
pub use groups::{ColorGroupSet, GroupKind, GroupMatcher};
pub use names::{clean_node_name, strip_duplicate_suffix, strip_instance_suffix, NameIndex};
pub use scene::{Aabb, MeshData, MeshNodeRef, NodePath, SceneNode, Transform};
