#![warn(missing_docs)]

//! glTF handling for the cadview pipeline.
//!
//! - [`GltfDocument`]: read and write `.glb` / `.gltf`.
//! - [`recolor`]: clean node names and bake a [`ColorMap`](cadview_ir::ColorMap)
//!   into materials.
//! - [`scene_graph`]: reflect the node hierarchy for the viewer and the CLI.
//! - [`PartsTemplate`]: scaffold for a model's color-group sidecar.
//!
//! # Example
//!
//! ```no_run
//! use cadview_gltf::{recolor, GltfDocument};
//! use cadview_ir::ColorMap;
//!
//! let colors = ColorMap::read("bracket.part-colors.json").unwrap();
//! let mut doc = GltfDocument::read("bracket.glb").unwrap();
//! let report = recolor(&mut doc.root, Some(&colors)).unwrap();
//! println!("{} parts colored", report.colored);
//! doc.write("bracket.glb").unwrap();
//! ```

mod document;
mod error;
mod parts;
mod recolor;
mod scene;

pub use document::{Container, GltfDocument};
pub use error::{GltfError, Result};
pub use parts::{sidecar_path, PartsTemplate, DEFAULT_ACCENT_COLOR, DEFAULT_MAIN_COLOR};
pub use recolor::{recolor, RecolorReport};
pub use scene::{outline, scene_graph};
