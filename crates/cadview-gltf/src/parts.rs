//! Scaffold for hand-authoring a model's color-group sidecar.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cadview_ir::{clean_node_name, strip_instance_suffix, ColorGroupSet, Rgb, SceneNode};

use crate::error::Result;

/// Default main group color of a fresh scaffold (`#FF6600`).
pub const DEFAULT_MAIN_COLOR: Rgb = Rgb {
    r: 1.0,
    g: 0.4,
    b: 0.0,
};

/// Default accent group color of a fresh scaffold (`#00AAFF`).
pub const DEFAULT_ACCENT_COLOR: Rgb = Rgb {
    r: 0.0,
    g: 2.0 / 3.0,
    b: 1.0,
};

/// A sidecar document with empty groups and the names available to fill them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartsTemplate {
    /// The sidecar fields, with default colors and empty part lists.
    #[serde(flatten)]
    pub sidecar: ColorGroupSet,
    /// Distinct parent names of mesh nodes.
    #[serde(rename = "_groups")]
    pub groups: Vec<String>,
    /// Distinct mesh node names.
    #[serde(rename = "_parts")]
    pub parts: Vec<String>,
}

impl PartsTemplate {
    /// List the part and group names of a scene.
    ///
    /// Names are cleaned and instance-stripped, deduplicated, and sorted
    /// case-insensitively.
    pub fn from_scene(scene: &SceneNode) -> Self {
        let meshes = scene.mesh_nodes();
        let groups = sorted_names(meshes.iter().filter_map(|m| m.parent));
        let parts = sorted_names(meshes.iter().map(|m| m.name));
        Self {
            sidecar: ColorGroupSet {
                main_color: DEFAULT_MAIN_COLOR,
                accent_color: DEFAULT_ACCENT_COLOR,
                main_parts: Vec::new(),
                accent_parts: Vec::new(),
            },
            groups,
            parts,
        }
    }

    /// Pretty JSON text.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the scaffold to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut text = self.to_json()?;
        text.push('\n');
        std::fs::write(path, text)?;
        Ok(())
    }
}

fn sorted_names<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = raw
        .map(|name| strip_instance_suffix(&clean_node_name(name)).to_string())
        .filter(|name| !name.is_empty())
        .collect();
    names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
    names.dedup();
    names
}

/// Sidecar path next to a model: `parts/bracket.glb` → `parts/bracket.colors.json`.
pub fn sidecar_path(model: &Path) -> PathBuf {
    model.with_extension("colors.json")
}
