//! Live recoloring of the two sidecar color groups.

use serde::Serialize;

use cadview_ir::{ColorGroupSet, GroupKind, NodePath, Rgb, SceneNode};

/// Instruction for the renderer to show a mesh node in a color.
///
/// The renderer gives the mesh its own material before changing it, so meshes
/// that shared a material are not affected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshPaint {
    /// Path of the mesh node from the scene root.
    pub path: NodePath,
    /// New color.
    #[serde(with = "cadview_ir::hex")]
    pub color: Rgb,
}

/// Current values of the two group color controls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupControls {
    /// Main group color.
    #[serde(with = "cadview_ir::hex")]
    pub main: Rgb,
    /// Accent group color.
    #[serde(with = "cadview_ir::hex")]
    pub accent: Rgb,
}

/// One-time color values that replace a sidecar's authored defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColorOverride {
    /// Replacement main color.
    pub main: Option<Rgb>,
    /// Replacement accent color.
    pub accent: Option<Rgb>,
}

impl ColorOverride {
    /// True if neither color is set.
    pub fn is_empty(&self) -> bool {
        self.main.is_none() && self.accent.is_none()
    }
}

/// Group membership of one loaded scene, and the current group colors.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupState {
    controls: GroupControls,
    members: Vec<(NodePath, GroupKind)>,
}

impl GroupState {
    /// Classify every mesh node of `scene` against the sidecar.
    ///
    /// A mesh matching both groups belongs to the main group.
    pub fn assign(scene: &SceneNode, set: &ColorGroupSet, color_override: ColorOverride) -> Self {
        let matcher = set.matcher();
        let members: Vec<_> = scene
            .mesh_nodes()
            .into_iter()
            .filter_map(|mesh| {
                matcher
                    .classify(mesh.name, mesh.parent)
                    .map(|kind| (mesh.path, kind))
            })
            .collect();
        log::debug!(
            "color groups: {} main, {} accent meshes",
            members.iter().filter(|(_, k)| *k == GroupKind::Main).count(),
            members.iter().filter(|(_, k)| *k == GroupKind::Accent).count(),
        );
        Self {
            controls: GroupControls {
                main: color_override.main.unwrap_or(set.main_color),
                accent: color_override.accent.unwrap_or(set.accent_color),
            },
            members,
        }
    }

    /// Current control values.
    pub fn controls(&self) -> GroupControls {
        self.controls
    }

    /// Current color of a group.
    pub fn color(&self, kind: GroupKind) -> Rgb {
        match kind {
            GroupKind::Main => self.controls.main,
            GroupKind::Accent => self.controls.accent,
        }
    }

    /// Paths of the meshes in a group.
    pub fn members(&self, kind: GroupKind) -> impl Iterator<Item = &NodePath> {
        self.members
            .iter()
            .filter(move |(_, k)| *k == kind)
            .map(|(path, _)| path)
    }

    /// Paint every member mesh in its group's current color.
    pub fn paints(&self) -> Vec<MeshPaint> {
        self.members
            .iter()
            .map(|(path, kind)| MeshPaint {
                path: path.clone(),
                color: self.color(*kind),
            })
            .collect()
    }

    /// Change a group's color; returns the repaints for that group.
    pub fn set_color(&mut self, kind: GroupKind, color: Rgb) -> Vec<MeshPaint> {
        match kind {
            GroupKind::Main => self.controls.main = color,
            GroupKind::Accent => self.controls.accent = color,
        }
        self.members(kind)
            .map(|path| MeshPaint {
                path: path.clone(),
                color,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> SceneNode {
        SceneNode::group(
            "",
            vec![
                SceneNode::group(
                    "Housing",
                    vec![SceneNode::with_mesh("Base-1", 0), SceneNode::with_mesh("Base-2", 0)],
                ),
                SceneNode::with_mesh("Lid.step (mesh)", 1),
                SceneNode::with_mesh("Screw", 2),
            ],
        )
    }

    fn set() -> ColorGroupSet {
        ColorGroupSet {
            main_color: Rgb::new(1.0, 0.0, 0.0),
            accent_color: Rgb::new(0.0, 1.0, 0.0),
            main_parts: vec!["Base".into()],
            accent_parts: vec!["Lid".into(), "Housing".into()],
        }
    }

    #[test]
    fn test_assign_with_main_precedence() {
        let state = GroupState::assign(&scene(), &set(), ColorOverride::default());
        let main: Vec<_> = state.members(GroupKind::Main).cloned().collect();
        let accent: Vec<_> = state.members(GroupKind::Accent).cloned().collect();
        // Base instances also match the accent group through their parent
        assert_eq!(main, vec![vec![0, 0], vec![0, 1]]);
        assert_eq!(accent, vec![vec![1]]);
        assert_eq!(state.paints().len(), 3);
    }

    #[test]
    fn test_override_replaces_defaults() {
        let state = GroupState::assign(
            &scene(),
            &set(),
            ColorOverride {
                main: None,
                accent: Some(Rgb::new(0.0, 0.0, 0.0)),
            },
        );
        assert_eq!(state.controls().main, Rgb::new(1.0, 0.0, 0.0));
        assert_eq!(state.controls().accent, Rgb::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_set_color_repaints_one_group() {
        let mut state = GroupState::assign(&scene(), &set(), ColorOverride::default());
        let blue = Rgb::new(0.0, 0.0, 1.0);
        let paints = state.set_color(GroupKind::Main, blue);
        assert_eq!(paints.len(), 2);
        assert!(paints.iter().all(|p| p.color == blue));
        assert_eq!(state.color(GroupKind::Main), blue);
        assert_eq!(state.color(GroupKind::Accent), Rgb::new(0.0, 1.0, 0.0));
    }
}
