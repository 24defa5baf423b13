//! Flattening the scene graph into hierarchy rows for the tree panel.

use std::collections::HashSet;

use serde::Serialize;

use cadview_ir::{clean_node_name, NodePath, SceneNode};

use crate::error::{Result, ViewerError};

/// Label shown for nodes whose cleaned name is empty.
pub const UNNAMED: &str = "(unnamed)";

/// One visible row of the tree panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeRow {
    /// Path from the scene root.
    pub path: NodePath,
    /// Cleaned node name.
    pub label: String,
    /// Nesting depth; the scene root's children are at depth 0.
    pub depth: usize,
    /// Whether the node has children.
    pub has_children: bool,
    /// Whether the node's children are listed.
    pub expanded: bool,
    /// The node's visibility flag.
    pub visible: bool,
    /// Whether the node carries a mesh.
    pub is_mesh: bool,
}

/// Expansion state of the tree panel. Everything starts expanded.
#[derive(Debug, Clone, Default)]
pub struct SceneTree {
    collapsed: HashSet<NodePath>,
}

impl SceneTree {
    /// Create a tree with every node expanded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows in depth-first order, skipping descendants of collapsed rows.
    pub fn rows(&self, scene: &SceneNode) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        let mut stack: Vec<(&SceneNode, NodePath, usize)> = scene
            .children
            .iter()
            .enumerate()
            .rev()
            .map(|(i, child)| (child, vec![i], 0))
            .collect();

        while let Some((node, path, depth)) = stack.pop() {
            let expanded = !self.collapsed.contains(&path);
            if expanded {
                for (i, child) in node.children.iter().enumerate().rev() {
                    let mut child_path = path.clone();
                    child_path.push(i);
                    stack.push((child, child_path, depth + 1));
                }
            }
            let label = clean_node_name(&node.name);
            rows.push(TreeRow {
                label: if label.is_empty() { UNNAMED.to_string() } else { label },
                depth,
                has_children: !node.children.is_empty(),
                expanded,
                visible: node.visible,
                is_mesh: node.mesh.is_some(),
                path,
            });
        }
        rows
    }

    /// Collapse an expanded row or expand a collapsed one.
    pub fn toggle_expanded(&mut self, path: &[usize]) {
        if !self.collapsed.remove(path) {
            self.collapsed.insert(path.to_vec());
        }
    }

    /// Whether a row is expanded.
    pub fn is_expanded(&self, path: &[usize]) -> bool {
        !self.collapsed.contains(path)
    }
}

/// Set visibility of a node and its whole subtree.
pub fn set_visible(scene: &mut SceneNode, path: &[usize], visible: bool) -> Result<()> {
    let node = scene
        .node_at_mut(path)
        .ok_or_else(|| ViewerError::UnknownNode(path.to_vec()))?;
    node.set_visible_recursive(visible);
    Ok(())
}

/// Flip the visibility of a subtree; returns the new state.
pub fn toggle_visible(scene: &mut SceneNode, path: &[usize]) -> Result<bool> {
    let visible = !scene
        .node_at(path)
        .ok_or_else(|| ViewerError::UnknownNode(path.to_vec()))?
        .visible;
    set_visible(scene, path, visible)?;
    Ok(visible)
}
