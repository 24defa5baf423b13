//! Renaming nodes and baking extracted part colors into materials.
//!
//! Geometry converters mangle node names (`Bracket.step (mesh)`,
//! `Assembly/Bracket-(mesh)-3`). Every node and mesh is renamed to its cleaned
//! form, and each mesh node whose name (or parent's name) resolves in the
//! [`ColorMap`] is pointed at a new material carrying that color.

use std::collections::{HashMap, HashSet};

use gltf::json;
use serde_json::json as json_value;

use cadview_ir::{clean_node_name, ColorMap, NameIndex, Rgb};

use crate::error::Result;

/// Unmatched node names listed in the debug log.
const UNMATCHED_PREVIEW: usize = 10;

/// Counters returned by [`recolor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecolorReport {
    /// Nodes and meshes whose name changed.
    pub renamed: usize,
    /// Mesh nodes that received a color.
    pub colored: usize,
    /// Mesh nodes no color entry matched.
    pub unmatched: usize,
}

/// Rename nodes and meshes and apply `colors` to matching mesh nodes.
///
/// Existing materials are never modified. When the nodes sharing a mesh end
/// up with different materials, the mesh is cloned per color so that every
/// user keeps its own material and no mesh is left without users.
pub fn recolor(root: &mut json::Root, colors: Option<&ColorMap>) -> Result<RecolorReport> {
    let mut report = RecolorReport::default();

    let raw_names: Vec<String> = root
        .nodes
        .iter()
        .map(|n| n.name.clone().unwrap_or_default())
        .collect();
    let mut parents: Vec<Option<usize>> = vec![None; root.nodes.len()];
    for (i, node) in root.nodes.iter().enumerate() {
        for child in node.children.iter().flatten() {
            if let Some(slot) = parents.get_mut(child.value()) {
                *slot = Some(i);
            }
        }
    }

    for node in &mut root.nodes {
        if rename(&mut node.name) {
            report.renamed += 1;
        }
    }
    for mesh in &mut root.meshes {
        if rename(&mut mesh.name) {
            report.renamed += 1;
        }
    }

    let Some(colors) = colors.filter(|c| !c.is_empty()) else {
        log::debug!("renamed {} nodes and meshes; no colors to apply", report.renamed);
        return Ok(report);
    };

    let document = colors.to_document();
    let index: NameIndex<(&str, &str)> = document
        .objects
        .iter()
        .map(|(part, color)| (part.as_str(), (part.as_str(), color.as_str())))
        .collect();

    let mut materials: HashMap<&str, u32> = HashMap::new();
    let mut matched_parts: HashSet<&str> = HashSet::new();
    let mut unmatched_names: Vec<String> = Vec::new();
    // (node, mesh, material) for every mesh node, in node order
    let mut assignments: Vec<(usize, usize, Option<u32>)> = Vec::new();

    for i in 0..root.nodes.len() {
        let Some(mesh) = root.nodes[i].mesh.as_ref().map(|m| m.value()) else {
            continue;
        };
        if mesh >= root.meshes.len() {
            continue;
        }
        let parent = parents[i].map(|p| raw_names[p].as_str());
        let resolved = index
            .resolve(&raw_names[i], parent)
            .and_then(|&(part, color_name)| {
                let color = document.materials.get(color_name).copied()?;
                Some((part, color_name, color))
            });
        let Some((part, color_name, color)) = resolved else {
            report.unmatched += 1;
            unmatched_names.push(clean_node_name(&raw_names[i]));
            assignments.push((i, mesh, None));
            continue;
        };
        matched_parts.insert(part);

        let material = match materials.get(color_name) {
            Some(&m) => m,
            None => {
                let m = root.materials.len() as u32;
                root.materials.push(baked_material(color_name, color)?);
                materials.insert(color_name, m);
                m
            }
        };
        assignments.push((i, mesh, Some(material)));
    }

    // A mesh keeps serving the first material assigned to it, unless some
    // user stays uncolored; other colors get one clone per (mesh, material).
    let mut owners: HashMap<usize, Option<u32>> = HashMap::new();
    for &(_, mesh, material) in &assignments {
        owners
            .entry(mesh)
            .and_modify(|owner| {
                if material.is_none() {
                    *owner = None;
                }
            })
            .or_insert(material);
    }

    let mut clones: HashMap<(usize, u32), usize> = HashMap::new();
    for (node, mesh, material) in assignments {
        let Some(material) = material else {
            continue;
        };
        let target = if owners.get(&mesh) == Some(&Some(material)) {
            mesh
        } else {
            *clones.entry((mesh, material)).or_insert_with(|| {
                root.meshes.push(root.meshes[mesh].clone());
                root.meshes.len() - 1
            })
        };
        for prim in &mut root.meshes[target].primitives {
            prim.material = Some(json::Index::new(material));
        }
        root.nodes[node].mesh = Some(json::Index::new(target as u32));
        report.colored += 1;
    }

    let unused = document.objects.len() - matched_parts.len();
    log::debug!(
        "colored {} mesh nodes with {} materials; {} unmatched nodes, {} unused color entries",
        report.colored,
        materials.len(),
        report.unmatched,
        unused,
    );
    if !unmatched_names.is_empty() {
        let extra = unmatched_names.len().saturating_sub(UNMATCHED_PREVIEW);
        unmatched_names.truncate(UNMATCHED_PREVIEW);
        log::debug!(
            "unmatched: {}{}",
            unmatched_names.join(", "),
            if extra > 0 { format!(" (and {extra} more)") } else { String::new() }
        );
    }
    Ok(report)
}

/// Replace a name with its cleaned form. Returns true if it changed.
fn rename(name: &mut Option<String>) -> bool {
    let Some(raw) = name.as_deref() else {
        return false;
    };
    let cleaned = clean_node_name(raw);
    if cleaned.is_empty() || cleaned == raw {
        return false;
    }
    *name = Some(cleaned);
    true
}

/// Matte material for a baked part color.
fn baked_material(name: &str, color: Rgb) -> Result<json::Material> {
    let value = json_value!({
        "name": name,
        "pbrMetallicRoughness": {
            "baseColorFactor": color.to_rgba(),
            "metallicFactor": 0.0,
            "roughnessFactor": 0.5,
        },
    });
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures;
    use cadview_ir::ColorEntry;

    fn entry(part: &str, name: &str, color: Rgb) -> ColorEntry {
        ColorEntry {
            part_name: part.into(),
            color_name: name.into(),
            color,
        }
    }

    fn mesh_of(root: &json::Root, node: usize) -> Option<usize> {
        root.nodes[node].mesh.as_ref().map(|m| m.value())
    }

    fn material_of(root: &json::Root, node: usize) -> Option<usize> {
        let mesh = mesh_of(root, node)?;
        root.meshes[mesh].primitives[0].material.as_ref().map(|m| m.value())
    }

    #[test]
    fn test_renames_without_colors() {
        let mut root = fixtures::assembly_root();
        let report = recolor(&mut root, None).unwrap();

        let names: Vec<_> = root.nodes.iter().map(|n| n.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["Assembly", "Bracket-1", "Bracket-2", "Lid"]);
        assert_eq!(root.meshes[0].name.as_deref(), Some("Bracket"));
        assert_eq!(root.meshes[1].name.as_deref(), Some("Lid"));
        assert_eq!(report, RecolorReport { renamed: 5, colored: 0, unmatched: 0 });
        assert_eq!(root.materials.len(), 1);
    }

    #[test]
    fn test_colors_by_stripped_instance_name() {
        let mut root = fixtures::assembly_root();
        let mut colors = ColorMap::new();
        colors.insert(entry("Bracket", "red", Rgb::new(1.0, 0.0, 0.0)));
        colors.insert(entry("Lid", "", Rgb::new(0.0, 0.0, 1.0)));

        let report = recolor(&mut root, Some(&colors)).unwrap();
        assert_eq!(report.colored, 3);
        assert_eq!(report.unmatched, 0);

        // Default material untouched, one material per color appended
        assert_eq!(root.materials.len(), 3);
        assert_eq!(root.materials[0].name.as_deref(), Some("Default"));
        assert_eq!(root.materials[1].name.as_deref(), Some("red"));
        assert_eq!(root.materials[2].name.as_deref(), Some("color_0.000_0.000_1.000"));

        let pbr = &root.materials[1].pbr_metallic_roughness;
        assert_eq!(pbr.base_color_factor.0, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(pbr.metallic_factor.0, 0.0);
        assert_eq!(pbr.roughness_factor.0, 0.5);

        assert_eq!(material_of(&root, 1), Some(1));
        assert_eq!(material_of(&root, 2), Some(1));
        assert_eq!(material_of(&root, 3), Some(2));
        // Both bracket instances keep sharing the original mesh; nothing is orphaned
        assert_eq!(mesh_of(&root, 1), Some(0));
        assert_eq!(mesh_of(&root, 2), Some(0));
        assert_eq!(root.meshes.len(), 2);
    }

    #[test]
    fn test_uncolored_user_keeps_original_mesh() {
        let mut root = fixtures::assembly_root();
        root.nodes[2].name = Some("Assembly/Spare (mesh)".into());
        let mut colors = ColorMap::new();
        colors.insert(entry("Bracket-1", "red", Rgb::new(1.0, 0.0, 0.0)));

        let report = recolor(&mut root, Some(&colors)).unwrap();
        assert_eq!(report.colored, 1);
        assert_eq!(mesh_of(&root, 1), Some(2));
        assert_eq!(material_of(&root, 1), Some(1));
        // The uncolored instance still uses the original with its default material
        assert_eq!(mesh_of(&root, 2), Some(0));
        assert_eq!(material_of(&root, 2), Some(0));
    }

    #[test]
    fn test_shared_mesh_split_by_color() {
        let mut root = fixtures::assembly_root();
        let mut colors = ColorMap::new();
        colors.insert(entry("Bracket-1", "red", Rgb::new(1.0, 0.0, 0.0)));
        colors.insert(entry("Bracket-2", "green", Rgb::new(0.0, 1.0, 0.0)));

        let report = recolor(&mut root, Some(&colors)).unwrap();
        assert_eq!(report.colored, 2);
        assert_eq!(report.unmatched, 1);
        assert_eq!(mesh_of(&root, 1), Some(0));
        assert_eq!(mesh_of(&root, 2), Some(2));
        assert_eq!(root.meshes.len(), 3);
        assert_eq!(material_of(&root, 1), Some(1));
        assert_eq!(material_of(&root, 2), Some(2));
        assert_eq!(material_of(&root, 3), None);
    }

    #[test]
    fn test_parent_name_fallback() {
        let mut root = fixtures::assembly_root();
        let mut colors = ColorMap::new();
        colors.insert(entry("Assembly", "steel", Rgb::new(0.5, 0.5, 0.5)));

        let report = recolor(&mut root, Some(&colors)).unwrap();
        assert_eq!(report.colored, 3);
        assert_eq!(report.unmatched, 0);
        assert_eq!(root.materials.len(), 2);
        assert!((1..4).all(|node| material_of(&root, node) == Some(1)));
    }

    #[test]
    fn test_step_suffixed_instances() {
        let mut root = fixtures::assembly_root();
        root.nodes[1].name = Some("Assembly/Bracket.step (mesh)".into());
        root.nodes[2].name = Some("Assembly/Bracket-2.step (mesh)".into());
        let mut colors = ColorMap::new();
        colors.insert(entry("Bracket", "red", Rgb::new(1.0, 0.0, 0.0)));

        let report = recolor(&mut root, Some(&colors)).unwrap();
        assert_eq!(root.nodes[1].name.as_deref(), Some("Bracket"));
        assert_eq!(root.nodes[2].name.as_deref(), Some("Bracket-2"));
        assert_eq!(report.colored, 2);
        assert_eq!(material_of(&root, 1), Some(1));
        assert_eq!(material_of(&root, 2), Some(1));
    }

    #[test]
    fn test_freecad_duplicate_names() {
        let mut root = fixtures::assembly_root();
        root.nodes[1].name = Some("Assembly/Bracket001".into());
        let mut colors = ColorMap::new();
        colors.insert(entry("Bracket", "red", Rgb::new(1.0, 0.0, 0.0)));

        let report = recolor(&mut root, Some(&colors)).unwrap();
        assert_eq!(report.colored, 2);
        assert_eq!(report.unmatched, 1);
        assert_eq!(root.nodes[1].name.as_deref(), Some("Bracket001"));
        assert_eq!(material_of(&root, 1), Some(1));
        assert_eq!(material_of(&root, 2), Some(1));
    }

    #[test]
    fn test_unnamed_nodes_keep_no_name() {
        let mut root = fixtures::assembly_root();
        root.nodes[0].name = None;
        root.nodes[3].name = Some("(mesh)".into());
        recolor(&mut root, None).unwrap();
        assert_eq!(root.nodes[0].name, None);
        assert_eq!(root.nodes[3].name.as_deref(), Some("(mesh)"));
    }
}
