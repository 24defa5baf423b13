//! Reflecting a glTF node hierarchy into a [`SceneNode`] tree.

use gltf::json;
use gltf::json::mesh::Semantic;
use gltf::json::validation::Checked;
use serde_json::Value;

use cadview_ir::{clean_node_name, Aabb, MeshData, SceneNode, Transform};

/// Build the scene graph of the default scene.
///
/// The returned root is an unnamed group whose children are the scene's root
/// nodes. Without any scene, every node that is nobody's child becomes a root.
pub fn scene_graph(root: &json::Root) -> SceneNode {
    let bounds: Vec<Option<Aabb>> = root.meshes.iter().map(|m| mesh_bounds(root, m)).collect();

    let scene = root
        .scene
        .as_ref()
        .map(|s| s.value())
        .or_else(|| (!root.scenes.is_empty()).then_some(0))
        .and_then(|i| root.scenes.get(i));
    let tops: Vec<usize> = match scene {
        Some(scene) => scene.nodes.iter().map(|n| n.value()).collect(),
        None => {
            let mut is_child = vec![false; root.nodes.len()];
            for node in &root.nodes {
                for child in node.children.iter().flatten() {
                    if let Some(flag) = is_child.get_mut(child.value()) {
                        *flag = true;
                    }
                }
            }
            (0..root.nodes.len()).filter(|&i| !is_child[i]).collect()
        }
    };

    let mut on_path = vec![false; root.nodes.len()];
    let children = tops
        .into_iter()
        .filter_map(|i| build_node(root, i, &bounds, &mut on_path))
        .collect();
    SceneNode::group("", children)
}

fn build_node(
    root: &json::Root,
    index: usize,
    bounds: &[Option<Aabb>],
    on_path: &mut [bool],
) -> Option<SceneNode> {
    let node = root.nodes.get(index)?;
    if on_path[index] {
        log::warn!("node {index} is its own ancestor; cycle cut");
        return None;
    }
    on_path[index] = true;
    let children = node
        .children
        .iter()
        .flatten()
        .filter_map(|c| build_node(root, c.value(), bounds, on_path))
        .collect();
    on_path[index] = false;

    Some(SceneNode {
        name: node.name.clone().unwrap_or_default(),
        transform: node_transform(node),
        children,
        mesh: node.mesh.as_ref().map(|m| MeshData {
            index: m.value(),
            bounds: bounds.get(m.value()).copied().flatten(),
        }),
        visible: true,
    })
}

fn node_transform(node: &json::Node) -> Transform {
    if let Some(matrix) = node.matrix {
        return Transform::from_cols_array(matrix);
    }
    Transform::from_trs(
        node.translation.unwrap_or([0.0; 3]),
        node.rotation.as_ref().map_or([0.0, 0.0, 0.0, 1.0], |q| q.0),
        node.scale.unwrap_or([1.0; 3]),
    )
}

/// Local bounds of a mesh from its `POSITION` accessors' `min`/`max`.
fn mesh_bounds(root: &json::Root, mesh: &json::Mesh) -> Option<Aabb> {
    mesh.primitives
        .iter()
        .filter_map(|prim| {
            let accessor = prim.attributes.get(&Checked::Valid(Semantic::Positions))?;
            let accessor = root.accessors.get(accessor.value())?;
            Some(Aabb {
                min: vec3(accessor.min.as_ref()?)?,
                max: vec3(accessor.max.as_ref()?)?,
            })
        })
        .reduce(|a, b| a.union(&b))
}

fn vec3(value: &Value) -> Option<[f32; 3]> {
    match value.as_array()?.as_slice() {
        [x, y, z] => Some([x.as_f64()? as f32, y.as_f64()? as f32, z.as_f64()? as f32]),
        _ => None,
    }
}

/// Indented outline of the tree using cleaned names.
pub fn outline(scene: &SceneNode) -> String {
    let mut out = String::new();
    for child in &scene.children {
        write_outline(child, 0, &mut out);
    }
    out
}

fn write_outline(node: &SceneNode, depth: usize, out: &mut String) {
    let cleaned = clean_node_name(&node.name);
    let label = if cleaned.is_empty() { "(unnamed)" } else { cleaned.as_str() };
    out.push_str(&"  ".repeat(depth));
    out.push_str(label);
    if let Some(mesh) = &node.mesh {
        out.push_str(&format!(" [mesh {}]", mesh.index));
    }
    out.push('\n');
    for child in &node.children {
        write_outline(child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures;
    use approx::assert_relative_eq;

    #[test]
    fn test_scene_graph_shape() {
        let scene = scene_graph(&fixtures::assembly_root());
        assert_eq!(scene.name, "");
        assert_eq!(scene.children.len(), 1);
        assert_eq!(scene.node_count(), 5);

        let meshes = scene.mesh_nodes();
        assert_eq!(meshes.len(), 3);
        assert_eq!(meshes[0].name, "Assembly/Bracket-(mesh)-1");
        assert_eq!(meshes[0].parent, Some("Assembly"));
    }

    #[test]
    fn test_world_bounds_follow_translation() {
        let scene = scene_graph(&fixtures::assembly_root());
        let bounds = scene.world_bounds().unwrap();
        assert_relative_eq!(bounds.min[0], 0.0);
        assert_relative_eq!(bounds.max[0], 3.0);
        assert_relative_eq!(bounds.max[1], 1.0);
    }

    #[test]
    fn test_cycles_are_cut() {
        let mut root = fixtures::assembly_root();
        root.nodes[1].children = Some(vec![json::Index::new(0)]);
        let scene = scene_graph(&root);
        assert_eq!(scene.node_count(), 5);
    }

    #[test]
    fn test_outline() {
        let text = outline(&scene_graph(&fixtures::assembly_root()));
        assert_eq!(
            text,
            "Assembly\n  Bracket-1 [mesh 0]\n  Bracket-2 [mesh 0]\n  Lid [mesh 1]\n"
        );
    }
}
