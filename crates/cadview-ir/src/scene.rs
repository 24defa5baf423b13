//! Scene graph as loaded from an exported model.

use serde::{Deserialize, Serialize};

/// A 4x4 transformation matrix (column-major, like glTF).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Column-major storage: [col0, col1, col2, col3]
    pub cols: [[f32; 4]; 4],
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Build from a flat column-major array (glTF `matrix`).
    pub fn from_cols_array(m: [f32; 16]) -> Self {
        let mut cols = [[0.0; 4]; 4];
        for (i, col) in cols.iter_mut().enumerate() {
            col.copy_from_slice(&m[i * 4..i * 4 + 4]);
        }
        Self { cols }
    }

    /// Build from translation, unit quaternion `[x, y, z, w]` and scale.
    pub fn from_trs(t: [f32; 3], q: [f32; 4], s: [f32; 3]) -> Self {
        let [x, y, z, w] = q;
        let (x2, y2, z2) = (x + x, y + y, z + z);
        let (xx, xy, xz) = (x * x2, x * y2, x * z2);
        let (yy, yz, zz) = (y * y2, y * z2, z * z2);
        let (wx, wy, wz) = (w * x2, w * y2, w * z2);
        Self {
            cols: [
                [(1.0 - (yy + zz)) * s[0], (xy + wz) * s[0], (xz - wy) * s[0], 0.0],
                [(xy - wz) * s[1], (1.0 - (xx + zz)) * s[1], (yz + wx) * s[1], 0.0],
                [(xz + wy) * s[2], (yz - wx) * s[2], (1.0 - (xx + yy)) * s[2], 0.0],
                [t[0], t[1], t[2], 1.0],
            ],
        }
    }

    /// Multiply two transforms: self * other
    pub fn mul(&self, other: &Transform) -> Transform {
        let mut result = [[0.0; 4]; 4];
        for (i, result_col) in result.iter_mut().enumerate() {
            for (j, result_elem) in result_col.iter_mut().enumerate() {
                for k in 0..4 {
                    *result_elem += self.cols[k][j] * other.cols[i][k];
                }
            }
        }
        Transform { cols: result }
    }

    /// Transform a point (w = 1).
    pub fn transform_point(&self, p: [f32; 3]) -> [f32; 3] {
        let c = &self.cols;
        [
            c[0][0] * p[0] + c[1][0] * p[1] + c[2][0] * p[2] + c[3][0],
            c[0][1] * p[0] + c[1][1] * p[1] + c[2][1] * p[2] + c[3][1],
            c[0][2] * p[0] + c[1][2] * p[1] + c[2][2] * p[2] + c[3][2],
        ]
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: [f32; 3],
    /// Maximum corner.
    pub max: [f32; 3],
}

impl Aabb {
    /// Smallest box containing both.
    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        for i in 0..3 {
            out.min[i] = out.min[i].min(other.min[i]);
            out.max[i] = out.max[i].max(other.max[i]);
        }
        out
    }

    /// Bounds of this box after transforming its eight corners.
    pub fn transformed(&self, t: &Transform) -> Aabb {
        let mut out: Option<Aabb> = None;
        for i in 0..8 {
            let corner = [
                if i & 1 == 0 { self.min[0] } else { self.max[0] },
                if i & 2 == 0 { self.min[1] } else { self.max[1] },
                if i & 4 == 0 { self.min[2] } else { self.max[2] },
            ];
            let p = t.transform_point(corner);
            let point_box = Aabb { min: p, max: p };
            out = Some(match out {
                Some(b) => b.union(&point_box),
                None => point_box,
            });
        }
        out.unwrap_or(*self)
    }

    /// Center point.
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Length of the diagonal.
    pub fn diagonal(&self) -> f32 {
        let d = [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ];
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
    }
}

/// Mesh attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    /// Index of the mesh in the source document.
    pub index: usize,
    /// Local-space bounds, when known.
    #[serde(default)]
    pub bounds: Option<Aabb>,
}

/// Child-index path from the scene root to a node.
pub type NodePath = Vec<usize>;

/// A node of the loaded scene graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    /// Node name as exported.
    #[serde(default)]
    pub name: String,
    /// Local transform.
    #[serde(default)]
    pub transform: Transform,
    /// Child nodes, in document order.
    #[serde(default)]
    pub children: Vec<SceneNode>,
    /// Mesh, for leaf geometry nodes.
    #[serde(default)]
    pub mesh: Option<MeshData>,
    /// Visibility flag toggled by the viewer.
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

/// A mesh node found by [`SceneNode::mesh_nodes`].
#[derive(Debug, Clone, PartialEq)]
pub struct MeshNodeRef<'a> {
    /// Path from the root.
    pub path: NodePath,
    /// The node's raw name.
    pub name: &'a str,
    /// The parent's raw name (`None` for the root).
    pub parent: Option<&'a str>,
}

impl SceneNode {
    /// A grouping node.
    pub fn group(name: impl Into<String>, children: Vec<SceneNode>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            children,
            mesh: None,
            visible: true,
        }
    }

    /// A leaf node carrying mesh `index`.
    pub fn with_mesh(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            children: Vec::new(),
            mesh: Some(MeshData {
                index,
                bounds: None,
            }),
            visible: true,
        }
    }

    /// Node at `path`.
    pub fn node_at(&self, path: &[usize]) -> Option<&SceneNode> {
        path.iter().try_fold(self, |node, &i| node.children.get(i))
    }

    /// Mutable node at `path`.
    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut SceneNode> {
        path.iter()
            .try_fold(self, |node, &i| node.children.get_mut(i))
    }

    /// All nodes carrying a mesh, depth-first.
    pub fn mesh_nodes(&self) -> Vec<MeshNodeRef<'_>> {
        let mut out = Vec::new();
        let mut stack: Vec<(&SceneNode, NodePath, Option<&str>)> = vec![(self, Vec::new(), None)];
        while let Some((node, path, parent)) = stack.pop() {
            if node.mesh.is_some() {
                out.push(MeshNodeRef {
                    path: path.clone(),
                    name: &node.name,
                    parent,
                });
            }
            for (i, child) in node.children.iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(i);
                stack.push((child, child_path, Some(node.name.as_str())));
            }
        }
        out
    }

    /// Set visibility on this node and all descendants.
    pub fn set_visible_recursive(&mut self, visible: bool) {
        self.visible = visible;
        for child in &mut self.children {
            child.set_visible_recursive(visible);
        }
    }

    /// Total number of nodes, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::node_count).sum::<usize>()
    }

    /// World-space bounds of every visible mesh with known bounds.
    pub fn world_bounds(&self) -> Option<Aabb> {
        self.bounds_under(&Transform::identity())
    }

    fn bounds_under(&self, parent: &Transform) -> Option<Aabb> {
        if !self.visible {
            return None;
        }
        let world = parent.mul(&self.transform);
        let own = self
            .mesh
            .as_ref()
            .and_then(|m| m.bounds)
            .map(|b| b.transformed(&world));
        self.children
            .iter()
            .filter_map(|c| c.bounds_under(&world))
            .fold(own, |acc, b| Some(acc.map_or(b, |a| a.union(&b))))
    }
}
