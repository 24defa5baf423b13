//! Reading and writing glTF documents in either container.

use std::borrow::Cow;
use std::path::Path;

use base64::Engine;
use gltf::json;

use cadview_ir::SceneNode;

use crate::error::{GltfError, Result};

const GLB_MAGIC: &[u8; 4] = b"glTF";

/// The container a document was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// Binary `.glb`.
    Binary,
    /// JSON `.gltf`.
    Text,
}

impl Container {
    /// Container implied by a file extension; anything but `.gltf` is binary.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gltf") => Container::Text,
            _ => Container::Binary,
        }
    }
}

/// A glTF document: the JSON root plus the GLB binary chunk, if any.
#[derive(Debug, Clone)]
pub struct GltfDocument {
    /// The JSON document.
    pub root: json::Root,
    /// Contents of the GLB `BIN` chunk.
    pub blob: Option<Vec<u8>>,
    /// Container the document came from.
    pub container: Container,
}

impl GltfDocument {
    /// Wrap an existing root and binary chunk.
    pub fn from_root(root: json::Root, blob: Option<Vec<u8>>) -> Self {
        Self {
            root,
            blob,
            container: Container::Binary,
        }
    }

    /// Parse GLB or glTF JSON bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        if data.starts_with(GLB_MAGIC) {
            let glb = gltf::Glb::from_slice(data)?;
            let root: json::Root = serde_json::from_slice(&glb.json)?;
            return Ok(Self {
                root,
                blob: glb.bin.map(Cow::into_owned),
                container: Container::Binary,
            });
        }
        if data.trim_ascii_start().starts_with(b"{") {
            let root: json::Root = serde_json::from_slice(data)?;
            return Ok(Self {
                root,
                blob: None,
                container: Container::Text,
            });
        }
        Err(GltfError::NotGltf("expected GLB magic or a JSON object".into()))
    }

    /// Read a `.glb` or `.gltf` file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        Self::from_slice(&data).map_err(|err| match err {
            GltfError::NotGltf(msg) => GltfError::NotGltf(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Serialize as GLB.
    pub fn to_glb(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(&self.root)?;
        let mut length = 12 + 8 + align4(json.len());
        if let Some(blob) = &self.blob {
            length += 8 + align4(blob.len());
        }
        let glb = gltf::Glb {
            header: gltf::binary::Header {
                magic: *GLB_MAGIC,
                version: 2,
                length: length as u32,
            },
            json: Cow::Owned(json),
            bin: self.blob.as_deref().map(Cow::Borrowed),
        };
        Ok(glb.to_vec()?)
    }

    /// Serialize as pretty-printed glTF JSON.
    ///
    /// A binary chunk is embedded into the first buffer as a data URI.
    pub fn to_gltf_json(&self) -> Result<Vec<u8>> {
        let embedded;
        let root = match (&self.blob, self.root.buffers.first()) {
            (Some(blob), Some(buffer)) if buffer.uri.is_none() => {
                let mut root = self.root.clone();
                root.buffers[0].uri = Some(format!(
                    "data:application/octet-stream;base64,{}",
                    base64::engine::general_purpose::STANDARD.encode(blob)
                ));
                embedded = root;
                &embedded
            }
            _ => &self.root,
        };
        Ok(serde_json::to_vec_pretty(root)?)
    }

    /// Serialize in the given container.
    pub fn to_vec(&self, container: Container) -> Result<Vec<u8>> {
        match container {
            Container::Binary => self.to_glb(),
            Container::Text => self.to_gltf_json(),
        }
    }

    /// Write to `path`, choosing the container from its extension.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_vec(Container::for_path(path))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Reflect the default scene as a [`SceneNode`] tree.
    pub fn scene(&self) -> SceneNode {
        crate::scene::scene_graph(&self.root)
    }
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glb_round_trip() {
        let doc = fixtures::assembly();
        let bytes = doc.to_glb().unwrap();
        assert_eq!(&bytes[..4], b"glTF");
        assert_eq!(bytes.len() % 4, 0);

        let back = GltfDocument::from_slice(&bytes).unwrap();
        assert_eq!(back.container, Container::Binary);
        assert_eq!(back.root.nodes.len(), 4);
        assert_eq!(back.blob.as_deref().map(|b| &b[..36]), Some(&fixtures::triangle_blob()[..]));
    }

    #[test]
    fn test_gltf_json_embeds_blob() {
        let doc = fixtures::assembly();
        let text = doc.to_gltf_json().unwrap();
        let back = GltfDocument::from_slice(&text).unwrap();
        assert_eq!(back.container, Container::Text);
        let uri = back.root.buffers[0].uri.as_deref().unwrap();
        assert!(uri.starts_with("data:application/octet-stream;base64,"));
    }

    #[test]
    fn test_rejects_other_files() {
        assert!(matches!(
            GltfDocument::from_slice(b"solid cube"),
            Err(GltfError::NotGltf(_))
        ));
    }

    #[test]
    fn test_write_picks_container_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let doc = fixtures::assembly();

        let glb = dir.path().join("out/model.glb");
        doc.write(&glb).unwrap();
        assert!(std::fs::read(&glb).unwrap().starts_with(b"glTF"));

        let gltf = dir.path().join("model.gltf");
        doc.write(&gltf).unwrap();
        assert_eq!(GltfDocument::read(&gltf).unwrap().container, Container::Text);
    }
}
