//! Part-name → color associations and their JSON side document.
//!
//! The side document keeps one table of named colors and one table mapping
//! part names to color names, with channels as `0..=1` floats:
//!
//! ```json
//! {
//!   "materials": { "red": [1.0, 0.0, 0.0] },
//!   "objects": { "Base": "red" }
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::color::Rgb;
use crate::error::Result;

/// A color resolved for one part.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorEntry {
    /// Part name as found in the source file.
    pub part_name: String,
    /// Name of the color definition (may be empty).
    pub color_name: String,
    /// The color.
    pub color: Rgb,
}

/// Insertion-ordered mapping from part name to color.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorMap {
    entries: IndexMap<String, ColorEntry>,
}

/// Serialized form of a [`ColorMap`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColorMapDocument {
    /// Named colors.
    #[serde(default)]
    pub materials: IndexMap<String, Rgb>,
    /// Part name → color name.
    #[serde(default)]
    pub objects: IndexMap<String, String>,
}

impl ColorMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. A later entry for the same part replaces the earlier one
    /// but keeps its position.
    pub fn insert(&mut self, entry: ColorEntry) {
        self.entries.insert(entry.part_name.clone(), entry);
    }

    /// Look up a part by its exact name.
    pub fn get(&self, part_name: &str) -> Option<&ColorEntry> {
        self.entries.get(part_name)
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no part has a color.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ColorEntry> {
        self.entries.values()
    }

    /// Build the side document.
    ///
    /// Unnamed colors are named `color_<r>_<g>_<b>`. A name already used by a
    /// different color gets a numeric suffix.
    pub fn to_document(&self) -> ColorMapDocument {
        let mut doc = ColorMapDocument::default();
        for entry in self.entries.values() {
            let base = if entry.color_name.trim().is_empty() {
                generated_color_name(entry.color)
            } else {
                entry.color_name.clone()
            };
            let mut name = base.clone();
            let mut n = 2;
            while let Some(existing) = doc.materials.get(&name) {
                if *existing == entry.color {
                    break;
                }
                name = format!("{base}_{n}");
                n += 1;
            }
            doc.materials.insert(name.clone(), entry.color);
            doc.objects.insert(entry.part_name.clone(), name);
        }
        doc
    }

    /// Rebuild a map from its side document.
    ///
    /// Objects naming an unknown color are skipped.
    pub fn from_document(doc: &ColorMapDocument) -> Self {
        let mut map = Self::new();
        for (part_name, color_name) in &doc.objects {
            match doc.materials.get(color_name) {
                Some(color) => map.insert(ColorEntry {
                    part_name: part_name.clone(),
                    color_name: color_name.clone(),
                    color: *color,
                }),
                None => log::warn!("part {part_name:?} references unknown color {color_name:?}"),
            }
        }
        map
    }

    /// Encode as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: ColorMapDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(&doc))
    }

    /// Write the side document, creating parent directories as needed.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a side document.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl<'a> IntoIterator for &'a ColorMap {
    type Item = &'a ColorEntry;
    type IntoIter = indexmap::map::Values<'a, String, ColorEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

fn generated_color_name(c: Rgb) -> String {
    format!("color_{:.3}_{:.3}_{:.3}", c.r, c.g, c.b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(part: &str, name: &str, c: [f32; 3]) -> ColorEntry {
        ColorEntry {
            part_name: part.into(),
            color_name: name.into(),
            color: c.into(),
        }
    }

    #[test]
    fn test_last_write_wins() {
        let mut map = ColorMap::new();
        map.insert(entry("Base", "red", [1.0, 0.0, 0.0]));
        map.insert(entry("Lid", "blue", [0.0, 0.0, 1.0]));
        map.insert(entry("Base", "green", [0.0, 1.0, 0.0]));

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("Base").unwrap().color_name, "green");
        let order: Vec<_> = map.iter().map(|e| e.part_name.as_str()).collect();
        assert_eq!(order, ["Base", "Lid"]);
    }

    #[test]
    fn test_document_round_trip() {
        let mut map = ColorMap::new();
        map.insert(entry("Base", "", [0.784_313_7, 0.196_078_43, 0.196_078_43]));
        map.insert(entry("Lid", "steel", [0.6, 0.6, 0.65]));
        map.insert(entry("Bracket", "", [0.784_313_7, 0.196_078_43, 0.196_078_43]));

        let decoded = ColorMap::from_json(&map.to_json().unwrap()).unwrap();

        let keys = |m: &ColorMap| m.iter().map(|e| e.part_name.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&decoded), keys(&map));
        for original in &map {
            assert_eq!(decoded.get(&original.part_name).unwrap().color, original.color);
        }
    }

    #[test]
    fn test_shared_and_conflicting_names() {
        let mut map = ColorMap::new();
        map.insert(entry("A", "paint", [1.0, 0.0, 0.0]));
        map.insert(entry("B", "paint", [1.0, 0.0, 0.0]));
        map.insert(entry("C", "paint", [0.0, 0.0, 1.0]));
        map.insert(entry("D", "", [0.5, 0.25, 0.0]));

        let doc = map.to_document();
        assert_eq!(doc.materials.len(), 3);
        assert_eq!(doc.objects["A"], "paint");
        assert_eq!(doc.objects["B"], "paint");
        assert_eq!(doc.objects["C"], "paint_2");
        assert_eq!(doc.objects["D"], "color_0.500_0.250_0.000");
    }

    #[test]
    fn test_unknown_color_reference_skipped() {
        let json = r#"{"materials": {"red": [1, 0, 0]}, "objects": {"A": "red", "B": "missing"}}"#;
        let map = ColorMap::from_json(json).unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.get("B").is_none());
    }

    #[test]
    fn test_malformed_document_is_error() {
        assert!(ColorMap::from_json("{not json").is_err());
    }
}
