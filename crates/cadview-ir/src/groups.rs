//! Viewer color groups: the optional `<model>.colors.json` sidecar.

use serde::{Deserialize, Serialize};

use crate::color::{hex, Rgb};
use crate::error::Result;
use crate::names::NameIndex;

/// The two user-adjustable color groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// The main body color.
    Main,
    /// The accent color.
    Accent,
}

impl GroupKind {
    /// Both groups, main first.
    pub const ALL: [GroupKind; 2] = [GroupKind::Main, GroupKind::Accent];

    /// Query parameter / JSON key for this group.
    pub fn key(self) -> &'static str {
        match self {
            GroupKind::Main => "main",
            GroupKind::Accent => "accent",
        }
    }
}

/// Two-group palette authored alongside an exported model.
///
/// Unknown keys are ignored, so scaffold files that still carry `_groups` /
/// `_parts` reference lists load fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorGroupSet {
    /// Default color for the main group.
    #[serde(with = "hex")]
    pub main_color: Rgb,
    /// Default color for the accent group.
    #[serde(with = "hex")]
    pub accent_color: Rgb,
    /// Part or group names in the main group.
    #[serde(default)]
    pub main_parts: Vec<String>,
    /// Part or group names in the accent group.
    #[serde(default)]
    pub accent_parts: Vec<String>,
}

impl ColorGroupSet {
    /// Decode a sidecar document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Authored default color of a group.
    pub fn color(&self, kind: GroupKind) -> Rgb {
        match kind {
            GroupKind::Main => self.main_color,
            GroupKind::Accent => self.accent_color,
        }
    }

    /// Build a matcher for classifying mesh nodes.
    pub fn matcher(&self) -> GroupMatcher {
        GroupMatcher {
            main: self.main_parts.iter().map(|p| (p, ())).collect(),
            accent: self.accent_parts.iter().map(|p| (p, ())).collect(),
        }
    }
}

/// Classifies mesh nodes into color groups.
///
/// A node matching both groups at any lookup tier belongs to the main group.
#[derive(Debug, Clone)]
pub struct GroupMatcher {
    main: NameIndex<()>,
    accent: NameIndex<()>,
}

impl GroupMatcher {
    /// Group of a mesh node, given its raw name and its parent's raw name.
    pub fn classify(&self, name: &str, parent: Option<&str>) -> Option<GroupKind> {
        if self.main.resolve(name, parent).is_some() {
            Some(GroupKind::Main)
        } else if self.accent.resolve(name, parent).is_some() {
            Some(GroupKind::Accent)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIDECAR: &str = r##"{
        "main_color": "#ff0000",
        "accent_color": "#00FF00",
        "main_parts": ["Base", "Frame"],
        "accent_parts": ["Lid", "Base"],
        "_groups": ["ignored"],
        "_parts": []
    }"##;

    #[test]
    fn test_parse_sidecar() {
        let set = ColorGroupSet::from_json(SIDECAR).unwrap();
        assert_eq!(set.main_color, Rgb::new(1.0, 0.0, 0.0));
        assert_eq!(set.color(GroupKind::Accent), Rgb::new(0.0, 1.0, 0.0));
        assert_eq!(set.main_parts, ["Base", "Frame"]);
    }

    #[test]
    fn test_classify_main_wins() {
        let matcher = ColorGroupSet::from_json(SIDECAR).unwrap().matcher();
        assert_eq!(matcher.classify("Asm/Base.step (mesh)", None), Some(GroupKind::Main));
        assert_eq!(matcher.classify("Lid-2", None), Some(GroupKind::Accent));
        // Accent by own name, main through the parent: main still wins.
        assert_eq!(matcher.classify("Lid", Some("Frame (group)")), Some(GroupKind::Main));
        assert_eq!(matcher.classify("Screw", Some("Hardware")), None);
    }

    #[test]
    fn test_missing_part_lists_default_empty() {
        let set = ColorGroupSet::from_json(r##"{"main_color":"#000","accent_color":"fff"}"##).unwrap();
        assert!(set.main_parts.is_empty());
        assert_eq!(set.accent_color, Rgb::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_bad_hex_rejected() {
        assert!(ColorGroupSet::from_json(r##"{"main_color":"red","accent_color":"#fff"}"##).is_err());
    }

    #[test]
    fn test_hex_serialization() {
        let set = ColorGroupSet::from_json(SIDECAR).unwrap();
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["main_color"], "#ff0000");
        assert_eq!(json["accent_color"], "#00ff00");
    }
}
