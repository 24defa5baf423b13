//! Node name normalization.
//!
//! Geometry conversion tools rename nodes as they go: FreeCAD prefixes the
//! assembly path and keeps the source file suffix, and tags nodes with
//! `(mesh)` / `(group)`; instanced parts get a `-N` suffix, and duplicated
//! objects a three-digit counter (`Body001` from FreeCAD, `Body.001` from
//! Blender). These helpers map every such variant back to one canonical key so
//! that part names recovered from STEP text match the node names of the
//! exported scene.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static FORMAT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(?:step|stp)(-\d+)?$").unwrap());

static TOOL_ARTIFACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*-?\s*\((?:mesh|group)\)\s*").unwrap());

static INSTANCE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+)-\d+$").unwrap());

static DUPLICATE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(.+)\.\d{3}|(.*\D)\d{3})$").unwrap());

/// Canonicalize a raw node name.
///
/// Keeps the last path component, then strips `.step`/`.stp` suffixes and
/// `(mesh)`/`(group)` artifacts until the name is stable, and trims it.
///
/// ```
/// use cadview_ir::names::clean_node_name;
///
/// assert_eq!(clean_node_name("Assembly/Bracket.step (mesh)"), "Bracket");
/// assert_eq!(clean_node_name("Part.step-1"), "Part-1");
/// ```
pub fn clean_node_name(raw: &str) -> String {
    let tail = raw.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(raw);
    let mut current = tail.trim().to_string();
    loop {
        let without_suffix = FORMAT_SUFFIX.replace(&current, "${1}");
        let without_artifacts = TOOL_ARTIFACT.replace_all(&without_suffix, "");
        let next = without_artifacts.trim();
        if next == current {
            return current;
        }
        current = next.to_string();
    }
}

/// Remove a trailing `-<digits>` instance suffix (`Bracket-3` → `Bracket`).
pub fn strip_instance_suffix(name: &str) -> &str {
    INSTANCE_SUFFIX
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map_or(name, |m| m.as_str())
}

/// Remove a three-digit duplicate counter (`Body001` or `Body.001` → `Body`).
///
/// Exactly three digits are stripped, and only after a non-digit, so `Part2`
/// and `M12` are left alone.
pub fn strip_duplicate_suffix(name: &str) -> &str {
    DUPLICATE_SUFFIX
        .captures(name)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map_or(name, |m| m.as_str())
}

/// Lookup table keyed by normalized names.
///
/// For a node and then for its parent, resolution tries the cleaned name, the
/// instance-stripped name and the duplicate-stripped name.
#[derive(Debug, Clone)]
pub struct NameIndex<V> {
    exact: HashMap<String, V>,
    stripped: HashMap<String, V>,
    duplicates: HashMap<String, V>,
}

impl<V> Default for NameIndex<V> {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            stripped: HashMap::new(),
            duplicates: HashMap::new(),
        }
    }
}

impl<V: Clone> NameIndex<V> {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value under the normalized form of `key`.
    ///
    /// A later insert for the same cleaned key replaces the earlier one. For
    /// the stripped keys the first insert is kept.
    pub fn insert(&mut self, key: &str, value: V) {
        let cleaned = clean_node_name(key);
        if cleaned.is_empty() {
            return;
        }
        self.stripped
            .entry(strip_instance_suffix(&cleaned).to_string())
            .or_insert_with(|| value.clone());
        self.duplicates
            .entry(strip_duplicate_suffix(&cleaned).to_string())
            .or_insert_with(|| value.clone());
        self.exact.insert(cleaned, value);
    }

    /// Number of distinct cleaned keys.
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    /// True if nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    /// Resolve a node by its own raw name and its parent's raw name.
    pub fn resolve(&self, name: &str, parent: Option<&str>) -> Option<&V> {
        self.resolve_one(name)
            .or_else(|| parent.and_then(|p| self.resolve_one(p)))
    }

    fn resolve_one(&self, raw: &str) -> Option<&V> {
        let cleaned = clean_node_name(raw);
        if cleaned.is_empty() {
            return None;
        }
        self.exact
            .get(&cleaned)
            .or_else(|| self.stripped.get(strip_instance_suffix(&cleaned)))
            .or_else(|| self.duplicates.get(strip_duplicate_suffix(&cleaned)))
    }
}

impl<V: Clone, K: AsRef<str>> FromIterator<(K, V)> for NameIndex<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut index = Self::new();
        for (key, value) in iter {
            index.insert(key.as_ref(), value);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path_and_artifacts() {
        assert_eq!(clean_node_name("Assembly/Bracket-(mesh)-3"), "Bracket-3");
        assert_eq!(strip_instance_suffix(&clean_node_name("Assembly/Bracket-(mesh)-3")), "Bracket");
        assert_eq!(clean_node_name("Assembly/Bracket.step (mesh)"), "Bracket");
        assert_eq!(clean_node_name("Assembly/Bracket-2.step (mesh)"), "Bracket-2");
        assert_eq!(clean_node_name("Top\\Sub\\Lid (GROUP)"), "Lid");
        assert_eq!(clean_node_name("  Base.STP  "), "Base");
    }

    #[test]
    fn test_step_suffix_keeps_instance() {
        assert_eq!(clean_node_name("Part.step-1"), "Part-1");
        assert_eq!(clean_node_name("Part.step"), "Part");
        assert_eq!(clean_node_name("Part.stepper"), "Part.stepper");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Assembly/Bracket-(mesh)-3",
            "Assembly/Bracket-2.step (mesh)",
            "a/b/c.step (group) (mesh)",
            "Plain",
            "",
            "x.step.step",
            " (mesh) ",
        ];
        for raw in samples {
            let once = clean_node_name(raw);
            assert_eq!(clean_node_name(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_strip_instance_suffix() {
        assert_eq!(strip_instance_suffix("Bracket-3"), "Bracket");
        assert_eq!(strip_instance_suffix("Bracket-12-3"), "Bracket-12");
        assert_eq!(strip_instance_suffix("Bracket"), "Bracket");
        assert_eq!(strip_instance_suffix("-3"), "-3");
        assert_eq!(strip_instance_suffix("M-3a"), "M-3a");
    }

    #[test]
    fn test_strip_duplicate_suffix() {
        assert_eq!(strip_duplicate_suffix("Body001"), "Body");
        assert_eq!(strip_duplicate_suffix("Body.002"), "Body");
        assert_eq!(strip_duplicate_suffix("Part2"), "Part2");
        assert_eq!(strip_duplicate_suffix("Part0001"), "Part0001");
        assert_eq!(strip_duplicate_suffix("123"), "123");
        assert_eq!(strip_duplicate_suffix("Bracket"), "Bracket");
    }

    #[test]
    fn test_index_duplicate_names() {
        let index: NameIndex<&str> = [("Bracket", "red"), ("Shaft-1", "grey")].into_iter().collect();
        assert_eq!(index.resolve("Assembly/Bracket001", None), Some(&"red"));
        assert_eq!(index.resolve("Bracket.003 (mesh)", None), Some(&"red"));
        assert_eq!(index.resolve("Shaft-1", None), Some(&"grey"));
        assert_eq!(index.resolve("Bracket2", None), None);
        // Parent tiers are tried after all of the node's own tiers
        assert_eq!(index.resolve("Body", Some("Bracket001 (group)")), Some(&"red"));
    }

    #[test]
    fn test_index_resolution_order() {
        let index: NameIndex<&str> = [("Bracket", "red"), ("Frame.step", "blue")]
            .into_iter()
            .collect();

        assert_eq!(index.resolve("Assembly/Bracket.step (mesh)", None), Some(&"red"));
        assert_eq!(index.resolve("Assembly/Bracket-2.step (mesh)", None), Some(&"red"));
        // Falls back to the containing group.
        assert_eq!(index.resolve("Body001", Some("Top/Frame-1 (group)")), Some(&"blue"));
        assert_eq!(index.resolve("Screw", Some("Fasteners")), None);
    }

    #[test]
    fn test_index_exact_beats_stripped() {
        let index: NameIndex<u32> = [("Bolt-1", 1), ("Bolt-2", 2)].into_iter().collect();
        assert_eq!(index.resolve("Bolt-2", None), Some(&2));
        // Stripped table keeps the first insert.
        assert_eq!(index.resolve("Bolt-7", None), Some(&1));
        assert_eq!(index.len(), 2);
    }
}
