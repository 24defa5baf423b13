//! `cadview.toml` settings for the conversion pipeline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE: &str = "cadview.toml";

/// Pipeline configuration. Missing sections use the built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub convert: ConvertSettings,
    /// Geometry converters keyed by a free-form name.
    pub stage_a: BTreeMap<String, StageCommand>,
    pub compress: CompressSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertSettings {
    /// Run the compressor after recoloring.
    pub compress: bool,
    /// Keep the intermediate GLB and color map next to the output.
    pub keep_intermediate: bool,
}

impl Default for ConvertSettings {
    fn default() -> Self {
        Self {
            compress: true,
            keep_intermediate: false,
        }
    }
}

/// An external geometry converter and the extensions it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCommand {
    /// Lowercase extensions without the dot.
    pub extensions: Vec<String>,
    /// Argument vector; `{input}` and `{output}` are substituted.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressSettings {
    pub command: Vec<String>,
}

impl Default for CompressSettings {
    fn default() -> Self {
        Self {
            command: argv(&["gltf-transform", "draco", "{input}", "{output}"]),
        }
    }
}

impl Default for Config {
    /// Known input kinds with no converter set; the tessellator scripts are
    /// site-specific, so `stage_a.<name>.command` comes from `cadview.toml`.
    fn default() -> Self {
        let mut stage_a = BTreeMap::new();
        stage_a.insert(
            "step".to_string(),
            StageCommand {
                extensions: argv(&["step", "stp"]),
                command: Vec::new(),
            },
        );
        stage_a.insert(
            "usdz".to_string(),
            StageCommand {
                extensions: argv(&["usdz"]),
                command: Vec::new(),
            },
        );
        Self {
            convert: ConvertSettings::default(),
            stage_a,
            compress: CompressSettings::default(),
        }
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load `explicit`, else `./cadview.toml`, else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let local = PathBuf::from(CONFIG_FILE);
                if !local.is_file() {
                    log::debug!("no {CONFIG_FILE}; using defaults");
                    return Ok(Self::default());
                }
                local
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// The converter handling `extension` (case-insensitive).
    pub fn stage_for(&self, extension: &str) -> Option<(&str, &StageCommand)> {
        self.stage_a
            .iter()
            .find(|(_, stage)| {
                stage
                    .extensions
                    .iter()
                    .any(|e| e.eq_ignore_ascii_case(extension))
            })
            .map(|(name, stage)| (name.as_str(), stage))
    }

    /// Every extension some converter accepts, sorted.
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .stage_a
            .values()
            .flat_map(|s| s.extensions.iter().map(|e| e.to_ascii_lowercase()))
            .collect();
        all.sort();
        all.dedup();
        all
    }
}
