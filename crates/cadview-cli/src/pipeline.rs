//! The conversion pipeline: color extraction, geometry conversion, color
//! reapplication, compression.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};
use thiserror::Error;

use cadview_gltf::{recolor, GltfDocument, RecolorReport};
use cadview_ir::ColorMap;
use cadview_step::extract_colors_from_file;

use crate::config::Config;

/// Inputs whose colors can be read before conversion.
const STEP_EXTENSIONS: [&str; 2] = ["step", "stp"];

/// Stage failures that abort a conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// No configured converter accepts the input's extension.
    #[error("unsupported input extension '{extension}' (supported: {})", .supported.join(", "))]
    UnsupportedExtension {
        extension: String,
        supported: Vec<String>,
    },

    /// A stage has an empty argument vector.
    #[error("{stage}: no command configured (set it in cadview.toml)")]
    EmptyCommand { stage: String },

    /// The stage's program could not be started.
    #[error("{stage}: failed to run '{program}': {source}")]
    Spawn {
        stage: String,
        program: String,
        #[source]
        source: io::Error,
    },

    /// The stage's program exited unsuccessfully.
    #[error("{stage}: {status}")]
    Failed { stage: String, status: ExitStatus },

    /// The stage succeeded but did not write its output.
    #[error("{stage}: no output written to {}", .path.display())]
    MissingOutput { stage: String, path: PathBuf },
}

/// An external tool invoked as `argv` with `{input}` and `{output}` filled in.
#[derive(Debug, Clone, Copy)]
pub struct ExternalCommand<'a> {
    stage: &'a str,
    argv: &'a [String],
}

impl<'a> ExternalCommand<'a> {
    pub fn new(stage: &'a str, argv: &'a [String]) -> Self {
        Self { stage, argv }
    }

    /// The argument vector for one invocation.
    pub fn expand(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.argv
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }

    /// Run to completion; `output` must exist afterwards.
    pub fn run(&self, input: &Path, output: &Path) -> std::result::Result<(), ConvertError> {
        let argv = self.expand(input, output);
        let Some((program, args)) = argv.split_first() else {
            return Err(ConvertError::EmptyCommand {
                stage: self.stage.to_string(),
            });
        };
        log::debug!("{}: {}", self.stage, argv.join(" "));

        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| ConvertError::Spawn {
                stage: self.stage.to_string(),
                program: program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(ConvertError::Failed {
                stage: self.stage.to_string(),
                status,
            });
        }
        if !output.is_file() {
            return Err(ConvertError::MissingOutput {
                stage: self.stage.to_string(),
                path: output.to_path_buf(),
            });
        }
        Ok(())
    }
}

/// Settings for one conversion, after CLI flags are applied to the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    pub compress: bool,
    pub keep_intermediate: bool,
    /// Color map applied instead of extracting one from the input.
    pub colors: Option<PathBuf>,
}

impl ConvertOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            compress: config.convert.compress,
            keep_intermediate: config.convert.keep_intermediate,
            colors: None,
        }
    }
}

/// What a conversion did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertReport {
    /// Parts in the applied color map, if there was one.
    pub part_colors: Option<usize>,
    pub recolor: RecolorReport,
    pub compressed: bool,
}

/// Convert `input` to a GLB at `output`.
///
/// Color extraction problems are logged and the conversion continues without
/// colors. An unreadable `--colors` map, a failing geometry converter or a
/// failing compressor aborts.
pub fn convert(
    input: &Path,
    output: &Path,
    config: &Config,
    options: ConvertOptions,
) -> Result<ConvertReport> {
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let (stage_name, stage) =
        config
            .stage_for(&extension)
            .ok_or_else(|| ConvertError::UnsupportedExtension {
                extension: extension.clone(),
                supported: config.supported_extensions(),
            })?;
    if stage.command.is_empty() {
        return Err(ConvertError::EmptyCommand {
            stage: stage_name.to_string(),
        }
        .into());
    }
    if !input.is_file() {
        anyhow::bail!("input file not found: {}", input.display());
    }

    let out_dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let scratch = tempfile::Builder::new()
        .prefix("cadview-")
        .tempdir()
        .context("creating a scratch directory")?;
    let work_dir = if options.keep_intermediate {
        out_dir.as_path()
    } else {
        scratch.path()
    };
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("model");
    let raw_glb = work_dir.join(format!("{stem}.stage-a.glb"));
    let colors_json = work_dir.join(format!("{stem}.part-colors.json"));

    log::info!("converting {} ({stage_name})", input.display());

    let colors = match &options.colors {
        Some(path) => {
            log::info!("using color map {}", path.display());
            let colors = ColorMap::read(path)
                .with_context(|| format!("reading color map {}", path.display()))?;
            Some(colors)
        }
        None if STEP_EXTENSIONS.contains(&extension.as_str()) => {
            extracted_colors(input, &colors_json)
        }
        None => None,
    };
    let part_colors = colors.as_ref().map(ColorMap::len);

    ExternalCommand::new(stage_name, &stage.command).run(input, &raw_glb)?;

    let mut doc = GltfDocument::read(&raw_glb)
        .with_context(|| format!("reading {}", raw_glb.display()))?;
    let report = recolor(&mut doc.root, colors.as_ref())?;
    log::info!(
        "recolor: {} renamed, {} colored, {} unmatched",
        report.renamed,
        report.colored,
        report.unmatched
    );

    if options.compress {
        let recolored = work_dir.join(format!("{stem}.recolored.glb"));
        doc.write(&recolored)?;
        ExternalCommand::new("compress", &config.compress.command).run(&recolored, output)?;
    } else {
        doc.write(output)
            .with_context(|| format!("writing {}", output.display()))?;
    }
    log::info!(
        "wrote {} ({} -> {})",
        output.display(),
        file_size(input),
        file_size(output)
    );

    Ok(ConvertReport {
        part_colors,
        recolor: report,
        compressed: options.compress,
    })
}

/// Extract into `colors_json` and read it back; failures only cost the colors.
fn extracted_colors(input: &Path, colors_json: &Path) -> Option<ColorMap> {
    if let Err(err) = extract_to(input, colors_json) {
        log::warn!("color extraction failed, continuing without colors: {err:#}");
        return None;
    }
    match ColorMap::read(colors_json) {
        Ok(colors) => Some(colors),
        Err(err) => {
            log::warn!("ignoring unreadable color map: {err}");
            None
        }
    }
}

/// File size in megabytes, for progress messages.
fn file_size(path: &Path) -> String {
    match std::fs::metadata(path) {
        Ok(meta) => format!("{:.1} MB", meta.len() as f64 / (1024.0 * 1024.0)),
        Err(_) => "? MB".to_string(),
    }
}

/// Extract the colors of a STEP file into a color map document.
pub fn extract_to(input: &Path, output: &Path) -> Result<usize> {
    let extraction = extract_colors_from_file(input)
        .with_context(|| format!("extracting colors from {}", input.display()))?;
    let stats = extraction.stats;
    log::debug!(
        "{} styled items, {} resolved, {} without color, {} without part, {} skipped records",
        stats.styled_items,
        stats.resolved,
        stats.missing_color,
        stats.missing_part,
        stats.skipped_records
    );
    extraction
        .colors
        .write(output)
        .with_context(|| format!("writing {}", output.display()))?;
    log::info!(
        "extracted {} part colors to {}{}",
        extraction.colors.len(),
        output.display(),
        extraction
            .originating_system
            .as_deref()
            .map(|system| format!(" (written by {system})"))
            .unwrap_or_default()
    );
    Ok(extraction.colors.len())
}
