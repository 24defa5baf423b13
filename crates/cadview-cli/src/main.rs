//! cadview - convert CAD models to web-ready GLB with their STEP colors.

mod config;
mod pipeline;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use cadview_gltf::{outline, recolor, sidecar_path, GltfDocument, PartsTemplate};
use cadview_ir::ColorMap;

use config::Config;
use pipeline::{convert, extract_to, ConvertOptions};

#[derive(Parser)]
#[command(name = "cadview")]
#[command(about = "Convert STEP and USDZ models to GLB, keeping part colors", long_about = None)]
struct Cli {
    /// Configuration file (default: ./cadview.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full conversion pipeline
    Convert {
        /// Input model (.step, .stp, .usdz)
        input: PathBuf,
        /// Output .glb
        output: PathBuf,
        /// Skip Draco compression
        #[arg(long)]
        no_draco: bool,
        /// Keep the intermediate files next to the output
        #[arg(long)]
        keep_intermediate: bool,
        /// Apply this color map instead of extracting one from the input
        #[arg(long)]
        colors: Option<PathBuf>,
    },

    /// Extract part colors from a STEP file into a color map JSON
    ExtractColors {
        /// Input .step file
        input: PathBuf,
        /// Output color map
        output: PathBuf,
    },

    /// Clean node names and apply a color map to a GLB
    Recolor {
        /// Input .glb or .gltf
        input: PathBuf,
        /// Output .glb or .gltf
        output: PathBuf,
        /// Color map from extract-colors
        #[arg(long)]
        colors: Option<PathBuf>,
    },

    /// Write a color-group sidecar template listing a model's parts
    DumpParts {
        /// Input .glb
        model: PathBuf,
        /// Output path (default: <model>.colors.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the cleaned scene tree of a GLB
    Info {
        /// Input .glb or .gltf
        model: PathBuf,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Convert {
            input,
            output,
            no_draco,
            keep_intermediate,
            colors,
        } => {
            let config = Config::load(cli.config.as_deref())?;
            let mut options = ConvertOptions::from_config(&config);
            options.compress &= !no_draco;
            options.keep_intermediate |= keep_intermediate;
            options.colors = colors;
            let report = convert(&input, &output, &config, options)?;
            log::info!(
                "done: {} part colors, {} meshes colored{}",
                report.part_colors.unwrap_or(0),
                report.recolor.colored,
                if report.compressed { ", compressed" } else { "" }
            );
            Ok(())
        }
        Commands::ExtractColors { input, output } => {
            extract_to(&input, &output)?;
            Ok(())
        }
        Commands::Recolor {
            input,
            output,
            colors,
        } => run_recolor(&input, &output, colors.as_deref()),
        Commands::DumpParts { model, output } => {
            let output = output.unwrap_or_else(|| sidecar_path(&model));
            let doc = GltfDocument::read(&model)
                .with_context(|| format!("reading {}", model.display()))?;
            let template = PartsTemplate::from_scene(&doc.scene());
            template.write(&output)?;
            println!(
                "Found {} groups, {} parts -> {}",
                template.groups.len(),
                template.parts.len(),
                output.display()
            );
            println!(
                "Move names from _groups/_parts into main_parts/accent_parts, then delete the _ keys."
            );
            Ok(())
        }
        Commands::Info { model } => {
            let doc = GltfDocument::read(&model)
                .with_context(|| format!("reading {}", model.display()))?;
            print!("{}", outline(&doc.scene()));
            Ok(())
        }
    }
}

fn run_recolor(input: &Path, output: &Path, colors: Option<&Path>) -> Result<()> {
    let colors = colors
        .map(|path| {
            ColorMap::read(path).with_context(|| format!("reading color map {}", path.display()))
        })
        .transpose()?;
    let mut doc =
        GltfDocument::read(input).with_context(|| format!("reading {}", input.display()))?;
    let report = recolor(&mut doc.root, colors.as_ref())?;
    doc.write(output)
        .with_context(|| format!("writing {}", output.display()))?;
    log::info!(
        "{} renamed, {} colored, {} unmatched -> {}",
        report.renamed,
        report.colored,
        report.unmatched,
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_convert_flags() {
        let cli = Cli::parse_from([
            "cadview",
            "convert",
            "box.step",
            "box.glb",
            "--no-draco",
            "-v",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Convert {
                no_draco,
                keep_intermediate,
                ..
            } => {
                assert!(no_draco);
                assert!(!keep_intermediate);
            }
            _ => panic!("expected convert"),
        }
    }

    #[test]
    fn test_convert_colors_flag() {
        let cli = Cli::parse_from(["cadview", "convert", "a.usdz", "a.glb", "--colors", "a.json"]);
        match cli.command {
            Commands::Convert { colors, no_draco, .. } => {
                assert_eq!(colors.as_deref(), Some(Path::new("a.json")));
                assert!(!no_draco);
            }
            _ => panic!("expected convert"),
        }
    }

    #[test]
    fn test_dump_parts_output_flag() {
        let cli = Cli::parse_from(["cadview", "dump-parts", "model.glb", "-o", "out.json"]);
        assert!(matches!(
            cli.command,
            Commands::DumpParts { output: Some(ref o), .. } if o == Path::new("out.json")
        ));
    }
}
