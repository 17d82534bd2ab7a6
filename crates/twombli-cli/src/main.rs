//! twombli CLI: batch and single-image fibre network quantification.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use twombli::app::{load_config, run_from_config, run_single, scale_table, BatchConfig};
use twombli::batch::error_chain;
use twombli::ParamOverrides;

#[derive(Parser)]
#[command(name = "twombli")]
#[command(about = "Quantify fibre networks in microscopy images (masks, alignment, density, gaps)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every image of a directory and write the summary tables.
    Batch {
        /// Directory of input images (png, tif, tiff).
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output directory; must be empty or absent.
        #[arg(long)]
        output: Option<PathBuf>,

        /// JSON config with run settings and analysis parameters.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Worker threads (default: one per logical CPU).
        #[arg(long)]
        threads: Option<usize>,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Process a single image and write its artifacts.
    Run {
        /// Path to the input image.
        #[arg(long)]
        image: PathBuf,

        /// Output directory.
        #[arg(long)]
        output: PathBuf,

        /// JSON config; only the analysis parameters are used.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Print the ridge detector parameters of each line width as JSON.
    Scales {
        #[arg(long, default_value = "5")]
        min: u32,

        #[arg(long, default_value = "20")]
        max: u32,

        /// Fibres darker than the background.
        #[arg(long)]
        dark_lines: bool,
    },
}

#[derive(Debug, Clone, Default, Args)]
struct ParamArgs {
    /// Smallest fibre width in pixels.
    #[arg(long)]
    minimum_line_width: Option<u32>,

    /// Largest fibre width in pixels.
    #[arg(long)]
    maximum_line_width: Option<u32>,

    /// Fibres darker than the background.
    #[arg(long, conflicts_with = "bright_lines")]
    dark_lines: bool,

    /// Fibres brighter than the background (overrides a config's darkLines).
    #[arg(long)]
    bright_lines: bool,

    /// Shortest fibre segment kept in the mask.
    #[arg(long)]
    minimum_branch_length: Option<u32>,

    /// Settings file passed to the morphometric analyzer.
    #[arg(long)]
    anamorf_properties_file: Option<PathBuf>,

    #[arg(long)]
    minimum_curvature_window: Option<u32>,

    #[arg(long)]
    curvature_window_step_size: Option<u32>,

    #[arg(long)]
    maximum_curvature_window: Option<u32>,

    /// Display maximum of the density heat-map (0-255).
    #[arg(long = "maximum-display-hdm")]
    maximum_display_hdm: Option<u32>,

    /// Percent of saturated pixels for contrast enhancement.
    #[arg(long)]
    contrast_saturation: Option<f64>,

    /// Enable gap analysis (overrides a config's performGapAnalysis).
    #[arg(long, conflicts_with = "no_gap_analysis")]
    gap_analysis: bool,

    /// Disable gap analysis.
    #[arg(long)]
    no_gap_analysis: bool,

    /// Smallest gap diameter in pixels.
    #[arg(long)]
    minimum_gap_diameter: Option<u32>,
}

impl From<ParamArgs> for ParamOverrides {
    fn from(a: ParamArgs) -> Self {
        Self {
            minimum_line_width: a.minimum_line_width,
            maximum_line_width: a.maximum_line_width,
            dark_lines: flag_pair(a.dark_lines, a.bright_lines),
            minimum_branch_length: a.minimum_branch_length,
            anamorf_properties_file: a.anamorf_properties_file,
            minimum_curvature_window: a.minimum_curvature_window,
            curvature_window_step_size: a.curvature_window_step_size,
            maximum_curvature_window: a.maximum_curvature_window,
            maximum_display_hdm: a.maximum_display_hdm,
            contrast_saturation: a.contrast_saturation,
            perform_gap_analysis: flag_pair(a.gap_analysis, a.no_gap_analysis),
            minimum_gap_diameter: a.minimum_gap_diameter,
        }
    }
}

/// `Some(true)` for `--x`, `Some(false)` for its negation, `None` when
/// neither was given.
fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

fn init_tracing(config_level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_level.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn config_or_default(path: Option<&PathBuf>) -> Result<BatchConfig> {
    match path {
        Some(p) => load_config(p),
        None => Ok(BatchConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Batch {
            input,
            output,
            config,
            threads,
            params,
        } => {
            let mut cfg = config_or_default(config.as_ref())?;
            init_tracing(cfg.log_level.as_deref());
            if input.is_some() {
                cfg.input = input;
            }
            if output.is_some() {
                cfg.output = output;
            }
            if threads.is_some() {
                cfg.threads = threads;
            }
            cfg.params.apply_overrides(&params.into());
            tracing::debug!(config = ?cfg, "effective configuration");

            let report = run_from_config(cfg)?;
            for failure in &report.failures {
                eprintln!(
                    "failed: {} ({})",
                    failure.input.display(),
                    error_chain(&failure.error)
                );
            }
            println!(
                "processed {}/{} images in {:.1}s",
                report.completed,
                report.total,
                report.elapsed.as_secs_f64()
            );
            if !report.all_succeeded() {
                bail!("{} of {} images failed", report.failures.len(), report.total);
            }
        }
        Commands::Run {
            image,
            output,
            config,
            params,
        } => {
            let mut cfg = config_or_default(config.as_ref())?;
            init_tracing(cfg.log_level.as_deref());
            cfg.params.apply_overrides(&params.into());
            let result = run_single(&image, &output, &cfg.params)?;
            println!("{}", result.summary_row());
            if let Some(row) = &result.gap_summary_row {
                println!("{row}");
            }
        }
        Commands::Scales {
            min,
            max,
            dark_lines,
        } => {
            init_tracing(None);
            let table = scale_table(min, max, dark_lines)?;
            let json = serde_json::to_string_pretty(&table).context("serializing scales")?;
            println!("{json}");
        }
    }

    Ok(())
}
