//! Shared application-level helpers for the CLI.
//!
//! These functions wire configuration files, output directories and JSON
//! dumps around the batch and per-image APIs.

use crate::aggregate::PerImageResult;
use crate::batch::{run_batch, BatchReport};
use crate::layout::OutputLayout;
use crate::ops::Operations;
use crate::params::TwombliParams;
use crate::runner::run_image;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs::File, path::Path, path::PathBuf};
use twombli_core::FusionParams;

/// Batch configuration file: run settings plus every analysis parameter at
/// the top level.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfig {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub threads: Option<usize>,
    pub log_level: Option<String>,
    #[serde(flatten)]
    pub params: TwombliParams,
}

pub fn load_config(path: &Path) -> Result<BatchConfig> {
    let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
    let cfg: BatchConfig = serde_json::from_reader(file)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}

pub fn run_from_config(cfg: BatchConfig) -> Result<BatchReport> {
    let input = cfg.input.context("no input directory configured")?;
    let output = cfg.output.context("no output directory configured")?;
    cfg.params.validate().context("invalid parameters")?;
    let report = run_batch(&input, &output, cfg.params, Operations::builtin(), cfg.threads)
        .with_context(|| format!("batch {} -> {}", input.display(), output.display()))?;
    Ok(report)
}

/// Process one image into `output` without summaries or the emptiness
/// check.
pub fn run_single(image: &Path, output: &Path, params: &TwombliParams) -> Result<PerImageResult> {
    params.validate().context("invalid parameters")?;
    let layout = OutputLayout::new(output);
    layout
        .prepare()
        .with_context(|| format!("preparing output directory {}", output.display()))?;
    let result = run_image(image, params, &layout, &Operations::builtin())
        .with_context(|| format!("processing {}", image.display()))?;
    Ok(result)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleOut {
    pub line_width: u32,
    pub sigma: f64,
    pub lower_threshold: f64,
    pub upper_threshold: f64,
}

/// Detector parameters for every width in `min..=max`.
pub fn scale_table(min: u32, max: u32, dark_lines: bool) -> Result<Vec<ScaleOut>> {
    let fusion = FusionParams {
        minimum_line_width: min,
        maximum_line_width: max,
        dark_lines,
        ..FusionParams::default()
    };
    fusion.validate()?;
    Ok(fusion
        .scales()
        .map(|s| ScaleOut {
            line_width: s.line_width,
            sigma: s.sigma,
            lower_threshold: s.lower_threshold,
            upper_threshold: s.upper_threshold,
        })
        .collect())
}
