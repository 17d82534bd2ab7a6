//! The per-image pipeline.
//!
//! Order follows the analysis: density heat-map first, then the fused ridge
//! mask, then morphometrics, coherence and gap statistics on that mask.
//! Every artifact lands in the [`OutputLayout`]; the returned
//! [`PerImageResult`] carries what the summaries need.

use crate::aggregate::PerImageResult;
use crate::error::UnitError;
use crate::image::{density_base, gap_overlay, load_source, mask_image, ridge_base, save_png};
use crate::layout::{file_prefix, OutputLayout};
use crate::ops::{MorphometricSettings, Operations};
use crate::params::TwombliParams;
use std::fs;
use std::path::Path;
use tracing::{debug, instrument, warn};
use twombli_core::density::density_map_in_place;
use twombli_core::gaps::{area_lines, sorted_areas, summarize_sorted};
use twombli_core::{fuse_multiscale, BinaryMask, GapError, GapSummaryRow};

/// Prefix used for artifacts of `input`.
pub fn input_prefix(input: &Path) -> String {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    file_prefix(&name).to_string()
}

/// Run every analysis on one image and write its artifacts.
///
/// The output directories must already exist (see
/// [`OutputLayout::prepare`]). An empty gap set is not an error: the gap
/// row and gap tables are left out and the result is still complete.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn run_image(
    input: &Path,
    params: &TwombliParams,
    layout: &OutputLayout,
    ops: &Operations,
) -> Result<PerImageResult, UnitError> {
    let prefix = input_prefix(input);
    let source = load_source(input)?;
    let (w, h) = (source.width() as usize, source.height() as usize);

    // density heat-map
    let mut heat_img = density_base(&source);
    density_map_in_place(&mut heat_img, &params.density_params());
    save_png(&heat_img, &layout.hdm_png(&prefix))?;
    let hdm_table = ops.density.quantify(heat_img.as_raw(), w, h)?;
    write_text(&layout.hdm_csv(&prefix), &hdm_table.to_csv())?;
    let hdm_value = hdm_table
        .last_field()
        .ok_or(UnitError::EmptyTable {
            what: "density quantification",
        })?
        .trim()
        .to_string();

    // fused ridge mask
    let ridge = ridge_base(&source, params.contrast_saturation);
    let fused = fuse_multiscale(
        ridge.as_raw(),
        w,
        h,
        &params.fusion_params(),
        &*ops.ridge,
    )?;
    save_png(&mask_image(&fused), &layout.mask_png(&prefix))?;
    debug!(foreground = fused.count(), "fused mask written");

    // morphometrics
    let windows = params.curvature_windows();
    let settings = MorphometricSettings {
        prefix: &prefix,
        properties_file: params.anamorf_properties_file.as_deref(),
        curvature_windows: &windows,
        minimum_branch_length: params.minimum_branch_length,
    };
    let morph_table = ops.morphometrics.analyze(&fused, &settings)?;
    write_text(&layout.morphometrics_csv(&prefix), &morph_table.to_csv())?;
    let morphometric_row = morph_table
        .last_row()
        .ok_or(UnitError::EmptyTable {
            what: "morphometric analysis",
        })?
        .to_string();

    // alignment
    let coherence = ops
        .coherence
        .analyze(&fused, &format!("{prefix}_masks.png"))?;

    let gap_summary_row = if params.perform_gap_analysis {
        gap_analysis(&fused, &prefix, params, layout, ops)?
    } else {
        None
    };

    Ok(PerImageResult {
        file_prefix: prefix,
        alignment: coherence.alignment,
        dimension: w * h,
        morphometric_row,
        hdm_value,
        gap_summary_row,
    })
}

fn gap_analysis(
    fused: &BinaryMask,
    prefix: &str,
    params: &TwombliParams,
    layout: &OutputLayout,
    ops: &Operations,
) -> Result<Option<String>, UnitError> {
    let mut mask = fused.clone();
    mask.clear_border();
    let regions = ops.gaps.detect(&mask, params.minimum_gap_diameter)?;
    save_png(&gap_overlay(&mask, &regions), &layout.gap_png(prefix))?;

    let areas: Vec<f64> = regions.iter().map(|r| r.area).collect();
    let sorted = sorted_areas(&areas).map_err(UnitError::Gaps)?;
    let summary = match summarize_sorted(&sorted) {
        Ok(summary) => summary,
        Err(GapError::EmptyGapSet) => {
            warn!(prefix, "no gaps detected, gap statistics skipped");
            return Ok(None);
        }
        Err(e) => return Err(UnitError::Gaps(e)),
    };

    let row = GapSummaryRow::new(prefix, summary).to_string();
    write_text(&layout.gaps_csv(prefix), &row)?;
    write_text(&layout.area_arrays_csv(prefix), &area_lines(&sorted))?;
    debug!(gaps = sorted.len(), "gap statistics written");
    Ok(Some(row))
}

fn write_text(path: &Path, text: &str) -> Result<(), UnitError> {
    fs::write(path, text).map_err(|source| UnitError::Io {
        path: path.to_path_buf(),
        source,
    })
}
