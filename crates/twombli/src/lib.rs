//! Fibre-network quantification for 2D microscopy images.
//!
//! Wraps [`twombli_core`] with image decoding, the capability traits for the
//! external analyses, the per-image pipeline and the batch runner:
//!
//! - [`runner::run_image`] produces the fused fibre mask, density heat-map,
//!   morphometric row, alignment and gap statistics of one image and writes
//!   every artifact.
//! - [`batch::run_batch`] runs many images on a worker pool and appends their
//!   rows to `twombli_summary.csv` and `gaps_summary.csv` in input order.
//! - [`ops`] declares the capabilities; [`builtin`] implements them.

pub mod aggregate;
pub mod app;
pub mod batch;
pub mod builtin;
pub mod error;
pub mod image;
pub mod layout;
pub mod ops;
pub mod params;
pub mod runner;

pub use twombli_core::*;

pub use crate::aggregate::{PerImageResult, RunAggregator, SummarySink, UnitOutcome};
pub use crate::batch::{run_batch, BatchReport, RunContext};
pub use crate::error::{AggregateError, BatchError, ConfigError, UnitError};
pub use crate::ops::Operations;
pub use crate::params::{ParamOverrides, TwombliParams};
pub use crate::runner::run_image;

use ::image::GrayImage;

/// Fused multiscale mask of an 8-bit image.
pub fn fuse_multiscale_image<D: RidgeDetector + ?Sized>(
    img: &GrayImage,
    params: &FusionParams,
    detector: &D,
) -> Result<BinaryMask, FusionError> {
    fuse_multiscale(
        img.as_raw(),
        img.width() as usize,
        img.height() as usize,
        params,
        detector,
    )
}

/// Density heat-map of an 8-bit image.
pub fn density_map_image(img: &GrayImage, params: &density::DensityParams) -> GrayImage {
    let mut out = img.clone();
    density::density_map_in_place(&mut out, params);
    out
}
