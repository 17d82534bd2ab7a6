//! Core primitives for multiscale fibre-mask fusion, density heat-maps and
//! gap statistics.
//!
//! # Overview
//!
//! This crate exposes the deterministic numeric part of the TWOMBLI
//! pipeline, expressed over raw row-major buffers so it stays independent of
//! any image codec:
//!
//! - [`scale`] – per-line-width detector parameters (smoothing width and the
//!   two hysteresis thresholds) derived from the line profile model.
//! - [`fusion`] – sweep of a single-scale [`fusion::RidgeDetector`] over a
//!   line-width range, OR-ing every scale into one fused [`BinaryMask`].
//! - [`density`] – 8-bit conversions, display-range lookup tables,
//!   saturated contrast stretching and the density heat-map pipeline.
//! - [`gaps`] – mean, population standard deviation and nearest-rank
//!   percentiles over measured gap areas, plus their text forms.
//!
//! The ridge detector itself is a capability supplied by the caller; this
//! crate only decides how it is parameterized and how its outputs combine.
//!
//! # Features
//!
//! - `rayon` – parallelizes the per-pixel mask union. Results are identical
//!   to the serial path.
//! - `tracing` – instruments the fusion sweep with `tracing` spans and emits
//!   per-scale debug events.

pub mod density;
pub mod error;
pub mod fusion;
pub mod gaps;
pub mod mask;
pub mod scale;

pub use crate::error::{FusionError, GapError, OperationError, ShapeMismatch};
pub use crate::fusion::{fuse_multiscale, FusionParams, RidgeDetector, RidgeRequest};
pub use crate::gaps::{GapSummary, GapSummaryRow};
pub use crate::mask::BinaryMask;
pub use crate::scale::{ScaleParameters, HIGH_CONTRAST, LOW_CONTRAST};
