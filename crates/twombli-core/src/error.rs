//! Error types shared by the core primitives.

use thiserror::Error;

/// Failure reported by a capability the pipeline invokes but does not
/// implement (ridge detection, coherence, morphometrics, gap detection,
/// density quantification).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {reason}")]
pub struct OperationError {
    /// Short name of the operation, e.g. `"ridge detection"`.
    pub operation: String,
    pub reason: String,
}

impl OperationError {
    pub fn new(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Two masks (or a mask and an image plane) disagree on dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("mask is {got_w}x{got_h}, expected {w}x{h}")]
pub struct ShapeMismatch {
    pub w: usize,
    pub h: usize,
    pub got_w: usize,
    pub got_h: usize,
}

/// Errors raised while building a fused multiscale mask.
#[derive(Debug, Error)]
pub enum FusionError {
    #[error("line width must be at least 1")]
    ZeroLineWidth,

    #[error("maximum line width {max} is below minimum line width {min}")]
    InvalidRange { min: u32, max: u32 },

    #[error("image plane holds {len} bytes, expected {w}x{h}")]
    PlaneSize { len: usize, w: usize, h: usize },

    #[error("ridge detection at line width {line_width} failed")]
    Detector {
        line_width: u32,
        #[source]
        source: OperationError,
    },

    #[error("ridge detection at line width {line_width} returned a mask of the wrong size")]
    Shape {
        line_width: u32,
        #[source]
        source: ShapeMismatch,
    },
}

/// Errors raised by gap statistics and their text forms.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GapError {
    /// No gap regions were measured, so no statistic is defined.
    #[error("empty gap set")]
    EmptyGapSet,

    #[error("gap area #{index} is not a finite non-negative value: {value}")]
    InvalidArea { index: usize, value: f64 },

    #[error("malformed gap summary row '{0}'")]
    MalformedRow(String),
}
