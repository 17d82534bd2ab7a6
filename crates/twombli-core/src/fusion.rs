//! Multiscale ridge-mask fusion.
//!
//! A single-scale ridge detector only responds to lines close to the width
//! it was parameterized for. Fibres in matrix images span a range of widths,
//! so the detector is run once per integer line width in
//! `[minimum_line_width, maximum_line_width]` and the binary outputs are
//! OR-ed together. The fused mask can only gain pixels as scales are added.

use crate::error::{FusionError, OperationError};
use crate::mask::BinaryMask;
use crate::scale::{self, ScaleParameters, HIGH_CONTRAST, LOW_CONTRAST};
#[cfg(feature = "tracing")]
use tracing::{debug, instrument};

/// Everything a single-scale detector needs for one pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RidgeRequest {
    pub scale: ScaleParameters,
    /// Byte-space contrast constant handed to the detector unchanged at
    /// every scale.
    pub high_contrast: f64,
    pub low_contrast: f64,
    pub minimum_branch_length: u32,
    pub dark_lines: bool,
}

/// Single-scale ridge detection on an 8-bit plane.
///
/// Implementations must return a mask with the same dimensions as the input
/// plane.
pub trait RidgeDetector: Send + Sync {
    fn detect(
        &self,
        img: &[u8],
        w: usize,
        h: usize,
        request: &RidgeRequest,
    ) -> Result<BinaryMask, OperationError>;
}

impl<T: RidgeDetector + ?Sized> RidgeDetector for Box<T> {
    fn detect(
        &self,
        img: &[u8],
        w: usize,
        h: usize,
        request: &RidgeRequest,
    ) -> Result<BinaryMask, OperationError> {
        (**self).detect(img, w, h, request)
    }
}

/// Line-width sweep configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FusionParams {
    pub minimum_line_width: u32,
    pub maximum_line_width: u32,
    pub minimum_branch_length: u32,
    pub dark_lines: bool,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            minimum_line_width: 5,
            maximum_line_width: 20,
            minimum_branch_length: 10,
            dark_lines: false,
        }
    }
}

impl FusionParams {
    pub fn validate(&self) -> Result<(), FusionError> {
        if self.minimum_line_width == 0 {
            return Err(FusionError::ZeroLineWidth);
        }
        if self.maximum_line_width < self.minimum_line_width {
            return Err(FusionError::InvalidRange {
                min: self.minimum_line_width,
                max: self.maximum_line_width,
            });
        }
        Ok(())
    }

    /// Detector request for one line width of the sweep.
    pub fn request(&self, line_width: u32) -> RidgeRequest {
        RidgeRequest {
            scale: ScaleParameters::for_line_width(line_width, self.dark_lines),
            high_contrast: HIGH_CONTRAST,
            low_contrast: LOW_CONTRAST,
            minimum_branch_length: self.minimum_branch_length,
            dark_lines: self.dark_lines,
        }
    }

    pub fn scales(&self) -> impl Iterator<Item = ScaleParameters> {
        scale::sweep(
            self.minimum_line_width,
            self.maximum_line_width,
            self.dark_lines,
        )
    }
}

/// Foreground counts recorded after each scale of a sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaleTrace {
    pub line_width: u32,
    /// Foreground pixels in this scale's own mask.
    pub detected: usize,
    /// Foreground pixels in the fused mask after OR-ing this scale in.
    pub fused: usize,
}

/// Fused mask together with its per-scale history.
pub struct FusionTrace {
    pub mask: BinaryMask,
    pub scales: Vec<ScaleTrace>,
}

/// Run the detector across the configured widths and OR the masks.
pub fn fuse_multiscale<D: RidgeDetector + ?Sized>(
    img: &[u8],
    w: usize,
    h: usize,
    params: &FusionParams,
    detector: &D,
) -> Result<BinaryMask, FusionError> {
    fuse_multiscale_with_trace(img, w, h, params, detector).map(|t| t.mask)
}

/// Same as [`fuse_multiscale`], also reporting per-scale foreground counts.
///
/// The first width initializes the fused mask directly, so a sweep with
/// `minimum_line_width == maximum_line_width` returns the detector's mask
/// unchanged. Any detector failure aborts the sweep.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(img, params, detector),
        fields(min = params.minimum_line_width, max = params.maximum_line_width)
    )
)]
pub fn fuse_multiscale_with_trace<D: RidgeDetector + ?Sized>(
    img: &[u8],
    w: usize,
    h: usize,
    params: &FusionParams,
    detector: &D,
) -> Result<FusionTrace, FusionError> {
    params.validate()?;
    if img.len() != w * h {
        return Err(FusionError::PlaneSize {
            len: img.len(),
            w,
            h,
        });
    }

    let detect_at = |line_width: u32| -> Result<BinaryMask, FusionError> {
        let request = params.request(line_width);
        let mask = detector
            .detect(img, w, h, &request)
            .map_err(|source| FusionError::Detector { line_width, source })?;
        mask.check_shape(w, h)
            .map_err(|source| FusionError::Shape { line_width, source })?;
        Ok(mask)
    };

    let first_width = params.minimum_line_width;
    let mut fused = detect_at(first_width)?;
    let first_count = fused.count();
    let mut scales = vec![ScaleTrace {
        line_width: first_width,
        detected: first_count,
        fused: first_count,
    }];

    for line_width in (first_width + 1)..=params.maximum_line_width {
        let mask = detect_at(line_width)?;
        fused
            .union_with(&mask)
            .map_err(|source| FusionError::Shape { line_width, source })?;
        let trace = ScaleTrace {
            line_width,
            detected: mask.count(),
            fused: fused.count(),
        };
        #[cfg(feature = "tracing")]
        debug!(
            line_width,
            detected = trace.detected,
            fused = trace.fused,
            "scale fused"
        );
        scales.push(trace);
    }

    Ok(FusionTrace {
        mask: fused,
        scales,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Marks a vertical band whose width follows the requested line width.
    struct BandDetector;

    impl RidgeDetector for BandDetector {
        fn detect(
            &self,
            _img: &[u8],
            w: usize,
            h: usize,
            request: &RidgeRequest,
        ) -> Result<BinaryMask, OperationError> {
            let lw = request.scale.line_width as usize;
            Ok(BinaryMask::from_fn(w, h, |x, _| x >= lw && x < 2 * lw))
        }
    }

    struct RecordingDetector {
        seen: Mutex<Vec<RidgeRequest>>,
    }

    impl RidgeDetector for RecordingDetector {
        fn detect(
            &self,
            _img: &[u8],
            w: usize,
            h: usize,
            request: &RidgeRequest,
        ) -> Result<BinaryMask, OperationError> {
            self.seen.lock().unwrap().push(*request);
            Ok(BinaryMask::new(w, h))
        }
    }

    struct FailingAt(u32);

    impl RidgeDetector for FailingAt {
        fn detect(
            &self,
            _img: &[u8],
            w: usize,
            h: usize,
            request: &RidgeRequest,
        ) -> Result<BinaryMask, OperationError> {
            if request.scale.line_width == self.0 {
                Err(OperationError::new("ridge detection", "plugin crashed"))
            } else {
                Ok(BinaryMask::new(w, h))
            }
        }
    }

    fn params(min: u32, max: u32) -> FusionParams {
        FusionParams {
            minimum_line_width: min,
            maximum_line_width: max,
            ..FusionParams::default()
        }
    }

    #[test]
    fn single_scale_returns_detector_mask() {
        let img = vec![0u8; 40 * 8];
        let fused = fuse_multiscale(&img, 40, 8, &params(3, 3), &BandDetector).unwrap();
        let direct = BandDetector
            .detect(&img, 40, 8, &params(3, 3).request(3))
            .unwrap();
        assert_eq!(fused, direct);
    }

    #[test]
    fn fused_count_never_decreases() {
        let img = vec![0u8; 40 * 8];
        let trace = fuse_multiscale_with_trace(&img, 40, 8, &params(2, 9), &BandDetector).unwrap();
        assert_eq!(trace.scales.len(), 8);
        assert!(trace.scales.windows(2).all(|p| p[1].fused >= p[0].fused));
        assert_eq!(trace.scales.last().unwrap().fused, trace.mask.count());

        let mut previous = 0;
        for max in 2..=9 {
            let count = fuse_multiscale(&img, 40, 8, &params(2, max), &BandDetector)
                .unwrap()
                .count();
            assert!(count >= previous);
            previous = count;
        }
    }

    #[test]
    fn detector_sees_fixed_contrast_and_per_scale_sigma() {
        let detector = RecordingDetector {
            seen: Mutex::new(Vec::new()),
        };
        let p = FusionParams {
            minimum_line_width: 4,
            maximum_line_width: 6,
            minimum_branch_length: 12,
            dark_lines: true,
        };
        fuse_multiscale(&[0u8; 16], 4, 4, &p, &detector).unwrap();

        let seen = detector.seen.into_inner().unwrap();
        let widths: Vec<u32> = seen.iter().map(|r| r.scale.line_width).collect();
        assert_eq!(widths, vec![4, 5, 6]);
        for r in &seen {
            assert_eq!(r.high_contrast, 120.0);
            assert_eq!(r.low_contrast, 0.0);
            assert_eq!(r.minimum_branch_length, 12);
            assert!(r.dark_lines);
            assert_eq!(r.scale, ScaleParameters::for_line_width(r.scale.line_width, true));
        }
    }

    #[test]
    fn detector_failure_aborts_sweep() {
        let err = fuse_multiscale(&[0u8; 16], 4, 4, &params(2, 5), &FailingAt(4)).unwrap_err();
        assert!(matches!(err, FusionError::Detector { line_width: 4, .. }));
    }

    #[test]
    fn invalid_ranges_are_rejected_before_detection() {
        let detector = RecordingDetector {
            seen: Mutex::new(Vec::new()),
        };
        let err = fuse_multiscale(&[0u8; 16], 4, 4, &params(6, 5), &detector).unwrap_err();
        assert!(matches!(err, FusionError::InvalidRange { min: 6, max: 5 }));
        let err = fuse_multiscale(&[0u8; 16], 4, 4, &params(0, 5), &detector).unwrap_err();
        assert!(matches!(err, FusionError::ZeroLineWidth));
        assert!(detector.seen.into_inner().unwrap().is_empty());
    }

    #[test]
    fn wrong_sized_detector_output_is_an_error() {
        struct Shrinking;
        impl RidgeDetector for Shrinking {
            fn detect(
                &self,
                _img: &[u8],
                w: usize,
                h: usize,
                _request: &RidgeRequest,
            ) -> Result<BinaryMask, OperationError> {
                Ok(BinaryMask::new(w - 1, h))
            }
        }
        let err = fuse_multiscale(&[0u8; 16], 4, 4, &params(1, 1), &Shrinking).unwrap_err();
        assert!(matches!(err, FusionError::Shape { line_width: 1, .. }));
    }
}
