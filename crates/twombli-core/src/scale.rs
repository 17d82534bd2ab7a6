//! Scale-space parameters for a single ridge-detection pass.
//!
//! A line of width `w` is modelled as a bar profile of half-width `h = w/2`.
//! The smoothing width that makes such a bar separable is
//! `sigma = w / (2·√3) + 0.5`, and the second-derivative response of the
//! smoothed bar at its centre, scaled by a contrast limit, gives the
//! detector's hysteresis thresholds.

use std::f64::consts::PI;

/// Upper contrast limit, in byte intensity units, for bright lines.
pub const HIGH_CONTRAST: f64 = 120.0;
/// Lower contrast limit, in byte intensity units, for bright lines.
pub const LOW_CONTRAST: f64 = 0.0;

const THRESHOLD_SCALE: f64 = 0.17;
const BYTE_MAX: f64 = 255.0;

/// Detector parameters for one line width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleParameters {
    pub line_width: u32,
    pub sigma: f64,
    pub lower_threshold: f64,
    pub upper_threshold: f64,
}

impl ScaleParameters {
    /// Derive the parameters for `line_width` (expected to be `>= 1`).
    pub fn for_line_width(line_width: u32, dark_lines: bool) -> Self {
        let sigma = sigma(line_width);
        let (lower_limit, upper_limit) = threshold_limits(dark_lines);
        Self {
            line_width,
            sigma,
            lower_threshold: threshold(line_width, sigma, lower_limit),
            upper_threshold: threshold(line_width, sigma, upper_limit),
        }
    }
}

/// Gaussian smoothing width for a line of `line_width` pixels.
#[inline]
pub fn sigma(line_width: u32) -> f64 {
    line_width as f64 / (2.0 * 3.0_f64.sqrt()) + 0.5
}

/// Contrast limits `(lower, upper)` feeding [`threshold`].
///
/// Dark lines mirror the bright-line limits around the byte maximum.
#[inline]
pub fn threshold_limits(dark_lines: bool) -> (f64, f64) {
    if dark_lines {
        (BYTE_MAX - HIGH_CONTRAST, BYTE_MAX - LOW_CONTRAST)
    } else {
        (LOW_CONTRAST, HIGH_CONTRAST)
    }
}

/// Hysteresis threshold for a contrast `limit`.
///
/// The magnitude is floored before scaling, so thresholds move in steps of
/// `0.17`. Evaluation order is fixed to keep results bit-reproducible.
pub fn threshold(line_width: u32, sigma: f64, limit: f64) -> f64 {
    let half_width = line_width as f64 / 2.0;
    let response = -2.0 * limit * half_width / ((2.0 * PI).sqrt() * sigma * sigma * sigma)
        * (-(half_width * half_width) / (2.0 * sigma * sigma)).exp();
    THRESHOLD_SCALE * response.abs().floor()
}

/// Parameters for every width in `min..=max`, in ascending order.
pub fn sweep(min: u32, max: u32, dark_lines: bool) -> impl Iterator<Item = ScaleParameters> {
    (min..=max).map(move |w| ScaleParameters::for_line_width(w, dark_lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigma_follows_bar_profile_model() {
        for w in 1..=64u32 {
            let expected = w as f64 / (2.0 * 3.0_f64.sqrt()) + 0.5;
            assert_eq!(sigma(w), expected);
        }
    }

    #[test]
    fn sigma_increases_with_line_width() {
        let values: Vec<f64> = (1..=40).map(sigma).collect();
        assert!(values.windows(2).all(|p| p[1] > p[0]));
    }

    #[test]
    fn bright_lower_threshold_is_zero() {
        for w in 1..=30 {
            let p = ScaleParameters::for_line_width(w, false);
            assert_eq!(p.lower_threshold, 0.0);
            assert!(p.upper_threshold >= p.lower_threshold);
        }
    }

    #[test]
    fn dark_lines_raise_both_limits() {
        let bright = ScaleParameters::for_line_width(5, false);
        let dark = ScaleParameters::for_line_width(5, true);
        assert_eq!(bright.sigma, dark.sigma);
        assert!(dark.lower_threshold > bright.lower_threshold);
        assert!(dark.upper_threshold > bright.upper_threshold);
    }

    #[test]
    fn thresholds_are_multiples_of_scale_step() {
        for w in 1..=25 {
            let p = ScaleParameters::for_line_width(w, true);
            for t in [p.lower_threshold, p.upper_threshold] {
                let steps = t / THRESHOLD_SCALE;
                assert!((steps - steps.round()).abs() < 1e-9, "w={w} t={t}");
            }
        }
    }

    #[test]
    fn sweep_is_inclusive_and_ordered() {
        let widths: Vec<u32> = sweep(3, 7, false).map(|p| p.line_width).collect();
        assert_eq!(widths, vec![3, 4, 5, 6, 7]);
        assert_eq!(sweep(4, 4, false).count(), 1);
    }
}
