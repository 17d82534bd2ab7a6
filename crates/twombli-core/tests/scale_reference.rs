//! Reference values for the per-scale detector parameters.
//!
//! The floored responses were derived by hand from the bar-profile model and
//! pin the evaluation order: changing it shifts some floors by one step.

use approx::assert_relative_eq;
use twombli_core::scale::{sigma, threshold, threshold_limits};
use twombli_core::ScaleParameters;

const STEP: f64 = 0.17;

#[test]
fn sigma_for_default_minimum_width() {
    assert_relative_eq!(sigma(5), 1.9433756729740645, epsilon = 1e-15);
}

#[test]
fn bright_thresholds() {
    // (line width, floored response at the upper limit of 120)
    for (w, floor) in [(1u32, 79.0), (5, 14.0), (10, 4.0), (20, 1.0)] {
        let p = ScaleParameters::for_line_width(w, false);
        assert_eq!(p.lower_threshold, 0.0, "w={w}");
        assert_eq!(p.upper_threshold, STEP * floor, "w={w}");
    }
}

#[test]
fn dark_thresholds() {
    // (line width, floored response at 135, floored response at 255)
    for (w, lower, upper) in [(1u32, 89.0, 169.0), (5, 16.0, 30.0)] {
        let p = ScaleParameters::for_line_width(w, true);
        assert_eq!(p.lower_threshold, STEP * lower, "w={w}");
        assert_eq!(p.upper_threshold, STEP * upper, "w={w}");
    }
}

#[test]
fn threshold_uses_floor_not_round() {
    // the raw response at w=1, limit=120 is about 79.82
    assert_eq!(threshold(1, sigma(1), 120.0), STEP * 79.0);
    assert_eq!(threshold_limits(true), (135.0, 255.0));
    assert_eq!(threshold_limits(false), (0.0, 120.0));
}
