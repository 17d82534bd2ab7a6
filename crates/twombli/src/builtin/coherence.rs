use crate::ops::{Coherence, CoherenceAnalyzer};
use twombli_core::{BinaryMask, OperationError};

/// Global structure-tensor coherency of the mask, in percent.
///
/// Gradients are central differences of the 0/1 mask. With the summed
/// tensor entries `Jxx`, `Jyy`, `Jxy` the coherency is
/// `sqrt((Jyy − Jxx)² + 4·Jxy²) / (Jxx + Jyy)`: 1 when every edge shares one
/// orientation, 0 for isotropic structure or an empty mask.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructureTensorCoherence;

impl CoherenceAnalyzer for StructureTensorCoherence {
    fn analyze(&self, mask: &BinaryMask, title: &str) -> Result<Coherence, OperationError> {
        let (w, h) = (mask.w, mask.h);
        let data = mask.data();
        let (mut jxx, mut jyy, mut jxy) = (0.0f64, 0.0f64, 0.0f64);
        for y in 1..h.saturating_sub(1) {
            for x in 1..w.saturating_sub(1) {
                let i = y * w + x;
                let gx = (data[i + 1] as f64 - data[i - 1] as f64) * 0.5;
                let gy = (data[i + w] as f64 - data[i - w] as f64) * 0.5;
                jxx += gx * gx;
                jyy += gy * gy;
                jxy += gx * gy;
            }
        }

        let trace = jxx + jyy;
        let alignment = if trace > f64::EPSILON {
            let c = ((jyy - jxx).powi(2) + 4.0 * jxy * jxy).sqrt() / trace;
            (100.0 * c).clamp(0.0, 100.0)
        } else {
            0.0
        };
        Ok(Coherence {
            alignment,
            title: format!("Dominant Direction of {title}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_lines_are_fully_aligned() {
        let mask = BinaryMask::from_fn(32, 32, |x, _| x % 6 == 0);
        let c = StructureTensorCoherence.analyze(&mask, "m").unwrap();
        assert!((c.alignment - 100.0).abs() < 1e-9);
        assert_eq!(c.title, "Dominant Direction of m");
    }

    #[test]
    fn crossing_grid_is_isotropic() {
        let mask = BinaryMask::from_fn(32, 32, |x, y| x % 8 == 4 || y % 8 == 4);
        let c = StructureTensorCoherence.analyze(&mask, "grid").unwrap();
        assert!(c.alignment < 1.0, "alignment {}", c.alignment);
    }

    #[test]
    fn empty_mask_scores_zero() {
        let c = StructureTensorCoherence
            .analyze(&BinaryMask::new(16, 16), "empty")
            .unwrap();
        assert_eq!(c.alignment, 0.0);
    }
}
