//! Greedy maximal inscribed circles in the background of a mask.

use crate::ops::{GapDetector, GapRegion};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::PI;
use twombli_core::{BinaryMask, OperationError};

/// Fills the background with non-overlapping circles, largest first.
///
/// Each step places the largest circle that fits between fibres, the image
/// border and the circles already placed. Placement stops once the largest
/// remaining radius drops below `max(minimum_diameter / 2, 1)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct InscribedCircleGaps;

impl GapDetector for InscribedCircleGaps {
    fn detect(
        &self,
        mask: &BinaryMask,
        minimum_diameter: u32,
    ) -> Result<Vec<GapRegion>, OperationError> {
        let (w, h) = (mask.w, mask.h);
        if w == 0 || h == 0 {
            return Ok(Vec::new());
        }
        let min_radius = (minimum_diameter as f64 / 2.0).max(1.0);

        let edt = distance_transform(mask);
        let mut avail: Vec<f64> = (0..w * h)
            .map(|i| {
                let (x, y) = ((i % w) as f64, (i / w) as f64);
                let border = (x + 1.0).min(y + 1.0).min(w as f64 - x).min(h as f64 - y);
                edt[i].min(border)
            })
            .collect();

        let mut heap: BinaryHeap<Candidate> = avail
            .iter()
            .enumerate()
            .filter(|&(_, &r)| r >= min_radius)
            .map(|(idx, &radius)| Candidate { radius, idx })
            .collect();

        let mut regions = Vec::new();
        while let Some(Candidate { radius: key, idx }) = heap.pop() {
            let radius = avail[idx];
            if radius < key {
                if radius >= min_radius {
                    heap.push(Candidate { radius, idx });
                }
                continue;
            }

            let (cx, cy) = ((idx % w) as f64, (idx / w) as f64);
            regions.push(GapRegion {
                x: cx,
                y: cy,
                radius,
                area: PI * radius * radius,
            });

            // Remaining keys are at most `key`, so only pixels closer than
            // `radius + key` can be constrained by the new circle.
            let reach = radius + key;
            let x0 = (cx - reach).floor().max(0.0) as usize;
            let y0 = (cy - reach).floor().max(0.0) as usize;
            let x1 = ((cx + reach).ceil() as usize).min(w - 1);
            let y1 = ((cy + reach).ceil() as usize).min(h - 1);
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let d = (x as f64 - cx).hypot(y as f64 - cy);
                    let slot = &mut avail[y * w + x];
                    *slot = slot.min((d - radius).max(0.0));
                }
            }
        }
        Ok(regions)
    }
}

/// Max-heap entry ordered by radius, ties broken towards the lower index.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    radius: f64,
    idx: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.radius
            .total_cmp(&other.radius)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

/// Exact Euclidean distance from every pixel to the nearest foreground
/// pixel; foreground pixels get 0. Without foreground every value is
/// infinite.
pub fn distance_transform(mask: &BinaryMask) -> Vec<f64> {
    let (w, h) = (mask.w, mask.h);
    let mut grid: Vec<f64> = mask
        .data()
        .iter()
        .map(|&v| if v != 0 { 0.0 } else { f64::INFINITY })
        .collect();

    let mut line = Vec::with_capacity(w.max(h));
    let mut out = Vec::with_capacity(w.max(h));
    for x in 0..w {
        line.clear();
        line.extend((0..h).map(|y| grid[y * w + x]));
        squared_distance_1d(&line, &mut out);
        for (y, &v) in out.iter().enumerate() {
            grid[y * w + x] = v;
        }
    }
    for y in 0..h {
        line.clear();
        line.extend_from_slice(&grid[y * w..(y + 1) * w]);
        squared_distance_1d(&line, &mut out);
        grid[y * w..(y + 1) * w].copy_from_slice(&out);
    }
    for v in &mut grid {
        *v = v.sqrt();
    }
    grid
}

/// Lower envelope of parabolas rooted at each sample of `f`.
fn squared_distance_1d(f: &[f64], out: &mut Vec<f64>) {
    let n = f.len();
    out.clear();
    out.resize(n, f64::INFINITY);
    let mut v = vec![0usize; n];
    let mut z = vec![0.0f64; n + 1];
    let mut k: usize = 0;
    let mut any = false;

    for q in 0..n {
        if !f[q].is_finite() {
            continue;
        }
        if !any {
            any = true;
            v[0] = q;
            z[0] = f64::NEG_INFINITY;
            z[1] = f64::INFINITY;
            continue;
        }
        let qf = q as f64;
        loop {
            let p = v[k] as f64;
            let s = ((f[q] + qf * qf) - (f[v[k]] + p * p)) / (2.0 * qf - 2.0 * p);
            if k > 0 && s <= z[k] {
                k -= 1;
                continue;
            }
            k += 1;
            v[k] = q;
            z[k] = s;
            z[k + 1] = f64::INFINITY;
            break;
        }
    }
    if !any {
        return;
    }

    k = 0;
    for (q, slot) in out.iter_mut().enumerate() {
        let qf = q as f64;
        while z[k + 1] < qf {
            k += 1;
        }
        let d = qf - v[k] as f64;
        *slot = d * d + f[v[k]];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn distance_to_single_point() {
        let mask = BinaryMask::from_fn(7, 5, |x, y| x == 3 && y == 2);
        let d = distance_transform(&mask);
        assert_eq!(d[2 * 7 + 3], 0.0);
        assert_relative_eq!(d[0], 13f64.sqrt());
        assert_relative_eq!(d[2 * 7 + 6], 3.0);
    }

    #[test]
    fn distance_matches_brute_force() {
        let mask = BinaryMask::from_fn(13, 9, |x, y| (x * 7 + y * 3) % 11 == 0);
        let d = distance_transform(&mask);
        for y in 0..9 {
            for x in 0..13 {
                let mut best = f64::INFINITY;
                for fy in 0..9 {
                    for fx in 0..13 {
                        if mask.at(fx, fy) {
                            let dd = (x as f64 - fx as f64).hypot(y as f64 - fy as f64);
                            best = best.min(dd);
                        }
                    }
                }
                assert_relative_eq!(d[y * 13 + x], best, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn circles_never_overlap_fibres_or_each_other() {
        let mask = BinaryMask::from_fn(40, 30, |x, y| x == 20 || y == 15);
        let regions = InscribedCircleGaps.detect(&mask, 0).unwrap();
        assert!(!regions.is_empty());
        for (i, a) in regions.iter().enumerate() {
            assert!(a.radius >= 1.0);
            assert_relative_eq!(a.area, PI * a.radius * a.radius);
            assert!(!mask.at(a.x as usize, a.y as usize));
            for b in &regions[i + 1..] {
                let d = (a.x - b.x).hypot(a.y - b.y);
                assert!(d + 1e-9 >= a.radius + b.radius, "{a:?} {b:?}");
            }
        }
        // largest first
        assert!(regions.windows(2).all(|p| p[0].radius >= p[1].radius));
    }

    #[test]
    fn minimum_diameter_limits_small_gaps() {
        let mask = BinaryMask::from_fn(40, 40, |x, _| x % 5 == 0);
        assert!(!InscribedCircleGaps.detect(&mask, 0).unwrap().is_empty());
        assert!(InscribedCircleGaps.detect(&mask, 10).unwrap().is_empty());
    }

    #[test]
    fn full_mask_has_no_gaps() {
        let mask = BinaryMask::from_fn(10, 10, |_, _| true);
        assert!(InscribedCircleGaps.detect(&mask, 0).unwrap().is_empty());
    }
}
