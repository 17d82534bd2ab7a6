use super::neighbours;
use crate::ops::{MorphometricAnalyzer, MorphometricSettings, ResultsTable};
use twombli_core::{BinaryMask, OperationError};

const HEADER: &str =
    "Image,Curvature Window,Total Length,End Points,Branch Points,Area Fraction,Mean Curvature";

/// Skeleton statistics, one row per curvature window.
///
/// The mask is thinned to a one-pixel skeleton; end points have exactly one
/// skeleton neighbour and branch points three or more. The skeleton is split
/// into branches at those points, and the curvature column is the mean
/// turning angle in degrees between chords spanning half a window on either
/// side of each branch pixel. The properties file in the settings is not
/// consulted.
#[derive(Clone, Copy, Debug, Default)]
pub struct SkeletonMorphometrics;

impl MorphometricAnalyzer for SkeletonMorphometrics {
    fn analyze(
        &self,
        mask: &BinaryMask,
        settings: &MorphometricSettings<'_>,
    ) -> Result<ResultsTable, OperationError> {
        if settings.curvature_windows.is_empty() {
            return Err(OperationError::new(
                "morphometric analysis",
                "no curvature windows requested",
            ));
        }
        let (w, h) = (mask.w, mask.h);
        let skeleton = skeletonize(mask);
        let sk = skeleton.data();

        let mut length = 0usize;
        let mut ends = 0usize;
        let mut branch_points = 0usize;
        for y in 0..h {
            for x in 0..w {
                if sk[y * w + x] == 0 {
                    continue;
                }
                length += 1;
                match neighbours(sk, w, h, x, y).count() {
                    1 => ends += 1,
                    n if n >= 3 => branch_points += 1,
                    _ => {}
                }
            }
        }
        let total = (w * h).max(1) as f64;
        let area_fraction = mask.count() as f64 / total;
        let paths = trace_branches(sk, w, h);

        let mut table = ResultsTable::new(HEADER);
        for &window in settings.curvature_windows {
            let curvature = mean_curvature(&paths, window);
            table.push(format!(
                "{},{window},{length},{ends},{branch_points},{area_fraction},{curvature}",
                settings.prefix
            ));
        }
        Ok(table)
    }
}

/// Ordered pixel paths between end and branch points of a skeleton.
///
/// Closed loops without such points are traced from an arbitrary pixel.
fn trace_branches(sk: &[u8], w: usize, h: usize) -> Vec<Vec<(f64, f64)>> {
    let degree: Vec<usize> = (0..w * h)
        .map(|i| {
            if sk[i] == 0 {
                0
            } else {
                neighbours(sk, w, h, i % w, i / w).count()
            }
        })
        .collect();
    let interior = |i: usize| sk[i] != 0 && degree[i] == 2;
    let mut visited = vec![false; w * h];
    let mut out = Vec::new();

    let trace = |start: usize, first: usize, visited: &mut Vec<bool>| {
        let mut path = vec![start, first];
        visited[first] = true;
        let (mut prev, mut cur) = (start, first);
        loop {
            let next = neighbours(sk, w, h, cur % w, cur / w)
                .find(|&q| q != prev && interior(q) && !visited[q]);
            if let Some(q) = next {
                visited[q] = true;
                path.push(q);
                prev = cur;
                cur = q;
                continue;
            }
            let stop = neighbours(sk, w, h, cur % w, cur / w)
                .find(|&q| q != prev && !interior(q) && !(q == start && path.len() <= 2));
            if let Some(q) = stop {
                path.push(q);
            }
            break;
        }
        path.into_iter()
            .map(|i| ((i % w) as f64, (i / w) as f64))
            .collect::<Vec<_>>()
    };

    for node in (0..w * h).filter(|&i| sk[i] != 0 && degree[i] != 2) {
        let firsts: Vec<usize> = neighbours(sk, w, h, node % w, node / w)
            .filter(|&q| interior(q))
            .collect();
        for q in firsts {
            if !visited[q] {
                out.push(trace(node, q, &mut visited));
            }
        }
    }
    for i in 0..w * h {
        if interior(i) && !visited[i] {
            visited[i] = true;
            let next = neighbours(sk, w, h, i % w, i / w).find(|&q| interior(q) && !visited[q]);
            if let Some(q) = next {
                out.push(trace(i, q, &mut visited));
            }
        }
    }
    out
}

/// Mean absolute turning angle in degrees over every branch long enough
/// for `window`; 0 when none is.
fn mean_curvature(paths: &[Vec<(f64, f64)>], window: u32) -> f64 {
    let k = (window as usize / 2).max(1);
    let mut sum = 0.0;
    let mut n = 0usize;
    for path in paths {
        for i in k..path.len().saturating_sub(k) {
            let (ax, ay) = path[i - k];
            let (bx, by) = path[i];
            let (cx, cy) = path[i + k];
            let (ux, uy) = (bx - ax, by - ay);
            let (vx, vy) = (cx - bx, cy - by);
            let angle = (ux * vy - uy * vx).atan2(ux * vx + uy * vy);
            sum += angle.abs().to_degrees();
            n += 1;
        }
    }
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Zhang–Suen thinning.
pub fn skeletonize(mask: &BinaryMask) -> BinaryMask {
    let (w, h) = (mask.w, mask.h);
    let mut img = mask.data().to_vec();
    if w < 3 || h < 3 {
        return mask.clone();
    }

    let mut to_clear = Vec::new();
    loop {
        let mut changed = false;
        for pass in 0..2 {
            to_clear.clear();
            for y in 1..h - 1 {
                for x in 1..w - 1 {
                    let i = y * w + x;
                    if img[i] == 0 {
                        continue;
                    }
                    // P2..P9 clockwise from north
                    let p = [
                        img[i - w],
                        img[i - w + 1],
                        img[i + 1],
                        img[i + w + 1],
                        img[i + w],
                        img[i + w - 1],
                        img[i - 1],
                        img[i - w - 1],
                    ];
                    let b: u8 = p.iter().sum();
                    if !(2..=6).contains(&b) {
                        continue;
                    }
                    let a = (0..8).filter(|&k| p[k] == 0 && p[(k + 1) % 8] == 1).count();
                    if a != 1 {
                        continue;
                    }
                    let (c1, c2) = if pass == 0 {
                        (p[0] * p[2] * p[4], p[2] * p[4] * p[6])
                    } else {
                        (p[0] * p[2] * p[6], p[0] * p[4] * p[6])
                    };
                    if c1 == 0 && c2 == 0 {
                        to_clear.push(i);
                    }
                }
            }
            for &i in &to_clear {
                img[i] = 0;
            }
            changed |= !to_clear.is_empty();
        }
        if !changed {
            break;
        }
    }

    BinaryMask::from_bytes(w, h, &img).unwrap_or_else(|| mask.clone())
}
