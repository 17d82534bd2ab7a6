//! Built-in capability implementations.
//!
//! These are compact pure-Rust stand-ins for the analysis plugins the
//! pipeline was designed around. They follow the trait contracts in
//! [`crate::ops`] and are deterministic, which keeps batch output
//! reproducible across thread counts.

mod coherence;
mod density;
mod gaps;
mod morphometrics;
mod ridge;

pub use coherence::StructureTensorCoherence;
pub use density::BlackSpaceDensity;
pub use gaps::{distance_transform, InscribedCircleGaps};
pub use morphometrics::{skeletonize, SkeletonMorphometrics};
pub use ridge::HessianRidgeDetector;

const NEIGHBOURS_8: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Foreground neighbours of `(x, y)` in the 8-neighbourhood.
fn neighbours(
    data: &[u8],
    w: usize,
    h: usize,
    x: usize,
    y: usize,
) -> impl Iterator<Item = usize> + '_ {
    NEIGHBOURS_8.iter().filter_map(move |&(dx, dy)| {
        let nx = x as isize + dx;
        let ny = y as isize + dy;
        if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
            return None;
        }
        let idx = ny as usize * w + nx as usize;
        (data[idx] != 0).then_some(idx)
    })
}
