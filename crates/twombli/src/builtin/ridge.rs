//! Hessian-based single-scale line detector.
//!
//! The plane is smoothed with a Gaussian at the requested `sigma`; the
//! eigenvalue of the Hessian with the largest magnitude measures the
//! curvature across a line. Line centres are local maxima of that response
//! along the eigenvector, and hysteresis between the two thresholds links
//! them into lines. Components shorter than the minimum branch length are
//! dropped.

use super::neighbours;
use twombli_core::{BinaryMask, OperationError, RidgeDetector, RidgeRequest};

#[derive(Clone, Copy, Debug, Default)]
pub struct HessianRidgeDetector;

impl RidgeDetector for HessianRidgeDetector {
    fn detect(
        &self,
        img: &[u8],
        w: usize,
        h: usize,
        request: &RidgeRequest,
    ) -> Result<BinaryMask, OperationError> {
        if img.len() != w * h {
            return Err(OperationError::new(
                "ridge detection",
                format!("plane holds {} bytes, expected {w}x{h}", img.len()),
            ));
        }
        let sigma = request.scale.sigma;
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(OperationError::new(
                "ridge detection",
                format!("invalid sigma {sigma}"),
            ));
        }
        if w < 3 || h < 3 {
            return Ok(BinaryMask::new(w, h));
        }

        let smooth = gaussian_blur(img, w, h, sigma);
        let (response, normals) = line_response(&smooth, w, h, request.dark_lines);
        let centres = suppress_non_maxima(&response, &normals, w, h);
        let linked = hysteresis(
            &response,
            &centres,
            w,
            h,
            request.scale.lower_threshold,
            request.scale.upper_threshold,
        );
        let kept = drop_short_components(linked, w, h, request.minimum_branch_length as usize);

        BinaryMask::from_bytes(w, h, &kept).ok_or_else(|| {
            OperationError::new("ridge detection", "internal buffer size mismatch")
        })
    }
}

fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil().max(1.0) as isize;
    let denom = 2.0 * sigma * sigma;
    let mut k: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / denom).exp())
        .collect();
    let sum: f64 = k.iter().sum();
    for v in &mut k {
        *v /= sum;
    }
    k
}

/// Separable Gaussian with clamped borders.
fn gaussian_blur(img: &[u8], w: usize, h: usize, sigma: f64) -> Vec<f64> {
    let kernel = gaussian_kernel(sigma);
    let r = (kernel.len() / 2) as isize;
    let clamp = |v: isize, n: usize| v.clamp(0, n as isize - 1) as usize;

    let mut tmp = vec![0.0; w * h];
    for y in 0..h {
        let row = &img[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = clamp(x as isize + k as isize - r, w);
                acc += weight * row[sx] as f64;
            }
            tmp[y * w + x] = acc;
        }
    }

    let mut out = vec![0.0; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = clamp(y as isize + k as isize - r, h);
                acc += weight * tmp[sy * w + x];
            }
            out[y * w + x] = acc;
        }
    }
    out
}

/// Per-pixel line strength and unit normal (across the line).
///
/// Bright lines have a strongly negative second derivative across them, dark
/// lines a strongly positive one; the strength is that curvature with the
/// sign flipped as needed, zero when the sign is wrong.
fn line_response(
    smooth: &[f64],
    w: usize,
    h: usize,
    dark_lines: bool,
) -> (Vec<f64>, Vec<[f64; 2]>) {
    let mut response = vec![0.0; w * h];
    let mut normals = vec![[0.0, 0.0]; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let c = smooth[i];
            let rxx = smooth[i + 1] - 2.0 * c + smooth[i - 1];
            let ryy = smooth[i + w] - 2.0 * c + smooth[i - w];
            let rxy = (smooth[i + w + 1] - smooth[i + w - 1] - smooth[i - w + 1]
                + smooth[i - w - 1])
                / 4.0;

            let mean = 0.5 * (rxx + ryy);
            let root = (0.25 * (rxx - ryy) * (rxx - ryy) + rxy * rxy).sqrt();
            let (l1, l2) = (mean + root, mean - root);
            let lambda = if l1.abs() >= l2.abs() { l1 } else { l2 };

            let strength = if dark_lines { lambda } else { -lambda };
            if strength <= 0.0 {
                continue;
            }
            response[i] = strength;
            normals[i] = eigenvector(rxx, rxy, ryy, lambda);
        }
    }
    (response, normals)
}

fn eigenvector(a: f64, b: f64, c: f64, lambda: f64) -> [f64; 2] {
    let v1 = [b, lambda - a];
    let v2 = [lambda - c, b];
    let n1 = v1[0].hypot(v1[1]);
    let n2 = v2[0].hypot(v2[1]);
    let (v, n) = if n1 >= n2 { (v1, n1) } else { (v2, n2) };
    if n < 1e-12 {
        [1.0, 0.0]
    } else {
        [v[0] / n, v[1] / n]
    }
}

/// Keep pixels whose response is not exceeded by either neighbour along the
/// normal.
fn suppress_non_maxima(
    response: &[f64],
    normals: &[[f64; 2]],
    w: usize,
    h: usize,
) -> Vec<bool> {
    let mut keep = vec![false; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let r = response[i];
            if r <= 0.0 {
                continue;
            }
            let [nx, ny] = normals[i];
            let dx = nx.round() as isize;
            let dy = ny.round() as isize;
            let at = |sx: isize, sy: isize| {
                let nx = (x as isize + sx) as usize;
                let ny = (y as isize + sy) as usize;
                response[ny * w + nx]
            };
            keep[i] = r >= at(dx, dy) && r >= at(-dx, -dy);
        }
    }
    keep
}

/// Grow from centres above `upper` through centres at or above `lower`.
fn hysteresis(
    response: &[f64],
    centres: &[bool],
    w: usize,
    h: usize,
    lower: f64,
    upper: f64,
) -> Vec<u8> {
    let candidate: Vec<u8> = response
        .iter()
        .zip(centres)
        .map(|(&r, &c)| (c && r >= lower) as u8)
        .collect();

    let mut out = vec![0u8; w * h];
    let mut stack = Vec::new();
    for (i, &r) in response.iter().enumerate() {
        if candidate[i] == 0 || r < upper || out[i] != 0 {
            continue;
        }
        out[i] = 1;
        stack.push(i);
        while let Some(p) = stack.pop() {
            for q in neighbours(&candidate, w, h, p % w, p / w) {
                if out[q] == 0 {
                    out[q] = 1;
                    stack.push(q);
                }
            }
        }
    }
    out
}

/// Zero 8-connected components with fewer than `min_len` pixels.
fn drop_short_components(mut data: Vec<u8>, w: usize, h: usize, min_len: usize) -> Vec<u8> {
    if min_len <= 1 {
        return data;
    }
    let mut label = vec![false; w * h];
    let mut component = Vec::new();
    let mut stack = Vec::new();
    for start in 0..data.len() {
        if data[start] == 0 || label[start] {
            continue;
        }
        component.clear();
        label[start] = true;
        stack.push(start);
        while let Some(p) = stack.pop() {
            component.push(p);
            for q in neighbours(&data, w, h, p % w, p / w) {
                if !label[q] {
                    label[q] = true;
                    stack.push(q);
                }
            }
        }
        if component.len() < min_len {
            for &p in &component {
                data[p] = 0;
            }
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use twombli_core::FusionParams;

    fn vertical_line(w: usize, h: usize, x0: usize, width: usize, fg: u8, bg: u8) -> Vec<u8> {
        let mut img = vec![bg; w * h];
        for y in 0..h {
            for x in x0..x0 + width {
                img[y * w + x] = fg;
            }
        }
        img
    }

    fn request(line_width: u32, dark_lines: bool) -> RidgeRequest {
        FusionParams {
            minimum_line_width: line_width,
            maximum_line_width: line_width,
            minimum_branch_length: 10,
            dark_lines,
        }
        .request(line_width)
    }

    #[test]
    fn finds_centre_of_bright_line() {
        let (w, h) = (40, 40);
        let img = vertical_line(w, h, 18, 5, 220, 20);
        let mask = HessianRidgeDetector.detect(&img, w, h, &request(5, false)).unwrap();
        // the centre column carries a long run of detections
        let centre: usize = (5..35).filter(|&y| mask.at(20, y)).count();
        assert!(centre > 20, "centre hits: {centre}");
        assert!(!mask.at(5, 20));
        assert!(!mask.at(35, 20));
    }

    #[test]
    fn dark_flag_selects_polarity() {
        let (w, h) = (40, 40);
        let img = vertical_line(w, h, 18, 5, 20, 220);
        let bright = HessianRidgeDetector.detect(&img, w, h, &request(5, false)).unwrap();
        let dark = HessianRidgeDetector.detect(&img, w, h, &request(5, true)).unwrap();
        assert!(dark.at(20, 20));
        assert!(!bright.at(20, 20));
    }

    #[test]
    fn flat_plane_has_no_lines() {
        let img = vec![128u8; 30 * 30];
        let mask = HessianRidgeDetector.detect(&img, 30, 30, &request(5, false)).unwrap();
        assert_eq!(mask.count(), 0);
    }

    #[test]
    fn short_components_are_removed() {
        let mut data = vec![0u8; 10 * 10];
        for x in 0..3 {
            data[5 * 10 + x] = 1;
        }
        for y in 0..10 {
            data[y * 10 + 8] = 1;
        }
        let kept = drop_short_components(data, 10, 10, 5);
        assert_eq!(kept.iter().filter(|&&v| v != 0).count(), 10);
        assert_eq!(kept[5 * 10], 0);
    }

    #[test]
    fn rejects_mismatched_plane() {
        assert!(HessianRidgeDetector
            .detect(&[0u8; 10], 4, 4, &request(3, false))
            .is_err());
    }
}
