//! Intensity transforms and the density heat-map pipeline.
//!
//! Everything here works on row-major 8-bit planes except the depth
//! reductions, which turn 16-bit or float samples into bytes. Lookup tables
//! follow the display-range convention: a range `[min, max]` maps onto 256
//! output levels as `floor(256 · (i − min) / (max − min + 1))`, clamped.

/// Parameters of the density heat-map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DensityParams {
    pub dark_lines: bool,
    /// Upper end of the display range applied before the second inversion.
    pub maximum_display_value: u8,
    /// Percentage of pixels allowed to saturate during the final stretch,
    /// split equally between the dark and bright tails.
    pub contrast_saturation: f64,
}

impl Default for DensityParams {
    fn default() -> Self {
        Self {
            dark_lines: false,
            maximum_display_value: 200,
            contrast_saturation: 0.35,
        }
    }
}

/// Build the contrast-normalized heat-map from an 8-bit plane.
///
/// Steps, in order: invert when lines are bright, apply the
/// `[0, maximum_display_value]` display range as a lookup table, invert
/// again, then stretch contrast with the configured saturation. The input is
/// left untouched.
pub fn density_map(gray: &[u8], params: &DensityParams) -> Vec<u8> {
    let mut out = gray.to_vec();
    density_map_in_place(&mut out, params);
    out
}

/// [`density_map`] over a buffer the caller already owns.
pub fn density_map_in_place(data: &mut [u8], params: &DensityParams) {
    if !params.dark_lines {
        invert(data);
    }
    let lut = display_range_lut(0, params.maximum_display_value);
    apply_lut(data, &lut);
    invert(data);
    stretch_contrast(data, params.contrast_saturation);
}

#[inline]
pub fn invert(data: &mut [u8]) {
    for v in data {
        *v = 255 - *v;
    }
}

/// Lookup table mapping the display range `[min, max]` onto `0..=255`.
pub fn display_range_lut(min: u8, max: u8) -> [u8; 256] {
    let min = min as f64;
    let span = (max as f64 - min + 1.0).max(1.0);
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        let v = (256.0 * (i as f64 - min) / span).floor();
        *slot = v.clamp(0.0, 255.0) as u8;
    }
    lut
}

#[inline]
pub fn apply_lut(data: &mut [u8], lut: &[u8; 256]) {
    for v in data {
        *v = lut[*v as usize];
    }
}

/// 256-bin intensity histogram.
pub fn histogram(data: &[u8]) -> [u64; 256] {
    let mut hist = [0u64; 256];
    for &v in data {
        hist[v as usize] += 1;
    }
    hist
}

/// Bin range left after saturating `saturation` percent of the samples.
///
/// Half of the budget is taken from each tail: the walk from either end
/// stops at the first bin where the cumulative count exceeds
/// `floor(total · saturation / 200)`. Returns `None` for an empty histogram.
pub fn saturated_bounds(hist: &[u64], saturation: f64) -> Option<(usize, usize)> {
    let total: u64 = hist.iter().sum();
    if total == 0 {
        return None;
    }
    let threshold = if saturation > 0.0 {
        (total as f64 * saturation / 200.0) as u64
    } else {
        0
    };

    let mut low = 0;
    let mut acc = 0u64;
    for (i, &count) in hist.iter().enumerate() {
        acc += count;
        low = i;
        if acc > threshold {
            break;
        }
    }

    let mut high = hist.len() - 1;
    acc = 0;
    for (i, &count) in hist.iter().enumerate().rev() {
        acc += count;
        high = i;
        if acc > threshold {
            break;
        }
    }

    Some((low, high))
}

/// Stretch `[low, high]` from the saturated bounds over the full byte range.
///
/// Leaves the data unchanged when the bounds collapse.
pub fn stretch_contrast(data: &mut [u8], saturation: f64) {
    let Some((low, high)) = saturated_bounds(&histogram(data), saturation) else {
        return;
    };
    if high <= low {
        return;
    }
    let lut = display_range_lut(low as u8, high as u8);
    apply_lut(data, &lut);
}

/// Reduce 16-bit samples to bytes through the display range `[min, max]`.
pub fn u16_to_u8(data: &[u16], min: u16, max: u16) -> Vec<u8> {
    let scale = 256.0 / (max as f64 - min as f64 + 1.0);
    data.iter()
        .map(|&v| {
            let shifted = (v as f64 - min as f64).max(0.0);
            (shifted * scale + 0.5).min(255.0) as u8
        })
        .collect()
}

/// Min/max display range of 16-bit samples, optionally saturated.
///
/// With `saturation == 0` this is the plain data range.
pub fn u16_display_range(data: &[u16], saturation: f64) -> Option<(u16, u16)> {
    let mut hist = vec![0u64; u16::MAX as usize + 1];
    for &v in data {
        hist[v as usize] += 1;
    }
    saturated_bounds(&hist, saturation).map(|(lo, hi)| (lo as u16, hi as u16))
}

/// Reduce float samples to bytes by linear min-max scaling.
pub fn f32_to_u8(data: &[f32]) -> Vec<u8> {
    let finite = data.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !(max > min) {
        return vec![0; data.len()];
    }
    let scale = 255.0 / (max - min) as f64;
    data.iter()
        .map(|&v| {
            if !v.is_finite() {
                return 0;
            }
            ((v - min) as f64 * scale + 0.5).clamp(0.0, 255.0) as u8
        })
        .collect()
}

/// Unweighted channel mean of interleaved RGB bytes.
pub fn rgb_to_u8(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3)
        .map(|p| ((p[0] as u16 + p[1] as u16 + p[2] as u16) / 3) as u8)
        .collect()
}
