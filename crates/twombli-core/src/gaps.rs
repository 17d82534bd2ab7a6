//! Descriptive statistics over measured gap areas.
//!
//! Areas come from the gap detector as an unordered list. Statistics are
//! computed on the ascending sort; percentiles use the nearest-rank rule
//! `index = ceil(p / 100 · n)` (1-based).

use crate::error::GapError;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GapSummary {
    pub mean: f64,
    /// Population standard deviation (divides by `n`).
    pub stddev: f64,
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
}

impl GapSummary {
    /// Summarize raw areas. Rejects empty input and any negative or
    /// non-finite value.
    pub fn from_areas(areas: &[f64]) -> Result<Self, GapError> {
        let sorted = sorted_areas(areas)?;
        summarize_sorted(&sorted)
    }
}

/// Validate and sort areas ascending under the IEEE total order.
pub fn sorted_areas(areas: &[f64]) -> Result<Vec<f64>, GapError> {
    if let Some((index, &value)) = areas
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        return Err(GapError::InvalidArea { index, value });
    }
    let mut sorted = areas.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(sorted)
}

/// Statistics over an already sorted, validated slice.
pub fn summarize_sorted(sorted: &[f64]) -> Result<GapSummary, GapError> {
    if sorted.is_empty() {
        return Err(GapError::EmptyGapSet);
    }
    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let squares: f64 = sorted.iter().map(|v| (v - mean) * (v - mean)).sum();
    Ok(GapSummary {
        mean,
        stddev: (squares / n).sqrt(),
        p5: percentile(sorted, 5.0),
        p50: percentile(sorted, 50.0),
        p95: percentile(sorted, 95.0),
    })
}

/// Nearest-rank percentile of a non-empty ascending slice.
///
/// # Panics
///
/// Panics if `sorted` is empty.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Sorted areas as text, one value per line.
pub fn area_lines(sorted: &[f64]) -> String {
    let mut out = String::with_capacity(sorted.len() * 8);
    for v in sorted {
        out.push_str(&v.to_string());
        out.push('\n');
    }
    out
}

/// One line of the gap summary table: `prefix mean stddev p5 p50 p95`.
///
/// Values are written in shortest round-trip form, so [`GapSummaryRow::parse`]
/// restores them exactly.
#[derive(Clone, Debug, PartialEq)]
pub struct GapSummaryRow {
    pub prefix: String,
    pub summary: GapSummary,
}

impl GapSummaryRow {
    pub fn new(prefix: impl Into<String>, summary: GapSummary) -> Self {
        Self {
            prefix: prefix.into(),
            summary,
        }
    }

    /// Parse a row written by [`fmt::Display`].
    ///
    /// The prefix is everything before the last five space-separated fields,
    /// so prefixes containing spaces survive.
    pub fn parse(line: &str) -> Result<Self, GapError> {
        let malformed = || GapError::MalformedRow(line.to_string());
        let line = line.trim_end_matches(['\r', '\n']);

        let mut fields = line.rsplitn(6, ' ');
        let mut values = [0.0f64; 5];
        for slot in values.iter_mut().rev() {
            *slot = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(malformed)?;
        }
        let prefix = fields.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;

        let [mean, stddev, p5, p50, p95] = values;
        Ok(Self::new(
            prefix,
            GapSummary {
                mean,
                stddev,
                p5,
                p50,
                p95,
            },
        ))
    }
}

impl fmt::Display for GapSummaryRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        write!(
            f,
            "{} {} {} {} {} {}",
            self.prefix, s.mean, s.stddev, s.p5, s.p50, s.p95
        )
    }
}
