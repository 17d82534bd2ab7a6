//! Capabilities the per-image pipeline invokes but does not implement.
//!
//! Each trait is a seam: the pipeline only relies on the documented
//! contract, so an implementation backed by another toolkit can replace the
//! ones in [`crate::builtin`] without touching the runner.

use std::path::Path;
use twombli_core::{BinaryMask, OperationError, RidgeDetector};

/// Directional coherence of a fused mask.
#[derive(Clone, Debug, PartialEq)]
pub struct Coherence {
    /// Percentage in `[0, 100]`.
    pub alignment: f64,
    pub title: String,
}

pub trait CoherenceAnalyzer: Send + Sync {
    fn analyze(&self, mask: &BinaryMask, title: &str) -> Result<Coherence, OperationError>;
}

/// Inputs of one morphometric run.
#[derive(Clone, Copy, Debug)]
pub struct MorphometricSettings<'a> {
    pub prefix: &'a str,
    pub properties_file: Option<&'a Path>,
    /// One pass per window, in order.
    pub curvature_windows: &'a [u32],
    pub minimum_branch_length: u32,
}

/// Header line plus comma-separated data rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultsTable {
    pub header: String,
    pub rows: Vec<String>,
}

impl ResultsTable {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: impl Into<String>) {
        self.rows.push(row.into());
    }

    pub fn last_row(&self) -> Option<&str> {
        self.rows.last().map(String::as_str)
    }

    /// Last comma-separated field of the last row.
    pub fn last_field(&self) -> Option<&str> {
        self.last_row().and_then(|r| r.rsplit(',').next())
    }

    /// CSV text with a trailing newline after every line.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for line in std::iter::once(&self.header).chain(&self.rows) {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

pub trait MorphometricAnalyzer: Send + Sync {
    fn analyze(
        &self,
        mask: &BinaryMask,
        settings: &MorphometricSettings<'_>,
    ) -> Result<ResultsTable, OperationError>;
}

/// One inscribed circle found in the background of a mask.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GapRegion {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub area: f64,
}

pub trait GapDetector: Send + Sync {
    fn detect(
        &self,
        mask: &BinaryMask,
        minimum_diameter: u32,
    ) -> Result<Vec<GapRegion>, OperationError>;
}

/// Turns a density heat-map into a results table; the HDM value is the last
/// field of the last row.
pub trait DensityQuantifier: Send + Sync {
    fn quantify(&self, heat_map: &[u8], w: usize, h: usize)
        -> Result<ResultsTable, OperationError>;
}

/// The capability set a run works with.
pub struct Operations {
    pub ridge: Box<dyn RidgeDetector>,
    pub coherence: Box<dyn CoherenceAnalyzer>,
    pub morphometrics: Box<dyn MorphometricAnalyzer>,
    pub gaps: Box<dyn GapDetector>,
    pub density: Box<dyn DensityQuantifier>,
}

impl Operations {
    /// Pure-Rust implementations shipped with this crate.
    pub fn builtin() -> Self {
        use crate::builtin::*;
        Self {
            ridge: Box::new(HessianRidgeDetector),
            coherence: Box::new(StructureTensorCoherence),
            morphometrics: Box::new(SkeletonMorphometrics),
            gaps: Box::new(InscribedCircleGaps),
            density: Box::new(BlackSpaceDensity),
        }
    }
}

impl Default for Operations {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_accessors() {
        let mut t = ResultsTable::new("a,b,c");
        assert_eq!(t.last_field(), None);
        t.push("1,2,3");
        t.push("4,5,0.75");
        assert_eq!(t.last_row(), Some("4,5,0.75"));
        assert_eq!(t.last_field(), Some("0.75"));
        assert_eq!(t.to_csv(), "a,b,c\n1,2,3\n4,5,0.75\n");
    }
}
