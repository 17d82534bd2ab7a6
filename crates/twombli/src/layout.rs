//! Output directory layout and file naming.

use crate::error::BatchError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const MASKS_DIR: &str = "masks";
pub const HDM_DIR: &str = "hdm";
pub const HDM_CSV_DIR: &str = "hdm_csvs";
pub const GAP_DIR: &str = "gap_analysis";
pub const TWOMBLI_SUMMARY: &str = "twombli_summary.csv";
pub const GAPS_SUMMARY: &str = "gaps_summary.csv";

/// File extensions accepted as inputs, compared case-insensitively.
pub const INPUT_EXTENSIONS: [&str; 3] = ["png", "tif", "tiff"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mask_png(&self, prefix: &str) -> PathBuf {
        self.root.join(MASKS_DIR).join(format!("{prefix}_masks.png"))
    }

    pub fn morphometrics_csv(&self, prefix: &str) -> PathBuf {
        self.root.join(MASKS_DIR).join(format!("{prefix}_results.csv"))
    }

    pub fn hdm_png(&self, prefix: &str) -> PathBuf {
        self.root.join(HDM_DIR).join(format!("{prefix}_hdm.png"))
    }

    pub fn hdm_csv(&self, prefix: &str) -> PathBuf {
        self.root.join(HDM_CSV_DIR).join(format!("{prefix}_ResultsHDM.csv"))
    }

    pub fn gaps_csv(&self, prefix: &str) -> PathBuf {
        self.root.join(GAP_DIR).join(format!("{prefix}_gaps.csv"))
    }

    pub fn area_arrays_csv(&self, prefix: &str) -> PathBuf {
        self.root.join(GAP_DIR).join(format!("{prefix}_area_arrays.csv"))
    }

    pub fn gap_png(&self, prefix: &str) -> PathBuf {
        self.root.join(GAP_DIR).join(format!("{prefix}_gap.png"))
    }

    pub fn twombli_summary(&self) -> PathBuf {
        self.root.join(TWOMBLI_SUMMARY)
    }

    pub fn gaps_summary(&self) -> PathBuf {
        self.root.join(GAPS_SUMMARY)
    }

    /// Fails unless the root is absent or an empty directory.
    pub fn verify_empty(&self) -> Result<(), BatchError> {
        let output_dir = |source| BatchError::OutputDir {
            path: self.root.clone(),
            source,
        };
        if !self.root.exists() {
            return Ok(());
        }
        if !self.root.is_dir() {
            return Err(output_dir(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "not a directory",
            )));
        }
        let mut entries = fs::read_dir(&self.root).map_err(output_dir)?;
        if entries.next().is_some() {
            return Err(BatchError::OutputNotEmpty(self.root.clone()));
        }
        Ok(())
    }

    /// Create the root and every artifact directory.
    pub fn prepare(&self) -> io::Result<()> {
        for dir in [MASKS_DIR, HDM_DIR, HDM_CSV_DIR, GAP_DIR] {
            fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }
}

/// File name up to its final `.`, or the whole name without one.
pub fn file_prefix(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map_or(file_name, |(prefix, _)| prefix)
}

/// Whether `path` carries one of [`INPUT_EXTENSIONS`].
pub fn is_supported_input(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| INPUT_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
}
