//! Error types of the application layer.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use twombli_core::{FusionError, GapError, OperationError};

/// Parameter set rejected before any image is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("minimumLineWidth must be at least 1")]
    ZeroLineWidth,

    #[error("maximumLineWidth ({max}) is below minimumLineWidth ({min})")]
    LineWidthRange { min: u32, max: u32 },

    #[error("curvatureWindowStepSize must be at least 1")]
    ZeroCurvatureStep,

    #[error("maximumCurvatureWindow ({max}) is below minimumCurvatureWindow ({min})")]
    CurvatureWindowRange { min: u32, max: u32 },

    #[error("maximumDisplayHDM must be in 0..=255, got {0}")]
    DisplayRange(u32),

    #[error("contrastSaturation must be a finite percentage in [0, 100), got {0}")]
    ContrastSaturation(f64),

    #[error("properties file {0} does not exist")]
    MissingPropertiesFile(PathBuf),

    #[error("worker thread count must be at least 1")]
    ZeroThreads,
}

/// Failure of a single image. The batch records it and moves on.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("cannot decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{path} has an empty or unsupported pixel layout")]
    UnsupportedImage { path: PathBuf },

    #[error("multiscale fusion failed")]
    Fusion(#[from] FusionError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error("gap statistics failed")]
    Gaps(#[source] GapError),

    #[error("{what} produced no result rows")]
    EmptyTable { what: &'static str },

    #[error("cannot write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot encode {path}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Failure of the single-writer summary aggregation.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("sequence number {0} was submitted twice")]
    DuplicateSequence(u64),

    #[error("cannot append to {path}")]
    Sink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Batch-fatal errors. None of these leaves partial per-image output.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot read input directory {path}")]
    InputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no png/tif/tiff images found in {0}")]
    NoInputs(PathBuf),

    #[error("{} inputs share the file prefix '{prefix}'", paths.len())]
    DuplicatePrefix { prefix: String, paths: Vec<PathBuf> },

    #[error("output directory {0} is not empty")]
    OutputNotEmpty(PathBuf),

    #[error("cannot prepare output directory {path}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("summary aggregation failed")]
    Aggregate(#[from] AggregateError),

    #[error("aggregator thread panicked")]
    AggregatorPanicked,
}
