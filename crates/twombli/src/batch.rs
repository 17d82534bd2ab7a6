//! Batch execution over a directory of images.
//!
//! Inputs are sorted by file name and numbered; that number is the unit's
//! sequence. Units run on a dedicated rayon pool and report their outcome
//! over a channel to one aggregator thread, the only writer of the summary
//! tables.

use crate::aggregate::{CsvSummarySink, FailedUnit, RunAggregator, SummarySink, UnitOutcome};
use crate::error::{AggregateError, BatchError, ConfigError};
use crate::layout::{is_supported_input, OutputLayout};
use crate::ops::Operations;
use crate::params::TwombliParams;
use crate::runner::{input_prefix, run_image};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Shared state of one batch.
pub struct RunContext {
    pub params: TwombliParams,
    pub layout: OutputLayout,
    pub ops: Operations,
    total: usize,
    finished: AtomicUsize,
    failed: AtomicUsize,
    aborted: AtomicBool,
}

/// Snapshot of the progress counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub total: usize,
    pub finished: usize,
    pub failed: usize,
}

impl RunContext {
    pub fn new(params: TwombliParams, layout: OutputLayout, ops: Operations, total: usize) -> Self {
        Self {
            params,
            layout,
            ops,
            total,
            finished: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            aborted: AtomicBool::new(false),
        }
    }

    /// Stop handing out units; ones already running still finish.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn progress(&self) -> Progress {
        Progress {
            total: self.total,
            finished: self.finished.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Process one input and count it. Never panics on per-image errors.
    pub fn run_unit(&self, input: &Path) -> UnitOutcome {
        let outcome = match run_image(input, &self.params, &self.layout, &self.ops) {
            Ok(result) => UnitOutcome::Completed(result),
            Err(error) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(input = %input.display(), error = %error_chain(&error), "image failed");
                UnitOutcome::Failed {
                    input: input.to_path_buf(),
                    prefix: input_prefix(input),
                    error,
                }
            }
        };
        let done = self.finished.fetch_add(1, Ordering::Relaxed) + 1;
        info!("[{done}/{}] {}", self.total, input.display());
        outcome
    }
}

/// Outcome of a finished batch.
#[derive(Debug)]
pub struct BatchReport {
    pub total: usize,
    pub completed: usize,
    pub failures: Vec<FailedUnit>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty() && self.completed == self.total
    }
}

/// Supported images directly inside `dir`, sorted by file name.
///
/// Two inputs mapping to the same file prefix would write the same
/// artifacts, so that is rejected.
pub fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let input_dir = |source| BatchError::InputDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut inputs = Vec::new();
    for entry in fs::read_dir(dir).map_err(input_dir)? {
        let path = entry.map_err(input_dir)?.path();
        if path.is_file() && is_supported_input(&path) {
            inputs.push(path);
        }
    }
    inputs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    check_unique_prefixes(&inputs)?;
    Ok(inputs)
}

fn check_unique_prefixes(inputs: &[PathBuf]) -> Result<(), BatchError> {
    let mut by_prefix: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in inputs {
        by_prefix
            .entry(input_prefix(path))
            .or_default()
            .push(path.clone());
    }
    match by_prefix.into_iter().find(|(_, paths)| paths.len() > 1) {
        Some((prefix, paths)) => Err(BatchError::DuplicatePrefix { prefix, paths }),
        None => Ok(()),
    }
}

/// Run a batch writing the summaries as CSV files under `output`.
pub fn run_batch(
    input: &Path,
    output: &Path,
    params: TwombliParams,
    ops: Operations,
    threads: Option<usize>,
) -> Result<BatchReport, BatchError> {
    let layout = OutputLayout::new(output);
    let sink = CsvSummarySink::new(&layout);
    run_batch_with_sink(input, layout, params, ops, threads, sink).map(|(report, _)| report)
}

/// Run a batch into an arbitrary summary sink, returning the sink as well.
///
/// Configuration, input discovery and the output-directory check all happen
/// before any unit starts, so a rejected batch writes nothing. A sink
/// failure aborts the batch: no further unit starts once the aggregator has
/// stopped.
pub fn run_batch_with_sink<S>(
    input: &Path,
    layout: OutputLayout,
    params: TwombliParams,
    ops: Operations,
    threads: Option<usize>,
    sink: S,
) -> Result<(BatchReport, S), BatchError>
where
    S: SummarySink + Send,
{
    let started = Instant::now();
    params.validate()?;
    if threads == Some(0) {
        return Err(ConfigError::ZeroThreads.into());
    }

    let inputs = discover_inputs(input)?;
    if inputs.is_empty() {
        return Err(BatchError::NoInputs(input.to_path_buf()));
    }
    layout.verify_empty()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.unwrap_or(0))
        .build()?;
    layout.prepare().map_err(|source| BatchError::OutputDir {
        path: layout.root().to_path_buf(),
        source,
    })?;
    info!(
        images = inputs.len(),
        threads = pool.current_num_threads(),
        output = %layout.root().display(),
        "batch started"
    );

    let gap_analysis = params.perform_gap_analysis;
    let ctx = RunContext::new(params, layout, ops, inputs.len());

    let (tx, rx) = mpsc::channel::<(u64, UnitOutcome)>();
    let (sink, aggregate) = thread::scope(|scope| {
        let ctx = &ctx;
        let aggregator = scope.spawn(move || -> Result<_, AggregateError> {
            let mut agg = RunAggregator::new(sink, gap_analysis);
            for (sequence, outcome) in rx {
                if let Err(e) = agg.submit(sequence, outcome) {
                    warn!(error = %error_chain(&e), "summary aggregation failed, stopping batch");
                    ctx.abort();
                    return Err(e);
                }
            }
            agg.finish().inspect_err(|_| ctx.abort())
        });

        pool.install(|| {
            // Err stops the sweep once the aggregator is gone
            let _ = inputs.par_iter().enumerate().try_for_each_with(
                tx,
                |tx, (sequence, path)| -> Result<(), ()> {
                    if ctx.is_aborted() {
                        return Err(());
                    }
                    let outcome = ctx.run_unit(path);
                    tx.send((sequence as u64, outcome)).map_err(|_| ctx.abort())
                },
            );
        });

        aggregator.join().map_err(|_| BatchError::AggregatorPanicked)
    })??;

    let progress = ctx.progress();
    let report = BatchReport {
        total: progress.total,
        completed: aggregate.completed,
        failures: aggregate.failures,
        elapsed: started.elapsed(),
    };
    info!(
        completed = report.completed,
        failed = report.failures.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "batch finished"
    );
    Ok((report, sink))
}

/// Error message followed by its sources.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(e) = source {
        out.push_str(": ");
        out.push_str(&e.to_string());
        source = e.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_filters_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["b.tif", "a.PNG", "c.tiff", "notes.txt", "d.jpg"] {
            fs::write(tmp.path().join(name), b"").unwrap();
        }
        fs::create_dir(tmp.path().join("sub.png")).unwrap();
        let names: Vec<String> = discover_inputs(tmp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.PNG", "b.tif", "c.tiff"]);
    }

    #[test]
    fn missing_input_dir_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover_inputs(&tmp.path().join("nope")),
            Err(BatchError::InputDir { .. })
        ));
    }

    #[test]
    fn error_chain_includes_sources() {
        let err = crate::error::UnitError::Io {
            path: "x.csv".into(),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(error_chain(&err), "cannot write x.csv: disk full");
    }
}
