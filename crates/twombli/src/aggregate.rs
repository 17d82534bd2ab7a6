//! Sequence-ordered aggregation of per-image results into the two summary
//! tables.
//!
//! Units finish in any order. The aggregator buffers early arrivals and
//! appends rows strictly by sequence number, so the summaries read the same
//! for any thread count.

use crate::error::{AggregateError, UnitError};
use crate::layout::OutputLayout;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Everything the summaries need from one processed image.
#[derive(Clone, Debug, PartialEq)]
pub struct PerImageResult {
    pub file_prefix: String,
    /// Coherency percentage in `[0, 100]`.
    pub alignment: f64,
    /// Pixel count of the image.
    pub dimension: usize,
    /// Last line of the morphometric results table, verbatim.
    pub morphometric_row: String,
    /// Last field of the density results table, verbatim.
    pub hdm_value: String,
    /// `None` when gap analysis is off or found no gaps.
    pub gap_summary_row: Option<String>,
}

impl PerImageResult {
    /// `morphometric_row,hdm_value,alignment,dimension`
    pub fn summary_row(&self) -> String {
        format!(
            "{},{},{},{}",
            self.morphometric_row, self.hdm_value, self.alignment, self.dimension
        )
    }
}

/// Result of one unit of work.
#[derive(Debug)]
pub enum UnitOutcome {
    Completed(PerImageResult),
    Failed {
        input: PathBuf,
        prefix: String,
        error: UnitError,
    },
}

/// A unit that contributed nothing to the summaries.
#[derive(Debug)]
pub struct FailedUnit {
    pub sequence: u64,
    pub input: PathBuf,
    pub prefix: String,
    pub error: UnitError,
}

/// Destination of the two append-only tables.
pub trait SummarySink {
    fn append_summary(&mut self, row: &str) -> Result<(), AggregateError>;
    fn append_gap(&mut self, row: &str) -> Result<(), AggregateError>;
}

/// Appends to `twombli_summary.csv` and `gaps_summary.csv`, creating each
/// file on its first row.
pub struct CsvSummarySink {
    summary_path: PathBuf,
    gaps_path: PathBuf,
    summary: Option<File>,
    gaps: Option<File>,
}

impl CsvSummarySink {
    pub fn new(layout: &OutputLayout) -> Self {
        Self {
            summary_path: layout.twombli_summary(),
            gaps_path: layout.gaps_summary(),
            summary: None,
            gaps: None,
        }
    }

    fn append(slot: &mut Option<File>, path: &Path, row: &str) -> Result<(), AggregateError> {
        let sink = |source| AggregateError::Sink {
            path: path.to_path_buf(),
            source,
        };
        if slot.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(sink)?;
            *slot = Some(file);
        }
        if let Some(file) = slot.as_mut() {
            writeln!(file, "{row}").map_err(sink)?;
        }
        Ok(())
    }
}

impl SummarySink for CsvSummarySink {
    fn append_summary(&mut self, row: &str) -> Result<(), AggregateError> {
        Self::append(&mut self.summary, &self.summary_path, row)
    }

    fn append_gap(&mut self, row: &str) -> Result<(), AggregateError> {
        Self::append(&mut self.gaps, &self.gaps_path, row)
    }
}

/// In-memory tables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemorySink {
    pub summary: Vec<String>,
    pub gaps: Vec<String>,
}

impl SummarySink for MemorySink {
    fn append_summary(&mut self, row: &str) -> Result<(), AggregateError> {
        self.summary.push(row.to_string());
        Ok(())
    }

    fn append_gap(&mut self, row: &str) -> Result<(), AggregateError> {
        self.gaps.push(row.to_string());
        Ok(())
    }
}

/// Totals after the last outcome was applied.
#[derive(Debug, Default)]
pub struct AggregateReport {
    pub completed: usize,
    pub failures: Vec<FailedUnit>,
}

/// Single writer for the summary tables.
pub struct RunAggregator<S> {
    sink: S,
    gap_analysis: bool,
    next: u64,
    pending: BTreeMap<u64, UnitOutcome>,
    report: AggregateReport,
}

impl<S: SummarySink> RunAggregator<S> {
    /// Aggregator expecting sequence numbers from 0.
    pub fn new(sink: S, gap_analysis: bool) -> Self {
        Self {
            sink,
            gap_analysis,
            next: 0,
            pending: BTreeMap::new(),
            report: AggregateReport::default(),
        }
    }

    /// Accept the outcome of unit `sequence` and flush every consecutive
    /// outcome now available.
    pub fn submit(&mut self, sequence: u64, outcome: UnitOutcome) -> Result<(), AggregateError> {
        if sequence < self.next || self.pending.contains_key(&sequence) {
            return Err(AggregateError::DuplicateSequence(sequence));
        }
        self.pending.insert(sequence, outcome);
        while let Some(outcome) = self.pending.remove(&self.next) {
            let sequence = self.next;
            self.next += 1;
            self.apply(sequence, outcome)?;
        }
        Ok(())
    }

    /// Flush what is still buffered, skipping sequence numbers that never
    /// arrived, and return the sink with the totals.
    pub fn finish(mut self) -> Result<(S, AggregateReport), AggregateError> {
        let pending = std::mem::take(&mut self.pending);
        for (sequence, outcome) in pending {
            if sequence != self.next {
                warn!(
                    expected = self.next,
                    got = sequence,
                    "sequence numbers missing from batch"
                );
            }
            self.next = sequence + 1;
            self.apply(sequence, outcome)?;
        }
        Ok((self.sink, self.report))
    }

    fn apply(&mut self, sequence: u64, outcome: UnitOutcome) -> Result<(), AggregateError> {
        match outcome {
            UnitOutcome::Completed(result) => {
                self.sink.append_summary(&result.summary_row())?;
                if self.gap_analysis {
                    if let Some(row) = &result.gap_summary_row {
                        self.sink.append_gap(row)?;
                    }
                }
                debug!(sequence, prefix = %result.file_prefix, "summary rows appended");
                self.report.completed += 1;
            }
            UnitOutcome::Failed {
                input,
                prefix,
                error,
            } => {
                self.report.failures.push(FailedUnit {
                    sequence,
                    input,
                    prefix,
                    error,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(prefix: &str, gap: bool) -> PerImageResult {
        PerImageResult {
            file_prefix: prefix.to_string(),
            alignment: 42.5,
            dimension: 1024,
            morphometric_row: format!("{prefix},40,100,2,0,0.1"),
            hdm_value: "0.25".to_string(),
            gap_summary_row: gap.then(|| format!("{prefix} 1 0 1 1 1")),
        }
    }

    fn failed(prefix: &str) -> UnitOutcome {
        UnitOutcome::Failed {
            input: PathBuf::from(format!("{prefix}.png")),
            prefix: prefix.to_string(),
            error: UnitError::EmptyTable {
                what: "density quantification",
            },
        }
    }

    #[test]
    fn summary_row_layout() {
        assert_eq!(
            result("A", false).summary_row(),
            "A,40,100,2,0,0.1,0.25,42.5,1024"
        );
    }

    #[test]
    fn out_of_order_completion_is_reordered() {
        let mut agg = RunAggregator::new(MemorySink::default(), true);
        agg.submit(2, UnitOutcome::Completed(result("C", true))).unwrap();
        agg.submit(0, UnitOutcome::Completed(result("A", true))).unwrap();
        agg.submit(1, UnitOutcome::Completed(result("B", true))).unwrap();
        let (sink, report) = agg.finish().unwrap();
        let prefixes: Vec<&str> = sink.summary.iter().map(|r| &r[..1]).collect();
        assert_eq!(prefixes, ["A", "B", "C"]);
        assert_eq!(sink.gaps, ["A 1 0 1 1 1", "B 1 0 1 1 1", "C 1 0 1 1 1"]);
        assert_eq!(report.completed, 3);
    }

    #[test]
    fn failed_unit_adds_no_rows_and_does_not_block() {
        let mut agg = RunAggregator::new(MemorySink::default(), true);
        agg.submit(0, UnitOutcome::Completed(result("A", true))).unwrap();
        agg.submit(1, failed("B")).unwrap();
        agg.submit(2, UnitOutcome::Completed(result("C", true))).unwrap();
        let (sink, report) = agg.finish().unwrap();
        assert_eq!(sink.summary.len(), 2);
        assert!(sink.summary[0].starts_with("A,"));
        assert!(sink.summary[1].starts_with("C,"));
        assert_eq!(sink.gaps.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].sequence, 1);
        assert_eq!(report.failures[0].prefix, "B");
    }

    #[test]
    fn gap_table_is_independent() {
        let mut agg = RunAggregator::new(MemorySink::default(), true);
        agg.submit(0, UnitOutcome::Completed(result("A", false))).unwrap();
        agg.submit(1, UnitOutcome::Completed(result("B", true))).unwrap();
        let (sink, _) = agg.finish().unwrap();
        assert_eq!(sink.summary.len(), 2);
        assert_eq!(sink.gaps, ["B 1 0 1 1 1"]);

        let mut agg = RunAggregator::new(MemorySink::default(), false);
        agg.submit(0, UnitOutcome::Completed(result("A", true))).unwrap();
        let (sink, _) = agg.finish().unwrap();
        assert!(sink.gaps.is_empty());
    }

    #[test]
    fn duplicate_sequence_is_rejected() {
        let mut agg = RunAggregator::new(MemorySink::default(), false);
        agg.submit(0, UnitOutcome::Completed(result("A", false))).unwrap();
        assert!(matches!(
            agg.submit(0, UnitOutcome::Completed(result("A", false))),
            Err(AggregateError::DuplicateSequence(0))
        ));
        agg.submit(5, UnitOutcome::Completed(result("F", false))).unwrap();
        assert!(matches!(
            agg.submit(5, failed("F")),
            Err(AggregateError::DuplicateSequence(5))
        ));
    }

    #[test]
    fn sequences_starting_above_zero_flush_on_finish() {
        let mut agg = RunAggregator::new(MemorySink::default(), false);
        for (seq, p) in [(3, "C"), (1, "A"), (2, "B")] {
            agg.submit(seq, UnitOutcome::Completed(result(p, false))).unwrap();
        }
        let (sink, _) = agg.finish().unwrap();
        let prefixes: Vec<&str> = sink.summary.iter().map(|r| &r[..1]).collect();
        assert_eq!(prefixes, ["A", "B", "C"]);
    }

    #[test]
    fn csv_sink_appends_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(tmp.path());
        let mut sink = CsvSummarySink::new(&layout);
        sink.append_summary("a,1").unwrap();
        sink.append_summary("b,2").unwrap();
        assert!(!layout.gaps_summary().exists());
        sink.append_gap("a 1 2 3 4 5").unwrap();
        drop(sink);
        let text = std::fs::read_to_string(layout.twombli_summary()).unwrap();
        assert_eq!(text, "a,1\nb,2\n");
        let gaps = std::fs::read_to_string(layout.gaps_summary()).unwrap();
        assert_eq!(gaps, "a 1 2 3 4 5\n");
    }
}
