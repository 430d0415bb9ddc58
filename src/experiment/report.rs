use std::io;

use serde::Serialize;

use super::trial::TrialRecord;
use crate::recovery::Strategy;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Aggregate of all trials of one (strategy, n, p) cell.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CellSummary {
    pub strategy: Strategy,
    pub n: usize,
    pub noise_rate: f64,
    pub m: usize,
    pub threshold: usize,
    pub trials: usize,
    pub recovered_count: usize,
    pub exact_count: usize,
    pub timeouts: usize,
    pub errors: usize,
    pub mean_elapsed_ms: f64,
}

impl CellSummary {
    fn empty(record: &TrialRecord) -> Self {
        Self {
            strategy: record.strategy,
            n: record.n,
            noise_rate: record.noise_rate,
            m: record.m,
            threshold: record.threshold,
            trials: 0,
            recovered_count: 0,
            exact_count: 0,
            timeouts: 0,
            errors: 0,
            mean_elapsed_ms: 0.0,
        }
    }

    fn matches(&self, record: &TrialRecord) -> bool {
        self.strategy == record.strategy
            && self.n == record.n
            && self.m == record.m
            && self.noise_rate.to_bits() == record.noise_rate.to_bits()
    }

    pub fn recovery_rate(&self) -> f64 {
        if self.trials == 0 {
            return 0.0;
        }
        self.recovered_count as f64 / self.trials as f64
    }
}

/// Group records by cell, keeping the order in which cells first appear.
pub fn summarize(records: &[TrialRecord]) -> Vec<CellSummary> {
    let mut cells: Vec<CellSummary> = Vec::new();
    let mut elapsed_sums: Vec<f64> = Vec::new();
    for record in records {
        let idx = match cells.iter().position(|c| c.matches(record)) {
            Some(idx) => idx,
            None => {
                cells.push(CellSummary::empty(record));
                elapsed_sums.push(0.0);
                cells.len() - 1
            }
        };
        let cell = &mut cells[idx];
        cell.trials += 1;
        cell.recovered_count += usize::from(record.accepted);
        cell.exact_count += usize::from(record.exact_match);
        cell.timeouts += usize::from(record.hit_budget());
        cell.errors += usize::from(record.is_error());
        elapsed_sums[idx] += record.elapsed_ms;
    }
    for (cell, sum) in cells.iter_mut().zip(elapsed_sums) {
        cell.mean_elapsed_ms = sum / cell.trials as f64;
    }
    cells
}

/// Per-trial results table as CSV with a header row.
pub fn write_trials<W: io::Write>(records: &[TrialRecord], writer: W) -> Result<(), ReportError> {
    write_rows(records, writer)
}

/// Per-cell summary table as CSV with a header row.
pub fn write_summary<W: io::Write>(
    summaries: &[CellSummary],
    writer: W,
) -> Result<(), ReportError> {
    write_rows(summaries, writer)
}

fn write_rows<T: Serialize, W: io::Write>(rows: &[T], writer: W) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
