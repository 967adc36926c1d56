//! Per-table and per-run result types.

use std::fmt;

/// Final state of one configured table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOutcome {
    Succeeded,
    /// Inactive in configuration; nothing was extracted or loaded.
    Skipped,
    Failed,
}

impl fmt::Display for TableOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::Skipped => f.write_str("skipped"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Result of one table run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    pub table: String,
    pub outcome: TableOutcome,
    /// Rows the warehouse reported loading; set when succeeded.
    pub affected_rows: Option<i64>,
    /// Error message; set when failed.
    pub error: Option<String>,
    /// Chunks staged before the table finished or failed.
    pub chunks: u32,
    pub duration_secs: f64,
}

impl LoadResult {
    pub fn skipped(table: &str) -> Self {
        Self {
            table: table.to_string(),
            outcome: TableOutcome::Skipped,
            affected_rows: None,
            error: None,
            chunks: 0,
            duration_secs: 0.0,
        }
    }
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub succeeded: usize,
    /// Failed table names in configuration order.
    pub failed: Vec<String>,
    pub results: Vec<LoadResult>,
    /// `(table, message)` for each failed table, in run order.
    pub failure_entries: Vec<(String, String)>,
    pub duration_secs: f64,
}

impl RunSummary {
    pub fn record(&mut self, result: LoadResult) {
        match result.outcome {
            TableOutcome::Succeeded => self.succeeded += 1,
            TableOutcome::Failed => {
                self.failed.push(result.table.clone());
                self.failure_entries.push((
                    result.table.clone(),
                    result.error.clone().unwrap_or_default(),
                ));
            }
            TableOutcome::Skipped => {}
        }
        self.results.push(result);
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == TableOutcome::Skipped)
            .count()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
