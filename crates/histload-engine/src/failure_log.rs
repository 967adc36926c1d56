//! Append-only failure log, written while the run progresses.
//!
//! The timestamp header goes out before the first table runs and each
//! `<table>: <error>` line is appended as soon as that table fails, so a
//! run that dies part way still leaves every failure seen so far on disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Line written when every table succeeded or was skipped.
pub const NO_FAILURES_LINE: &str = "No failures in this run";

/// Header that opens one run's block.
pub fn render_header(run_started: DateTime<Utc>) -> String {
    format!(
        "\n----------{}----------\n",
        run_started.format("%Y/%m/%d/%H/%M")
    )
}

pub fn render_failure(table: &str, message: &str) -> String {
    format!("{table}: {message}\n")
}

/// Handle on the log for a single run.
///
/// A log that cannot be written does not change the run outcome; each
/// write error is logged and the summary still carries every failure.
#[derive(Debug)]
pub(crate) struct FailureLog {
    path: PathBuf,
    job: String,
    failures: usize,
}

impl FailureLog {
    /// Append the run header, creating the file if needed.
    pub(crate) fn start(path: &Path, job: &str, run_started: DateTime<Utc>) -> Self {
        let log = Self {
            path: path.to_path_buf(),
            job: job.to_string(),
            failures: 0,
        };
        log.append(&render_header(run_started));
        log
    }

    pub(crate) fn record(&mut self, table: &str, message: &str) {
        self.failures += 1;
        if self.append(&render_failure(table, message)) {
            tracing::debug!(job = %self.job, table, "Recorded table failure");
        }
    }

    /// Close the run's block; a clean run gets the no-failures line.
    pub(crate) fn finish(self) {
        if self.failures == 0 {
            self.append(&format!("{NO_FAILURES_LINE}\n"));
        }
        tracing::info!(
            job = %self.job,
            path = %self.path.display(),
            failures = self.failures,
            "Failure log updated"
        );
    }

    fn append(&self, text: &str) -> bool {
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(text.as_bytes()));

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    job = %self.job,
                    path = %self.path.display(),
                    error = %e,
                    "Failed to write failure log"
                );
                false
            }
        }
    }
}
