//! Metrics collection for Janitor operations

use crate::report::SweepOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Cumulative metrics across sweeps
///
/// Tracks completed, failed and rejected sweeps plus record totals summed
/// over every instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JanitorMetrics {
    /// Sweeps completed successfully
    pub sweep_count: u64,

    /// Sweeps that failed (store error or timeout)
    pub failed_count: u64,

    /// Triggers rejected because a sweep was already running
    pub overlap_count: u64,

    /// Records deleted (or selected, in dry-run mode)
    pub deleted: u64,

    /// Records kept
    pub kept: u64,

    /// Exempt records seen
    pub skipped: u64,

    /// When the last successful sweep finished
    pub last_completed_at: Option<DateTime<Utc>>,

    /// Total runtime of successful sweeps in milliseconds
    pub total_runtime_ms: u64,
}

impl JanitorMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed sweep
    pub fn record_sweep(&mut self, outcome: &SweepOutcome, completed_at: DateTime<Utc>, runtime_ms: u64) {
        for report in outcome.instance_reports() {
            self.deleted += report.total.deleted;
            self.kept += report.total.kept;
            self.skipped += report.total.skipped;
        }

        self.sweep_count += 1;
        self.last_completed_at = Some(completed_at);
        self.total_runtime_ms += runtime_ms;
    }

    /// Record a failed sweep
    pub fn record_failure(&mut self) {
        self.failed_count += 1;
    }

    /// Record a trigger rejected by the run-lock
    pub fn record_overlap(&mut self) {
        self.overlap_count += 1;
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let last = self
            .last_completed_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());

        [
            "Janitor Metrics Summary".to_string(),
            "======================".to_string(),
            format!("Sweep cycles: {}", self.sweep_count),
            format!("Failed sweeps: {}", self.failed_count),
            format!("Rejected overlaps: {}", self.overlap_count),
            format!("Total runtime: {}ms", self.total_runtime_ms),
            format!("Last completed: {}", last),
            String::new(),
            format!("Deleted: {}", self.deleted),
            format!("Kept: {}", self.kept),
            format!("Skipped: {}", self.skipped),
        ]
        .join("\n")
    }
}
