//! Reconciliation reports for a sweep
//!
//! One [`RootReport`] per root, summed into an [`InstanceReport`] per store
//! instance. Instances are never summed with each other.
//!
//! # Payload shapes
//!
//! A single instance serializes flat:
//!
//! ```json
//! {"report": [{"root": "BESAUNTCT", "deleted": 1, "kept": 1, "skipped": 1}],
//!  "total": {"deleted": 1, "kept": 1, "skipped": 1}}
//! ```
//!
//! Several instances are nested under `instances`, keyed by label, and each
//! report names its instance in `instance`:
//!
//! ```json
//! {"instances": {"firebase1": {"instance": "firebase1", "report": [], "total": {}},
//!                "firebase2": {"instance": "firebase2", "report": [], "total": {}}}}
//! ```
//!
//! Callers that read labels as top-level keys with a `firebase` field, as
//! older two-database deployments returned them, have to read
//! `instances.<label>` and `instance` instead. Keeping the labels in their
//! own map stops them from colliding with `ok`, `via` and `path` in the
//! HTTP response.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use sweepline_domain::Disposition;

/// Annotation on a root report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootNote {
    /// Root was absent or had no children; no delete was attempted
    Empty,
}

/// Outcome counts for one root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootReport {
    /// Root path
    pub root: String,

    /// Records removed
    #[serde(default)]
    pub deleted: u64,

    /// Records evaluated and retained
    #[serde(default)]
    pub kept: u64,

    /// Exempt records
    #[serde(default)]
    pub skipped: u64,

    /// Set when the root had nothing to sweep
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<RootNote>,
}

impl RootReport {
    /// Zero counts for a root
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            deleted: 0,
            kept: 0,
            skipped: 0,
            note: None,
        }
    }

    /// Report for a root with no children
    pub fn empty(root: impl Into<String>) -> Self {
        Self {
            note: Some(RootNote::Empty),
            ..Self::new(root)
        }
    }

    /// Count one classified record
    pub fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Delete => self.deleted += 1,
            Disposition::Keep => self.kept += 1,
            Disposition::Skip => self.skipped += 1,
        }
    }

    /// Records seen under this root
    pub fn records(&self) -> u64 {
        self.deleted + self.kept + self.skipped
    }
}

/// Sum of root reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepTotals {
    /// Records removed
    pub deleted: u64,
    /// Records evaluated and retained
    pub kept: u64,
    /// Exempt records
    pub skipped: u64,
}

impl SweepTotals {
    fn add(&mut self, report: &RootReport) {
        self.deleted += report.deleted;
        self.kept += report.kept;
        self.skipped += report.skipped;
    }
}

/// Reports and totals for one store instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceReport {
    /// Instance label; absent for single-store deployments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    /// Per-root reports in sweep order
    pub report: Vec<RootReport>,

    /// Sum over `report`
    pub total: SweepTotals,

    /// Set when deletions were computed but not issued
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

impl InstanceReport {
    /// Attach an instance label
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.instance = Some(label.into());
        self
    }

    /// Mark as a dry run
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Generate a summary report
    pub fn summary(&self) -> String {
        let title = match &self.instance {
            Some(label) => format!("Sweep Report ({})", label),
            None => "Sweep Report".to_string(),
        };

        let mut lines = vec![title.clone(), "=".repeat(title.len())];
        if self.dry_run {
            lines.push("DRY RUN: nothing was deleted".to_string());
        }

        for root in &self.report {
            let mut line = format!(
                "  {}: {} deleted, {} kept, {} skipped",
                root.root, root.deleted, root.kept, root.skipped
            );
            if root.note == Some(RootNote::Empty) {
                line.push_str(" (empty)");
            }
            lines.push(line);
        }

        lines.push(format!(
            "  Total: {} deleted, {} kept, {} skipped",
            self.total.deleted, self.total.kept, self.total.skipped
        ));
        lines.join("\n")
    }
}

/// Sum per-root reports into one instance report
pub fn aggregate(reports: Vec<RootReport>) -> InstanceReport {
    let total = reports.iter().fold(SweepTotals::default(), |mut total, report| {
        total.add(report);
        total
    });

    InstanceReport {
        instance: None,
        report: reports,
        total,
        dry_run: false,
    }
}

/// Result of one sweep invocation
///
/// Serializes flat (`{report, total}`) for one instance, and as
/// `{instances: {label: {...}}}` for several.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SweepOutcome {
    /// Single store instance
    Single(InstanceReport),
    /// Several store instances, keyed by label
    Fleet {
        /// Independent report per instance
        instances: BTreeMap<String, InstanceReport>,
    },
}

impl SweepOutcome {
    /// Build from per-instance reports (flat when there is only one)
    pub fn from_reports(mut reports: Vec<InstanceReport>) -> Self {
        if reports.len() == 1 {
            let mut report = reports.remove(0);
            report.instance = None;
            return SweepOutcome::Single(report);
        }

        let instances = reports
            .into_iter()
            .enumerate()
            .map(|(i, report)| {
                let label = report.instance.clone().unwrap_or_else(|| format!("instance{}", i + 1));
                (label, report)
            })
            .collect();
        SweepOutcome::Fleet { instances }
    }

    /// Instance reports in label order
    pub fn instance_reports(&self) -> Vec<&InstanceReport> {
        match self {
            SweepOutcome::Single(report) => vec![report],
            SweepOutcome::Fleet { instances } => instances.values().collect(),
        }
    }

    /// Generate a summary of every instance
    pub fn summary(&self) -> String {
        self.instance_reports()
            .iter()
            .map(|report| report.summary())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
