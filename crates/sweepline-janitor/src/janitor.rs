//! Core Janitor implementation: one sweep of one store instance

use crate::report::{aggregate, InstanceReport, RootReport};
use crate::{JanitorConfig, JanitorError};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sweepline_domain::{
    Disposition, EvictionPolicy, Reason, RecordLayout, RootConfig, Snapshot, TreeStore, UpdateBatch,
};

/// Paths selected for deletion in one batch
///
/// Each invocation builds its own manifests; nothing is shared between
/// sweeps.
#[derive(Debug, Default)]
pub struct DeletionManifest {
    updates: UpdateBatch,
}

impl DeletionManifest {
    /// Empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` for deletion
    pub fn push(&mut self, path: String) {
        self.updates.insert(path, Value::Null);
    }

    /// Number of paths marked
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Whether nothing is marked
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Marked paths in order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.updates.keys().map(String::as_str)
    }

    /// Multi-path update deleting every marked path
    pub fn into_batch(self) -> UpdateBatch {
        self.updates
    }
}

/// Janitor service for retention sweeps
///
/// Responsible for:
/// - Reading each configured root and classifying its records
/// - Collecting deletable paths into batched deletes
/// - Reporting per-root outcome counts
///
/// A `Janitor` is stateless across sweeps; the current time is passed in.
///
/// # Examples
///
/// ```
/// use sweepline_janitor::{Janitor, JanitorConfig};
/// use sweepline_store::MemoryStore;
/// use chrono::{TimeZone, Utc};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::from_value(json!({
///     "BESAUNTCT": {"old": {"updateTime": "2025-01-01T07:00:00"}}
/// }));
/// let janitor = Janitor::new(JanitorConfig::reference_deployment())?;
///
/// let now = Utc.with_ymd_and_hms(2025, 1, 1, 5, 0, 0).unwrap();
/// let report = janitor.sweep(&store, now).await?;
/// assert_eq!(report.total.deleted, 1);
/// println!("{}", report.summary());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Janitor {
    policy: EvictionPolicy,
    roots: Vec<RootConfig>,
    nested_root: Option<RootConfig>,
    dry_run: bool,
}

impl Janitor {
    /// Create a new Janitor from a validated configuration
    pub fn new(config: JanitorConfig) -> Result<Self, JanitorError> {
        config.validate()?;

        Ok(Self {
            policy: config.policy()?,
            roots: config.roots,
            nested_root: config.nested_root,
            dry_run: config.dry_run,
        })
    }

    /// Eviction policy in use
    pub fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }

    /// Whether deletes are suppressed
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Perform a complete sweep of one store
    ///
    /// 1. Sweeps the generic roots, in configured order, with one batched delete
    /// 2. Sweeps the nested root, if configured, with its own batched delete
    ///
    /// Any store failure aborts the sweep. Deletes already applied by an
    /// earlier stage stay applied.
    pub async fn sweep<S: TreeStore>(&self, store: &S, now: DateTime<Utc>) -> Result<InstanceReport, JanitorError> {
        let mut reports = self.sweep_roots(store, now).await?;

        if let Some(nested) = &self.nested_root {
            reports.push(self.sweep_nested_root(store, nested, now).await?);
        }

        Ok(aggregate(reports).dry_run(self.dry_run))
    }

    /// Sweep every generic root, then delete all their expired records in one batch
    async fn sweep_roots<S: TreeStore>(&self, store: &S, now: DateTime<Utc>) -> Result<Vec<RootReport>, JanitorError> {
        let mut manifest = DeletionManifest::new();
        let mut reports = Vec::with_capacity(self.roots.len());

        for root in &self.roots {
            let snapshot = read_root(store, root).await?;
            reports.push(self.scan_root(root, &snapshot, RecordLayout::Fallback, now, &mut manifest));
        }

        self.commit(store, manifest).await?;
        Ok(reports)
    }

    /// Sweep the nested root, where timestamps live only under `Devices`
    async fn sweep_nested_root<S: TreeStore>(
        &self,
        store: &S,
        root: &RootConfig,
        now: DateTime<Utc>,
    ) -> Result<RootReport, JanitorError> {
        let mut manifest = DeletionManifest::new();

        let snapshot = read_root(store, root).await?;
        let report = self.scan_root(root, &snapshot, RecordLayout::DevicesOnly, now, &mut manifest);

        self.commit(store, manifest).await?;
        Ok(report)
    }

    /// Classify every child of a root snapshot
    ///
    /// Deletable records are added to `manifest`; nothing is written here.
    fn scan_root(
        &self,
        root: &RootConfig,
        snapshot: &Snapshot,
        layout: RecordLayout,
        now: DateTime<Utc>,
        manifest: &mut DeletionManifest,
    ) -> RootReport {
        if snapshot.is_empty() {
            tracing::info!(root = %root.path, "Root is empty, nothing to sweep");
            return RootReport::empty(&root.path);
        }

        let mut report = RootReport::new(&root.path);
        snapshot.for_each(|record| {
            let classification = self.policy.classify(record, layout, now, root);
            let disposition = classification.disposition();

            match (disposition, classification.reason) {
                (Disposition::Delete, _) => manifest.push(root.child_path(&record.key)),
                (_, Reason::InvalidJson | Reason::InvalidTime) => {
                    tracing::warn!(
                        root = %root.path,
                        key = %record.key,
                        reason = classification.reason.as_str(),
                        "Keeping record with unreadable timestamp"
                    );
                }
                _ => {
                    tracing::debug!(
                        root = %root.path,
                        key = %record.key,
                        reason = classification.reason.as_str(),
                        age_hours = ?classification.age_hours,
                        "Keeping record"
                    );
                }
            }

            report.record(disposition);
        });

        tracing::info!(
            root = %root.path,
            deleted = report.deleted,
            kept = report.kept,
            skipped = report.skipped,
            "Root swept"
        );
        report
    }

    /// Issue one batched delete for a manifest
    async fn commit<S: TreeStore>(&self, store: &S, manifest: DeletionManifest) -> Result<(), JanitorError> {
        if manifest.is_empty() {
            return Ok(());
        }

        if self.dry_run {
            tracing::info!("DRY RUN: Would delete {} records", manifest.len());
            return Ok(());
        }

        let count = manifest.len();
        store
            .multi_update(manifest.into_batch())
            .await
            .map_err(|e| JanitorError::Store(e.to_string()))?;

        tracing::info!("Deleted {} records in one batch", count);
        Ok(())
    }
}

async fn read_root<S: TreeStore>(store: &S, root: &RootConfig) -> Result<Snapshot, JanitorError> {
    store
        .get(&root.path)
        .await
        .map_err(|e| JanitorError::Store(format!("reading '{}': {}", root.path, e)))
}
