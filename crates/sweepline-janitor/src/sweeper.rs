//! Sweeps across every configured store instance

use crate::report::SweepOutcome;
use crate::{Janitor, JanitorError, JanitorMetrics};
use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use sweepline_domain::{Clock, TreeStore};
use tracing::Instrument;
use uuid::Uuid;

/// A labelled store handle
#[derive(Debug)]
pub struct StoreInstance<S> {
    /// Label used in reports and health output
    pub label: String,
    /// Store handle
    pub store: S,
}

impl<S> StoreInstance<S> {
    /// Label a store
    pub fn new(label: impl Into<String>, store: S) -> Self {
        Self {
            label: label.into(),
            store,
        }
    }
}

/// Runs the janitor against every instance, one sweep at a time
///
/// A second trigger while a sweep is running is rejected with
/// [`JanitorError::AlreadyRunning`] instead of queueing.
pub struct Sweeper<S> {
    janitor: Janitor,
    instances: Vec<StoreInstance<S>>,
    clock: Arc<dyn Clock>,
    run_lock: tokio::sync::Mutex<()>,
    metrics: Mutex<JanitorMetrics>,
}

impl<S: TreeStore> Sweeper<S> {
    /// Create a sweeper over one or more uniquely labelled instances
    pub fn new(janitor: Janitor, instances: Vec<StoreInstance<S>>, clock: Arc<dyn Clock>) -> Result<Self, JanitorError> {
        if instances.is_empty() {
            return Err(JanitorError::Config("no store instances configured".to_string()));
        }

        let mut labels = HashSet::new();
        for instance in &instances {
            if instance.label.is_empty() {
                return Err(JanitorError::Config("store instance label must not be empty".to_string()));
            }
            if !labels.insert(instance.label.as_str()) {
                return Err(JanitorError::Config(format!(
                    "store instance '{}' configured twice",
                    instance.label
                )));
            }
        }

        Ok(Self {
            janitor,
            instances,
            clock,
            run_lock: tokio::sync::Mutex::new(()),
            metrics: Mutex::new(JanitorMetrics::new()),
        })
    }

    /// Labels of the configured instances, in configured order
    pub fn labels(&self) -> Vec<&str> {
        self.instances.iter().map(|i| i.label.as_str()).collect()
    }

    /// The janitor applied to every instance
    pub fn janitor(&self) -> &Janitor {
        &self.janitor
    }

    /// Run one sweep at the clock's current time
    pub async fn trigger(&self) -> Result<SweepOutcome, JanitorError> {
        self.sweep_at(self.clock.now()).await
    }

    /// Run one sweep evaluated at `now`
    ///
    /// Instances are swept concurrently; the first failing instance fails
    /// the whole invocation.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepOutcome, JanitorError> {
        let _guard = match self.run_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                self.lock_metrics().record_overlap();
                tracing::warn!("Sweep already in progress, rejecting trigger");
                return Err(JanitorError::AlreadyRunning);
            }
        };

        let sweep_id = Uuid::now_v7();
        let span = tracing::info_span!("sweep", %sweep_id);
        self.run(now).instrument(span).await
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<SweepOutcome, JanitorError> {
        let started = Instant::now();
        tracing::info!(
            instances = self.instances.len(),
            dry_run = self.janitor.is_dry_run(),
            %now,
            "Sweep started"
        );

        let sweeps = self.instances.iter().map(|instance| async move {
            self.janitor
                .sweep(&instance.store, now)
                .await
                .map(|report| report.labeled(&instance.label))
                .map_err(|e| match e {
                    JanitorError::Store(msg) => JanitorError::Store(format!("[{}] {}", instance.label, msg)),
                    other => other,
                })
        });

        match try_join_all(sweeps).await {
            Ok(reports) => {
                let outcome = SweepOutcome::from_reports(reports);
                let runtime_ms = started.elapsed().as_millis() as u64;
                self.lock_metrics().record_sweep(&outcome, self.clock.now(), runtime_ms);

                tracing::info!(runtime_ms, "Sweep completed");
                tracing::debug!("\n{}", outcome.summary());
                Ok(outcome)
            }
            Err(e) => {
                self.lock_metrics().record_failure();
                tracing::error!("Sweep failed: {}", e);
                Err(e)
            }
        }
    }

    /// Probe every instance concurrently
    pub async fn readiness(&self) -> Vec<(String, bool)> {
        let probes = self.instances.iter().map(|instance| async move {
            (instance.label.clone(), instance.store.ready().await)
        });
        join_all(probes).await
    }

    /// Snapshot of the cumulative metrics
    pub fn metrics(&self) -> JanitorMetrics {
        self.lock_metrics().clone()
    }

    /// Count a sweep that was abandoned by its caller (for example on timeout)
    pub fn record_failure(&self) {
        self.lock_metrics().record_failure();
    }

    /// Reset the cumulative metrics
    pub fn reset_metrics(&self) {
        self.lock_metrics().reset();
    }

    fn lock_metrics(&self) -> MutexGuard<'_, JanitorMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JanitorConfig;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use sweepline_domain::{FixedClock, RootConfig, Snapshot, UpdateBatch};
    use sweepline_store::{MemoryStore, StoreError};
    use tokio::sync::Notify;

    fn noon_local() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 5, 0, 0).unwrap()
    }

    fn janitor() -> Janitor {
        Janitor::new(JanitorConfig {
            roots: vec![RootConfig::new("BESAUNTCT").with_exempt("SetRuContent")],
            ..Default::default()
        })
        .unwrap()
    }

    fn seeded() -> MemoryStore {
        MemoryStore::from_value(json!({
            "BESAUNTCT": {
                "A": {"updateTime": "2025-01-01T07:00:00"},
                "B": {"updateTime": "2025-01-01T11:00:00"}
            }
        }))
    }

    fn sweeper<S: TreeStore>(instances: Vec<StoreInstance<S>>) -> Sweeper<S> {
        Sweeper::new(janitor(), instances, Arc::new(FixedClock(noon_local()))).unwrap()
    }

    /// Store whose reads block until released
    struct GatedStore {
        inner: MemoryStore,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl TreeStore for GatedStore {
        type Error = StoreError;

        async fn get(&self, path: &str) -> Result<Snapshot, Self::Error> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.get(path).await
        }

        async fn multi_update(&self, updates: UpdateBatch) -> Result<(), Self::Error> {
            self.inner.multi_update(updates).await
        }
    }

    #[test]
    fn test_new_rejects_bad_instances() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(noon_local()));

        let empty: Vec<StoreInstance<MemoryStore>> = Vec::new();
        assert!(Sweeper::new(janitor(), empty, clock.clone()).is_err());

        let duplicate = vec![
            StoreInstance::new("firebase1", MemoryStore::new()),
            StoreInstance::new("firebase1", MemoryStore::new()),
        ];
        assert!(matches!(
            Sweeper::new(janitor(), duplicate, clock),
            Err(JanitorError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_trigger_single_instance() {
        let sweeper = sweeper(vec![StoreInstance::new("default", seeded())]);

        let outcome = sweeper.trigger().await.unwrap();
        match outcome {
            SweepOutcome::Single(report) => {
                assert_eq!(report.total.deleted, 1);
                assert_eq!(report.total.kept, 1);
            }
            other => panic!("expected a single report, got {:?}", other),
        }

        let metrics = sweeper.metrics();
        assert_eq!(metrics.sweep_count, 1);
        assert_eq!(metrics.deleted, 1);
        assert_eq!(metrics.last_completed_at, Some(noon_local()));
    }

    #[tokio::test]
    async fn test_instances_reported_independently() {
        let sweeper = sweeper(vec![
            StoreInstance::new("firebase1", seeded()),
            StoreInstance::new("firebase2", MemoryStore::new()),
        ]);

        let outcome = sweeper.trigger().await.unwrap();
        let SweepOutcome::Fleet { instances } = outcome else {
            panic!("expected per-instance reports");
        };

        assert_eq!(instances["firebase1"].total.deleted, 1);
        assert_eq!(instances["firebase2"].total.deleted, 0);
        assert_eq!(instances["firebase2"].instance.as_deref(), Some("firebase2"));
    }

    #[tokio::test]
    async fn test_failing_instance_fails_sweep() {
        let broken = MemoryStore::new();
        broken.set_available(false);
        let sweeper = sweeper(vec![
            StoreInstance::new("firebase1", seeded()),
            StoreInstance::new("firebase2", broken),
        ]);

        let err = sweeper.trigger().await.unwrap_err();
        assert!(matches!(&err, JanitorError::Store(msg) if msg.contains("firebase2")));
        assert_eq!(sweeper.metrics().failed_count, 1);
        assert_eq!(sweeper.metrics().sweep_count, 0);
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_rejected() {
        let store = GatedStore {
            inner: seeded(),
            entered: Notify::new(),
            release: Notify::new(),
        };
        let sweeper = Arc::new(sweeper(vec![StoreInstance::new("default", store)]));

        let running = {
            let sweeper = sweeper.clone();
            tokio::spawn(async move { sweeper.trigger().await })
        };

        sweeper.instances[0].store.entered.notified().await;
        assert!(matches!(sweeper.trigger().await, Err(JanitorError::AlreadyRunning)));

        sweeper.instances[0].store.release.notify_one();
        assert!(running.await.unwrap().is_ok());

        let metrics = sweeper.metrics();
        assert_eq!(metrics.overlap_count, 1);
        assert_eq!(metrics.sweep_count, 1);
    }

    #[tokio::test]
    async fn test_readiness_per_instance() {
        let down = MemoryStore::new();
        down.set_available(false);
        let sweeper = sweeper(vec![
            StoreInstance::new("firebase1", MemoryStore::new()),
            StoreInstance::new("firebase2", down),
        ]);

        let readiness = sweeper.readiness().await;
        assert_eq!(
            readiness,
            vec![("firebase1".to_string(), true), ("firebase2".to_string(), false)]
        );
    }
}
