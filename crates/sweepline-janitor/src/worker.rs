//! Background worker for scheduled sweeps

use crate::{JanitorError, JanitorMetrics, Sweeper};
use std::sync::Arc;
use sweepline_domain::TreeStore;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Background worker that triggers the sweeper on a schedule
///
/// Scheduled sweeps share the sweeper's run-lock with HTTP triggers, so a
/// tick that lands while another sweep is running is skipped.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use sweepline_domain::SystemClock;
/// use sweepline_janitor::{Janitor, JanitorConfig, JanitorWorker, StoreInstance, Sweeper};
/// use sweepline_store::MemoryStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let janitor = Janitor::new(JanitorConfig::reference_deployment())?;
///     let instances = vec![StoreInstance::new("default", MemoryStore::new())];
///     let sweeper = Arc::new(Sweeper::new(janitor, instances, Arc::new(SystemClock))?);
///
///     // Run every 15 minutes until Ctrl+C
///     let worker = JanitorWorker::new(sweeper, Duration::from_secs(15 * 60))?;
///     worker.run().await?;
///     Ok(())
/// }
/// ```
pub struct JanitorWorker<S> {
    sweeper: Arc<Sweeper<S>>,
    interval: Duration,
}

impl<S: TreeStore> JanitorWorker<S> {
    /// Create a worker sweeping every `interval`
    pub fn new(sweeper: Arc<Sweeper<S>>, interval: Duration) -> Result<Self, JanitorError> {
        if interval.is_zero() {
            return Err(JanitorError::Worker("sweep interval must be greater than zero".to_string()));
        }

        Ok(Self { sweeper, interval })
    }

    /// Run the worker until a shutdown signal (Ctrl+C) is received
    ///
    /// Failed sweeps are logged and retried on the next tick.
    pub async fn run(&self) -> Result<(), JanitorError> {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("Janitor worker started (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::debug!("Starting scheduled sweep");
                    // Errors are already counted and logged by the sweeper
                    let _ = self.sweeper.trigger().await;
                }
                signal = tokio::signal::ctrl_c() => {
                    signal.map_err(|e| JanitorError::Worker(e.to_string()))?;
                    tracing::info!("Shutdown signal received, stopping janitor");
                    break;
                }
            }
        }

        tracing::info!("Janitor stopped. Final metrics:\n{}", self.metrics().summary());
        Ok(())
    }

    /// Run for a specific number of cycles
    ///
    /// A cycle rejected because another sweep is running still counts; any
    /// other failure stops the worker.
    pub async fn run_cycles(&self, cycles: usize) -> Result<(), JanitorError> {
        let mut ticker = interval(self.interval);

        tracing::info!(
            "Janitor worker started for {} cycles (interval: {:?})",
            cycles,
            self.interval
        );

        for cycle in 0..cycles {
            ticker.tick().await;

            tracing::debug!("Starting sweep cycle {}/{}", cycle + 1, cycles);

            match self.sweeper.trigger().await {
                Ok(_) => {}
                Err(JanitorError::AlreadyRunning) => {
                    tracing::info!("Sweep {}/{} skipped: another sweep is running", cycle + 1, cycles);
                }
                Err(e) => {
                    tracing::error!("Sweep {}/{} failed: {}", cycle + 1, cycles, e);
                    return Err(e);
                }
            }
        }

        tracing::info!(
            "Janitor finished {} cycles. Final metrics:\n{}",
            cycles,
            self.metrics().summary()
        );
        Ok(())
    }

    /// Current cumulative metrics of the underlying sweeper
    pub fn metrics(&self) -> JanitorMetrics {
        self.sweeper.metrics()
    }

    /// Reset the sweeper's metrics counters
    pub fn reset_metrics(&self) {
        self.sweeper.reset_metrics();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Janitor, JanitorConfig, StoreInstance};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use sweepline_domain::{FixedClock, RootConfig};
    use sweepline_store::MemoryStore;

    fn worker(store: MemoryStore) -> JanitorWorker<MemoryStore> {
        let janitor = Janitor::new(JanitorConfig {
            roots: vec![RootConfig::new("BESAUNTCT").with_exempt("SetRuContent")],
            ..Default::default()
        })
        .unwrap();
        let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 1, 1, 5, 0, 0).unwrap()));
        let sweeper = Sweeper::new(janitor, vec![StoreInstance::new("default", store)], clock).unwrap();

        JanitorWorker::new(Arc::new(sweeper), Duration::from_millis(5)).unwrap()
    }

    #[test]
    fn test_zero_interval_rejected() {
        let janitor = Janitor::new(JanitorConfig::reference_deployment()).unwrap();
        let sweeper = Sweeper::new(
            janitor,
            vec![StoreInstance::new("default", MemoryStore::new())],
            Arc::new(FixedClock(Utc::now())),
        )
        .unwrap();

        assert!(matches!(
            JanitorWorker::new(Arc::new(sweeper), Duration::ZERO),
            Err(JanitorError::Worker(_))
        ));
    }

    #[tokio::test]
    async fn test_run_cycles() {
        let store = MemoryStore::from_value(json!({
            "BESAUNTCT": {"A": {"updateTime": "2025-01-01T07:00:00"}}
        }));
        let worker = worker(store);

        worker.run_cycles(2).await.unwrap();

        let metrics = worker.metrics();
        assert_eq!(metrics.sweep_count, 2);
        // Only the first cycle found something to delete
        assert_eq!(metrics.deleted, 1);
    }

    #[tokio::test]
    async fn test_run_cycles_stops_on_store_failure() {
        let store = MemoryStore::new();
        store.set_available(false);
        let worker = worker(store);

        assert!(matches!(worker.run_cycles(3).await, Err(JanitorError::Store(_))));
        assert_eq!(worker.metrics().failed_count, 1);
    }

    #[tokio::test]
    async fn test_reset_metrics() {
        let worker = worker(MemoryStore::new());

        worker.run_cycles(1).await.unwrap();
        assert_eq!(worker.metrics().sweep_count, 1);

        worker.reset_metrics();
        assert_eq!(worker.metrics().sweep_count, 0);
    }
}
