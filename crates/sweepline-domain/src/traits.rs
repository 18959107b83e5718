//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the sweep logic and the
//! infrastructure around it. Implementations live in other crates.

use crate::snapshot::Snapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Path-keyed writes applied in one multi-path update; `Value::Null` deletes
pub type UpdateBatch = BTreeMap<String, Value>;

/// Trait for the hierarchical key-value store being swept
///
/// Implemented by the infrastructure layer (sweepline-store)
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Error type for store operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the subtree at `path`
    async fn get(&self, path: &str) -> Result<Snapshot, Self::Error>;

    /// Apply every write in `updates` atomically in one call
    async fn multi_update(&self, updates: UpdateBatch) -> Result<(), Self::Error>;

    /// Whether the store is reachable
    async fn ready(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: TreeStore + ?Sized> TreeStore for Arc<T> {
    type Error = T::Error;

    async fn get(&self, path: &str) -> Result<Snapshot, Self::Error> {
        (**self).get(path).await
    }

    async fn multi_update(&self, updates: UpdateBatch) -> Result<(), Self::Error> {
        (**self).multi_update(updates).await
    }

    async fn ready(&self) -> bool {
        (**self).ready().await
    }
}

/// Source of the current time
///
/// Injected so sweeps can run against a fixed instant in tests.
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct NullStore;

    #[async_trait]
    impl TreeStore for NullStore {
        type Error = std::io::Error;

        async fn get(&self, _path: &str) -> Result<Snapshot, Self::Error> {
            Ok(Snapshot::absent())
        }

        async fn multi_update(&self, _updates: UpdateBatch) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_ready_defaults_to_true() {
        assert!(NullStore.ready().await);
        assert!(!NullStore.get("anything").await.unwrap().exists());
    }

    #[tokio::test]
    async fn test_shared_store_forwards() {
        let store = Arc::new(NullStore);
        assert!(store.ready().await);
        assert!(store.multi_update(UpdateBatch::new()).await.is_ok());
    }

    #[test]
    fn test_fixed_clock() {
        let instant = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let clock = FixedClock(instant);
        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now(), clock.now());
    }
}
