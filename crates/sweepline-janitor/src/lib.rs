//! Sweepline Janitor
//!
//! Retention sweeps over hierarchical realtime-database trees.
//!
//! # Overview
//!
//! The Janitor is responsible for:
//! - **Sweeping roots**: reading each configured root and classifying every record
//! - **Batched deletes**: removing expired records in one multi-path update per stage
//! - **Reporting**: per-root deleted / kept / skipped counts and their totals
//! - **Metrics collection**: cumulative counters across sweeps for health output
//!
//! # Sweep stages
//!
//! | Stage | Roots | Timestamp lookup | Delete |
//! |-------|-------|------------------|--------|
//! | **Generic** | `roots`, in order | `Devices.updateTime`, then `updateTime` | one batch for all roots |
//! | **Nested** | `nested_root` | `Devices.updateTime` only | its own batch |
//!
//! Records without a usable timestamp are kept. Exempt keys are skipped and
//! never decoded.
//!
//! # Usage
//!
//! ## One-time Sweep
//!
//! ```no_run
//! use std::sync::Arc;
//! use sweepline_domain::SystemClock;
//! use sweepline_janitor::{Janitor, JanitorConfig, StoreInstance, Sweeper};
//! use sweepline_store::RestStore;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RestStore::new("https://demo.firebasedatabase.app", None, Duration::from_secs(30))?;
//! let janitor = Janitor::new(JanitorConfig::reference_deployment())?;
//! let sweeper = Sweeper::new(janitor, vec![StoreInstance::new("default", store)], Arc::new(SystemClock))?;
//!
//! let outcome = sweeper.trigger().await?;
//! println!("{}", outcome.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Scheduled Sweeps
//!
//! See [`JanitorWorker`].
//!
//! # Configuration
//!
//! The Janitor can be configured via TOML:
//!
//! ```toml
//! [janitor]
//! retention_hours = 3
//! timezone = "Asia/Ho_Chi_Minh"
//! dry_run = false
//! sweep_interval_minutes = 15
//!
//! [[janitor.roots]]
//! path = "BESAUNTCT"
//! exempt_keys = ["SetRuContent"]
//!
//! [janitor.nested_root]
//! path = "VNGDH1"
//! exempt_keys = ["SetRuContents"]
//! ```

#![warn(missing_docs)]

mod error;
mod config;
mod metrics;
mod janitor;
pub mod report;
mod sweeper;
mod worker;

pub use error::JanitorError;
pub use config::JanitorConfig;
pub use metrics::JanitorMetrics;
pub use janitor::{DeletionManifest, Janitor};
pub use report::{aggregate, InstanceReport, RootNote, RootReport, SweepOutcome, SweepTotals};
pub use sweeper::{StoreInstance, Sweeper};
pub use worker::JanitorWorker;
