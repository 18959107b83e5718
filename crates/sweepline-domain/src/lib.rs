//! Sweepline Domain Layer
//!
//! This crate contains the retention decision logic and the domain model the
//! rest of the workspace builds on. It performs no I/O: stores and clocks are
//! reached only through the traits in [`traits`].
//!
//! ## Key Concepts
//!
//! - **Root**: a collection that is swept, with keys it must never delete
//! - **Snapshot**: one consistent read of a root's immediate children
//! - **Normalized record**: a stored value folded into one canonical shape
//! - **Eviction policy**: age threshold and reference timezone that decide
//!   delete / keep / skip
//!
//! ## Architecture
//!
//! - Pure decision logic only
//! - Infrastructure implementations live in other crates
//! - Trait definitions for all external interactions

#![warn(missing_docs)]
#![warn(clippy::all)]

mod iso;
pub mod policy;
pub mod record;
pub mod root;
pub mod snapshot;
pub mod traits;

// Re-exports for convenience
pub use policy::{Classification, Disposition, EvictionPolicy, Reason};
pub use record::{NormalizedRecord, RecordLayout};
pub use root::RootConfig;
pub use snapshot::{Record, Snapshot};
pub use traits::{Clock, FixedClock, SystemClock, TreeStore, UpdateBatch};
