//! Sweepline Storage Layer
//!
//! Implements the [`TreeStore`](sweepline_domain::TreeStore) trait for the
//! realtime database.
//!
//! # Architecture
//!
//! - [`RestStore`]: the database's REST interface (`GET /path.json`,
//!   multi-path `PATCH /.json`)
//! - [`Credentials`]: database secret or service-account key for the REST
//!   interface
//! - [`MemoryStore`]: an in-process JSON tree with the same semantics, for
//!   tests and local runs
//!
//! # Examples
//!
//! ```no_run
//! use sweepline_store::{Credentials, RestStore};
//! use std::time::Duration;
//!
//! let store = RestStore::new(
//!     "https://example-default-rtdb.asia-southeast1.firebasedatabase.app",
//!     Some(Credentials::ServiceAccountFile("/etc/secrets/firebase-key.json".into())),
//!     Duration::from_secs(30),
//! ).unwrap();
//! // Store is now ready for sweep operations
//! ```

#![warn(missing_docs)]

mod credentials;
mod memory;
mod rest;

pub use credentials::Credentials;
pub use memory::MemoryStore;
pub use rest::RestStore;

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport error (URL stripped so credentials never reach logs)
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// Store answered with a non-success status
    #[error("Store returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as returned
        body: String,
    },

    /// Database URL cannot be used as a base URL
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    /// Path has an empty segment
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Credentials could not be turned into a request credential
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Store switched off (memory store only)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Http(e.without_url())
    }
}

/// Split a slash-separated store path into segments
///
/// Leading and trailing slashes are ignored; the empty path is the store root.
pub(crate) fn split_path(path: &str) -> Result<Vec<&str>, StoreError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("").unwrap(), Vec::<&str>::new());
        assert_eq!(split_path("/").unwrap(), Vec::<&str>::new());
        assert_eq!(split_path("VNGDH1").unwrap(), vec!["VNGDH1"]);
        assert_eq!(split_path("/VNGDH1/abc/").unwrap(), vec!["VNGDH1", "abc"]);
        assert!(matches!(split_path("a//b"), Err(StoreError::InvalidPath(_))));
    }
}
