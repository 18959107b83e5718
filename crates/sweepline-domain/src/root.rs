//! Root module - the collections a sweep walks

use serde::{Deserialize, Serialize};

/// Characters the realtime database rejects inside a path segment
const FORBIDDEN_PATH_CHARS: [char; 5] = ['.', '#', '$', '[', ']'];

/// A root collection to sweep, with the child keys it must never delete
///
/// Exempt keys are compared case-insensitively against child keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootConfig {
    /// Path of the collection (e.g., "BESAUNTCT")
    pub path: String,

    /// Child keys that are always retained
    #[serde(default)]
    pub exempt_keys: Vec<String>,
}

impl RootConfig {
    /// Create a root with no exempt keys
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            exempt_keys: Vec::new(),
        }
    }

    /// Add an exempt key
    pub fn with_exempt(mut self, key: impl Into<String>) -> Self {
        self.exempt_keys.push(key.into());
        self
    }

    /// Whether a child key is protected from deletion
    ///
    /// # Examples
    ///
    /// ```
    /// use sweepline_domain::RootConfig;
    ///
    /// let root = RootConfig::new("BESAUNTCT").with_exempt("SetRuContent");
    /// assert!(root.is_exempt("setrucontent"));
    /// assert!(!root.is_exempt("device-42"));
    /// ```
    pub fn is_exempt(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.exempt_keys.iter().any(|exempt| exempt.to_lowercase() == key)
    }

    /// Full store path of a child under this root
    pub fn child_path(&self, key: &str) -> String {
        format!("{}/{}", self.path, key)
    }

    /// Check that the path can be addressed in the store
    pub fn validate(&self) -> Result<(), String> {
        if self.path.is_empty() {
            return Err("root path must not be empty".to_string());
        }
        if self.path.split('/').any(str::is_empty) {
            return Err(format!("root path '{}' has an empty segment", self.path));
        }
        if let Some(c) = self.path.chars().find(|c| FORBIDDEN_PATH_CHARS.contains(c)) {
            return Err(format!("root path '{}' contains forbidden character '{}'", self.path, c));
        }
        Ok(())
    }
}
