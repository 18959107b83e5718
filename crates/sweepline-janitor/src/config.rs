//! Configuration for Janitor operations
//!
//! Defines the roots to sweep, the retention threshold, the reference
//! timezone and the optional sweep schedule.

use crate::JanitorError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use sweepline_domain::policy::{DEFAULT_RETENTION_HOURS, DEFAULT_TIMEZONE};
use sweepline_domain::{EvictionPolicy, RootConfig};

/// Configuration for the Janitor service
///
/// # Examples
///
/// ```
/// use sweepline_janitor::JanitorConfig;
/// use sweepline_domain::RootConfig;
///
/// let config = JanitorConfig {
///     roots: vec![RootConfig::new("BESAUNTCT").with_exempt("SetRuContent")],
///     ..Default::default()
/// };
/// assert_eq!(config.retention_hours, 3.0);
/// assert!(config.validate().is_ok());
///
/// // Nothing to sweep is a configuration error
/// assert!(JanitorConfig::default().validate().is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JanitorConfig {
    /// Roots swept with the generic normalizer, in order
    /// Deletions for all of them are issued as one batch
    #[serde(default)]
    pub roots: Vec<RootConfig>,

    /// Root whose records always keep their timestamp under `Devices`
    /// Swept as a separate stage with its own batch
    #[serde(default)]
    pub nested_root: Option<RootConfig>,

    /// Records older than this many hours are deleted
    /// Default: 3 hours
    #[serde(default = "default_retention_hours")]
    pub retention_hours: f64,

    /// IANA timezone naive timestamps are interpreted in
    /// Default: Asia/Ho_Chi_Minh (UTC+7)
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Dry-run mode: report what would be deleted without deleting
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,

    /// Run a sweep on this schedule (in minutes) in addition to triggers
    /// Default: none (trigger-only)
    #[serde(default)]
    pub sweep_interval_minutes: Option<u64>,
}

fn default_retention_hours() -> f64 {
    DEFAULT_RETENTION_HOURS
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.name().to_string()
}

impl Default for JanitorConfig {
    /// Reference threshold and timezone, no roots
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            nested_root: None,
            retention_hours: default_retention_hours(),
            timezone: default_timezone(),
            dry_run: false,
            sweep_interval_minutes: None,
        }
    }
}

impl JanitorConfig {
    /// Roots and exemptions of the reference deployment
    ///
    /// - `BESAUNTCT`, `SetDevicesNV`, `SetDevicesNV2`, `SetDevicesVNGDH`
    ///   exempting `SetRuContent`
    /// - nested root `VNGDH1` exempting `SetRuContents`
    pub fn reference_deployment() -> Self {
        let roots = ["BESAUNTCT", "SetDevicesNV", "SetDevicesNV2", "SetDevicesVNGDH"]
            .into_iter()
            .map(|path| RootConfig::new(path).with_exempt("SetRuContent"))
            .collect();

        Self {
            roots,
            nested_root: Some(RootConfig::new("VNGDH1").with_exempt("SetRuContents")),
            ..Default::default()
        }
    }

    /// Check the configuration before any sweep runs
    pub fn validate(&self) -> Result<(), JanitorError> {
        if self.roots.is_empty() && self.nested_root.is_none() {
            return Err(JanitorError::Config("no roots configured".to_string()));
        }

        let mut seen = HashSet::new();
        for root in self.roots.iter().chain(self.nested_root.iter()) {
            root.validate().map_err(JanitorError::Config)?;
            if !seen.insert(root.path.as_str()) {
                return Err(JanitorError::Config(format!("root '{}' configured twice", root.path)));
            }
        }

        if !self.retention_hours.is_finite() || self.retention_hours < 0.0 {
            return Err(JanitorError::Config(format!(
                "retention_hours must be a non-negative number, got {}",
                self.retention_hours
            )));
        }

        if let Some(minutes) = self.sweep_interval_minutes {
            if minutes == 0 {
                return Err(JanitorError::Config(
                    "sweep_interval_minutes must be greater than zero".to_string(),
                ));
            }
            if minutes.checked_mul(60).is_none() {
                return Err(JanitorError::Config(format!(
                    "sweep_interval_minutes is too large: {}",
                    minutes
                )));
            }
        }

        self.tz()?;
        Ok(())
    }

    /// Parsed reference timezone
    pub fn tz(&self) -> Result<Tz, JanitorError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| JanitorError::Config(format!("invalid timezone '{}': {}", self.timezone, e)))
    }

    /// Eviction policy for this configuration
    pub fn policy(&self) -> Result<EvictionPolicy, JanitorError> {
        Ok(EvictionPolicy::new(self.retention_hours, self.tz()?))
    }

    /// Get sweep interval as Duration, if scheduled sweeps are enabled
    ///
    /// An interval too large to express in seconds counts as unscheduled;
    /// `validate` rejects it.
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_minutes
            .and_then(|minutes| minutes.checked_mul(60))
            .map(Duration::from_secs)
    }
}
