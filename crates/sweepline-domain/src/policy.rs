//! Eviction policy - decides delete / keep / skip for one record
//!
//! Classification is deterministic and side-effect free. The current time is
//! always passed in by the caller.

use crate::record::{normalize, NormalizedRecord, RecordLayout};
use crate::root::RootConfig;
use crate::snapshot::Record;
use crate::iso;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Retention threshold of the reference deployment, in hours
pub const DEFAULT_RETENTION_HOURS: f64 = 3.0;

/// Canonical timezone of the reference store
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Ho_Chi_Minh;

/// Why a record got its classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    /// Timestamp evaluated against the threshold
    #[serde(rename = "ok")]
    Ok,
    /// Key is exempt for its root
    #[serde(rename = "exempt")]
    Exempt,
    /// String payload was not valid JSON
    #[serde(rename = "invalid_json")]
    InvalidJson,
    /// No usable `updateTime`
    #[serde(rename = "no_updateTime")]
    NoUpdateTime,
    /// `updateTime` could not be parsed
    #[serde(rename = "invalid_time")]
    InvalidTime,
}

impl Reason {
    /// Reason code as it appears in reports and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Ok => "ok",
            Reason::Exempt => "exempt",
            Reason::InvalidJson => "invalid_json",
            Reason::NoUpdateTime => "no_updateTime",
            Reason::InvalidTime => "invalid_time",
        }
    }
}

/// Which report bucket a record lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Older than the threshold; removed
    Delete,
    /// Evaluated and retained (includes records without a usable timestamp)
    Keep,
    /// Exempt; never evaluated
    Skip,
}

/// Outcome of classifying one record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Whether the record should be deleted
    pub deletable: bool,

    /// Why
    pub reason: Reason,

    /// Age in hours; present only when the timestamp parsed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_hours: Option<f64>,
}

impl Classification {
    fn retained(reason: Reason) -> Self {
        Self {
            deletable: false,
            reason,
            age_hours: None,
        }
    }

    /// Report bucket for this outcome
    pub fn disposition(&self) -> Disposition {
        if self.deletable {
            Disposition::Delete
        } else if self.reason == Reason::Exempt {
            Disposition::Skip
        } else {
            Disposition::Keep
        }
    }
}

/// Age-based eviction policy
///
/// # Examples
///
/// ```
/// use sweepline_domain::{EvictionPolicy, Record, RootConfig};
/// use sweepline_domain::record::RecordLayout;
/// use chrono::{TimeZone, Utc};
/// use serde_json::json;
///
/// let policy = EvictionPolicy::default();
/// let root = RootConfig::new("BESAUNTCT");
/// // 12:00 in UTC+7
/// let now = Utc.with_ymd_and_hms(2025, 1, 1, 5, 0, 0).unwrap();
///
/// let record = Record::new("A", json!({"updateTime": "2025-01-01T07:00:00"}));
/// let result = policy.classify(&record, RecordLayout::Fallback, now, &root);
/// assert!(result.deletable);
/// assert_eq!(result.age_hours, Some(5.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionPolicy {
    retention_hours: f64,
    timezone: Tz,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_HOURS, DEFAULT_TIMEZONE)
    }
}

impl EvictionPolicy {
    /// Create a policy with a threshold in hours and a reference timezone
    pub fn new(retention_hours: f64, timezone: Tz) -> Self {
        Self {
            retention_hours,
            timezone,
        }
    }

    /// Retention threshold in hours
    pub fn retention_hours(&self) -> f64 {
        self.retention_hours
    }

    /// Reference timezone for naive timestamps
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Classify a record under a root
    ///
    /// The exemption check runs before any decoding, so exempt records are
    /// skipped whatever their content.
    pub fn classify(
        &self,
        record: &Record,
        layout: RecordLayout,
        now: DateTime<Utc>,
        root: &RootConfig,
    ) -> Classification {
        if root.is_exempt(&record.key) {
            return Classification::retained(Reason::Exempt);
        }

        self.classify_normalized(&normalize(&record.value, layout), now)
    }

    /// Classify an already-normalized record (no exemption check)
    pub fn classify_normalized(&self, record: &NormalizedRecord, now: DateTime<Utc>) -> Classification {
        let update_time = match record {
            NormalizedRecord::Malformed => return Classification::retained(Reason::InvalidJson),
            NormalizedRecord::Untimed => return Classification::retained(Reason::NoUpdateTime),
            NormalizedRecord::Timed { update_time, .. } => update_time,
        };

        let Some(updated) = self.parse_update_time(update_time) else {
            return Classification::retained(Reason::InvalidTime);
        };

        let age_hours = age_in_hours(now, updated);
        Classification {
            deletable: age_hours > self.retention_hours,
            reason: Reason::Ok,
            age_hours: Some(age_hours),
        }
    }

    /// Parse an `updateTime` value
    ///
    /// Any ISO 8601 date or date-time is accepted. A written offset is
    /// honoured. Times without one, and plain dates, are read as local time
    /// in the reference timezone; a local time that does not exist there is
    /// rejected, an ambiguous one takes the earlier instant.
    pub fn parse_update_time(&self, text: &str) -> Option<DateTime<Utc>> {
        let parsed = iso::parse(text)?;

        match parsed.offset {
            Some(offset) => offset
                .from_local_datetime(&parsed.local)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
            None => self
                .timezone
                .from_local_datetime(&parsed.local)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

fn age_in_hours(now: DateTime<Utc>, updated: DateTime<Utc>) -> f64 {
    (now - updated).num_milliseconds() as f64 / 3_600_000.0
}
