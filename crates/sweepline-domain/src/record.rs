//! Record normalization - one canonical shape for every stored encoding
//!
//! Stored values come in several shapes: a mapping or a JSON-encoded string
//! of one, with `updateTime` either at the top level or under `Devices`.
//! [`normalize`] folds all of them into a [`NormalizedRecord`] so the
//! eviction policy never inspects raw shapes itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field holding the retention timestamp
pub const UPDATE_TIME_FIELD: &str = "updateTime";

/// Sub-object some collections nest the timestamp under
pub const DEVICES_FIELD: &str = "Devices";

/// Where a root's records keep their timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordLayout {
    /// `Devices.updateTime`, falling back to top-level `updateTime`
    #[default]
    Fallback,
    /// Always `Devices.updateTime`, never the top level
    DevicesOnly,
}

/// Where the timestamp was actually found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Nesting {
    /// Top-level `updateTime`
    Flat,
    /// `Devices.updateTime`
    NestedUnderDevices,
}

/// Canonical form of a stored record value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedRecord {
    /// String payload that is not valid JSON
    Malformed,
    /// No usable `updateTime`
    Untimed,
    /// Timestamp text and where it came from
    Timed {
        /// Unparsed timestamp text
        update_time: String,
        /// Location of the timestamp in the record
        nesting: Nesting,
    },
}

impl NormalizedRecord {
    /// Timestamp text, if one was found
    pub fn update_time(&self) -> Option<&str> {
        match self {
            NormalizedRecord::Timed { update_time, .. } => Some(update_time),
            _ => None,
        }
    }
}

/// Normalize a raw stored value
///
/// Never fails: undecodable input becomes [`NormalizedRecord::Malformed`] and
/// a missing timestamp becomes [`NormalizedRecord::Untimed`].
///
/// # Examples
///
/// ```
/// use sweepline_domain::record::{normalize, Nesting, NormalizedRecord, RecordLayout};
/// use serde_json::json;
///
/// let raw = json!(r#"{"Devices": {"updateTime": "2025-01-01T08:00:00"}}"#);
/// assert_eq!(
///     normalize(&raw, RecordLayout::Fallback),
///     NormalizedRecord::Timed {
///         update_time: "2025-01-01T08:00:00".to_string(),
///         nesting: Nesting::NestedUnderDevices,
///     }
/// );
/// ```
pub fn normalize(value: &Value, layout: RecordLayout) -> NormalizedRecord {
    let decoded;
    let value = match value {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed) => {
                decoded = parsed;
                &decoded
            }
            Err(_) => return NormalizedRecord::Malformed,
        },
        other => other,
    };

    let nested = value
        .get(DEVICES_FIELD)
        .and_then(|devices| devices.get(UPDATE_TIME_FIELD))
        .and_then(timestamp_text);
    if let Some(update_time) = nested {
        return NormalizedRecord::Timed {
            update_time,
            nesting: Nesting::NestedUnderDevices,
        };
    }

    if layout == RecordLayout::DevicesOnly {
        return NormalizedRecord::Untimed;
    }

    match value.get(UPDATE_TIME_FIELD).and_then(timestamp_text) {
        Some(update_time) => NormalizedRecord::Timed {
            update_time,
            nesting: Nesting::Flat,
        },
        None => NormalizedRecord::Untimed,
    }
}

/// Text of a timestamp candidate, or `None` when it counts as absent
///
/// Null, `false`, the empty string and zero are absent. Other non-string
/// values are kept as their JSON text so the time parser can reject them.
fn timestamp_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}
