//! ISO 8601 date-time reader for `updateTime` values
//!
//! Accepts the extended and basic forms of calendar dates, ordinal dates,
//! times with reduced precision and offsets:
//!
//! | Part | Forms |
//! |------|-------|
//! | date | `YYYY-MM-DD`, `YYYYMMDD`, `YYYY-MM`, `YYYY`, `YYYY-DDD` |
//! | time | `HH`, `HH:mm`, `HH:mm:ss`, `HHmm`, `HHmmss`; fraction after seconds with `.` or `,` |
//! | offset | `Z`, `±HH`, `±HH:mm`, `±HHmm` |
//!
//! The date and time are separated by `T`. Anything else is rejected.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

/// Longest fraction kept; further digits are read but ignored
const MAX_FRACTION_DIGITS: usize = 9;

/// A parsed timestamp: wall-clock time plus its offset, when one was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IsoDateTime {
    pub local: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

/// Parse `text` as an ISO 8601 date or date-time
pub(crate) fn parse(text: &str) -> Option<IsoDateTime> {
    let (date_text, time_text) = match text.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (text, None),
    };

    let date = parse_date(date_text)?;
    let Some(time_text) = time_text else {
        return Some(IsoDateTime {
            local: date.and_time(NaiveTime::MIN),
            offset: None,
        });
    };

    let (clock, offset) = split_offset(time_text)?;
    Some(IsoDateTime {
        local: date.and_time(parse_time(clock)?),
        offset,
    })
}

/// Exactly the digits of `text` as a number
fn number(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn field(text: &str, from: usize, to: usize) -> Option<u32> {
    number(text.get(from..to)?)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let year = |t: &str| field(t, 0, 4).map(|y| y as i32);

    match text.as_bytes() {
        [_, _, _, _, b'-', _, _, b'-', _, _] => {
            NaiveDate::from_ymd_opt(year(text)?, field(text, 5, 7)?, field(text, 8, 10)?)
        }
        [_, _, _, _, b'-', _, _, _] => NaiveDate::from_yo_opt(year(text)?, field(text, 5, 8)?),
        [_, _, _, _, b'-', _, _] => NaiveDate::from_ymd_opt(year(text)?, field(text, 5, 7)?, 1),
        [_, _, _, _, _, _, _, _] => {
            NaiveDate::from_ymd_opt(year(text)?, field(text, 4, 6)?, field(text, 6, 8)?)
        }
        [_, _, _, _] => NaiveDate::from_ymd_opt(year(text)?, 1, 1),
        _ => None,
    }
}

/// Split a trailing offset off the time part
fn split_offset(text: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(clock) = text.strip_suffix('Z') {
        return Some((clock, FixedOffset::east_opt(0)));
    }

    match text.find(['+', '-']) {
        Some(at) => Some((&text[..at], Some(parse_offset(&text[at..])?))),
        None => Some((text, None)),
    }
}

fn parse_offset(text: &str) -> Option<FixedOffset> {
    let sign = match text.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let body = &text[1..];

    let (hours, minutes) = match body.as_bytes() {
        [_, _] => (number(body)?, 0),
        [_, _, b':', _, _] | [_, _, _, _] => {
            let minutes_at = body.len() - 2;
            (field(body, 0, 2)?, field(body, minutes_at, body.len())?)
        }
        _ => return None,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60) as i32)
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    let (clock, fraction) = match text.find(['.', ',']) {
        Some(at) => (&text[..at], Some(&text[at + 1..])),
        None => (text, None),
    };

    let (hour, minute, second) = match clock.as_bytes() {
        [_, _] => (number(clock)?, 0, None),
        [_, _, b':', _, _] => (field(clock, 0, 2)?, field(clock, 3, 5)?, None),
        [_, _, _, _] => (field(clock, 0, 2)?, field(clock, 2, 4)?, None),
        [_, _, b':', _, _, b':', _, _] => (field(clock, 0, 2)?, field(clock, 3, 5)?, Some(field(clock, 6, 8)?)),
        [_, _, _, _, _, _] => (field(clock, 0, 2)?, field(clock, 2, 4)?, Some(field(clock, 4, 6)?)),
        _ => return None,
    };

    let nanos = match (fraction, second) {
        (None, _) => 0,
        (Some(digits), Some(_)) => fraction_nanos(digits)?,
        // A fraction needs seconds in front of it
        (Some(_), None) => return None,
    };

    NaiveTime::from_hms_nano_opt(hour, minute, second.unwrap_or(0), nanos)
}

fn fraction_nanos(digits: &str) -> Option<u32> {
    number(digits)?;
    let kept = &digits[..digits.len().min(MAX_FRACTION_DIGITS)];
    let scale = 10u32.pow((MAX_FRACTION_DIGITS - kept.len()) as u32);
    Some(number(kept)? * scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(text: &str) -> Option<NaiveDateTime> {
        parse(text).map(|dt| dt.local)
    }

    fn offset_secs(text: &str) -> Option<i32> {
        parse(text).and_then(|dt| dt.offset).map(|o| o.local_minus_utc())
    }

    fn at(h: u32, m: u32, s: u32, milli: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2025, 1, 1).and_then(|d| d.and_hms_milli_opt(h, m, s, milli))
    }

    #[test]
    fn test_date_forms() {
        assert_eq!(local("2025-01-01"), at(0, 0, 0, 0));
        assert_eq!(local("20250101"), at(0, 0, 0, 0));
        assert_eq!(local("2025-01"), at(0, 0, 0, 0));
        assert_eq!(local("2025"), at(0, 0, 0, 0));
        assert_eq!(local("2025-001"), at(0, 0, 0, 0));
        assert_eq!(
            local("2025-060").map(|dt| dt.date()),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
    }

    #[test]
    fn test_time_forms() {
        assert_eq!(local("2025-01-01T08"), at(8, 0, 0, 0));
        assert_eq!(local("2025-01-01T08:30"), at(8, 30, 0, 0));
        assert_eq!(local("2025-01-01T0830"), at(8, 30, 0, 0));
        assert_eq!(local("2025-01-01T08:30:15"), at(8, 30, 15, 0));
        assert_eq!(local("2025-01-01T083015"), at(8, 30, 15, 0));
        assert_eq!(local("2025-01-01T08:30:15.250"), at(8, 30, 15, 250));
        assert_eq!(local("2025-01-01T08:30:15,5"), at(8, 30, 15, 500));
        assert_eq!(local("2025-01-01T08:30:15.123456789123"), at(8, 30, 15, 123).map(|dt| {
            dt + chrono::Duration::nanoseconds(456_789)
        }));
    }

    #[test]
    fn test_offset_forms() {
        assert_eq!(offset_secs("2025-01-01T08:00:00"), None);
        assert_eq!(offset_secs("2025-01-01T08:00:00Z"), Some(0));
        assert_eq!(offset_secs("2025-01-01T08:00+07:00"), Some(7 * 3600));
        assert_eq!(offset_secs("2025-01-01T08:00:00+0700"), Some(7 * 3600));
        assert_eq!(offset_secs("2025-01-01T08+07"), Some(7 * 3600));
        assert_eq!(offset_secs("2025-01-01T08:00:00.5-05:30"), Some(-(5 * 3600 + 1800)));
        assert_eq!(local("2025-01-01T08:00+07:00"), at(8, 0, 0, 0));
    }

    #[test]
    fn test_rejects_malformed_text() {
        for text in [
            "",
            "yesterday",
            "01/01/2025",
            "2025-1-1",
            "2025-13-01",
            "2025-02-30",
            "2025-01-01 08:00",
            "2025-01-01T",
            "2025-01-01T8:00",
            "2025-01-01T08.5",
            "2025-01-01T08:00.5",
            "2025-01-01T08:00:00.",
            "2025-01-01T24:00",
            "2025-01-01T08:00:00+7",
            "2025-01-01T08:00:00+24:00",
            "2025-01-01T08:00:00Z+07:00",
            "+2025-01-01",
        ] {
            assert_eq!(parse(text), None, "accepted {:?}", text);
        }
    }
}
