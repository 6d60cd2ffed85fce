//! Timestamp normalization for schema-less store documents.
//!
//! Documents accumulate several time representations over the life of the
//! site: the store's native epoch-seconds wrapper (`{"seconds": ...}`),
//! RFC 3339 strings written by this service, and raw epoch-millisecond
//! numbers from older imports. `normalize` folds all of them into a single
//! comparable instant and is total — garbage input yields `None`, never an
//! error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Trailing window used for "recent" counts in admin aggregation.
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Converts a stored timestamp value into an instant, if possible.
///
/// Rules, in order:
/// 1. object with a numeric `seconds` field → epoch seconds
/// 2. raw number → epoch milliseconds
/// 3. string → RFC 3339, then naive datetime, then bare date (UTC)
/// 4. anything else → `None`
pub fn normalize(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Object(map) => {
            let seconds = map.get("seconds")?.as_f64()?;
            Utc.timestamp_millis_opt((seconds * 1000.0) as i64).single()
        }
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            Utc.timestamp_millis_opt(millis).single()
        }
        Value::String(s) => parse_string(s),
        _ => None,
    }
}

fn parse_string(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

/// Normalizes an optional field, defaulting to the Unix epoch.
/// Project `createdAt`/`updatedAt` use this default.
pub fn normalize_or_epoch(value: Option<&Value>) -> DateTime<Utc> {
    value.and_then(normalize).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Best-effort sort key in epoch milliseconds; absent or unparseable → 0,
/// which sorts last in the descending orders used by the list endpoints.
pub fn sort_millis(value: Option<&Value>) -> i64 {
    value
        .and_then(normalize)
        .map(|t| t.timestamp_millis())
        .unwrap_or(0)
}

/// Whether `instant` falls strictly inside the trailing recent window.
pub fn within_recent_window(instant: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    instant > now - chrono::Duration::days(RECENT_WINDOW_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn seconds_wrapper_normalizes() {
        let v = json!({"seconds": 1_700_000_000, "nanoseconds": 123});
        let t = normalize(&v).unwrap();
        assert_eq!(t.timestamp(), 1_700_000_000);
    }

    #[test]
    fn raw_number_is_epoch_millis() {
        let v = json!(1_700_000_000_000i64);
        let t = normalize(&v).unwrap();
        assert_eq!(t.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn rfc3339_string_normalizes() {
        let v = json!("2024-03-01T12:30:00Z");
        let t = normalize(&v).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn naive_and_date_only_strings_normalize() {
        assert!(normalize(&json!("2024-03-01T12:30:00.250")).is_some());
        let midnight = normalize(&json!("2024-03-01")).unwrap();
        assert_eq!(midnight, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn garbage_inputs_never_panic() {
        for v in [
            json!(null),
            json!(true),
            json!([1, 2, 3]),
            json!("not a date"),
            json!({"nanoseconds": 5}),
            json!({"seconds": "not numeric"}),
        ] {
            assert!(normalize(&v).is_none());
        }
    }

    #[test]
    fn missing_field_defaults_to_epoch() {
        assert_eq!(normalize_or_epoch(None), DateTime::UNIX_EPOCH);
        assert_eq!(normalize_or_epoch(Some(&json!("junk"))), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn sort_millis_defaults_to_zero() {
        assert_eq!(sort_millis(None), 0);
        assert_eq!(sort_millis(Some(&json!({"seconds": 2}))), 2000);
    }

    #[test]
    fn recent_window_is_strict_trailing_seven_days() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let six_days = now - chrono::Duration::days(6);
        let eight_days = now - chrono::Duration::days(8);
        let exactly_seven = now - chrono::Duration::days(7);
        assert!(within_recent_window(six_days, now));
        assert!(!within_recent_window(eight_days, now));
        assert!(!within_recent_window(exactly_seven, now));
    }
}
