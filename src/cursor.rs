//! Replication cursor helpers
//!
//! Gorgias returns datetimes as RFC 3339 strings with microsecond precision
//! (`2019-09-05T12:38:46.522631+00:00`). Configured start dates may be plain
//! dates. Everything is normalised to `DateTime<Utc>` here so that cursor
//! comparisons never happen on strings.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Lower bound used when neither state nor `start_date` provide one.
pub const EPOCH: DateTime<Utc> = DateTime::UNIX_EPOCH;

/// Parse an ISO-8601 date or date-time.
///
/// Accepts RFC 3339 timestamps, naive date-times (assumed UTC) and plain
/// `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Read a datetime field from a JSON record. Missing, null or unparseable
/// values yield `None`.
pub fn field_datetime(record: &Value, field: &str) -> Option<DateTime<Utc>> {
    record.get(field)?.as_str().and_then(parse_datetime)
}

/// Format a cursor the way it is written to state and to view filters.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// The incremental cursor of a ticket: the latest of its three activity
/// timestamps. Any of them may be absent.
pub fn ticket_cursor(
    updated: Option<DateTime<Utc>>,
    last_message: Option<DateTime<Utc>>,
    last_received_message: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    [updated, last_message, last_received_message]
        .into_iter()
        .flatten()
        .max()
}

/// [`ticket_cursor`] applied to a raw ticket record.
pub fn ticket_record_cursor(record: &Value) -> Option<DateTime<Utc>> {
    ticket_cursor(
        field_datetime(record, "updated_datetime"),
        field_datetime(record, "last_message_datetime"),
        field_datetime(record, "last_received_message_datetime"),
    )
}

/// Keep the greater of an existing high-water mark and a candidate.
pub fn max_cursor(
    current: Option<DateTime<Utc>>,
    candidate: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    current.max(candidate)
}
