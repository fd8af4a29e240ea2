//! Retry-After header parsing utilities
//!
//! The header is either a number of seconds (`"120"`) or an HTTP-date. All
//! three date forms of RFC 7231 are accepted:
//! - IMF-fixdate: `Wed, 21 Oct 2015 07:28:00 GMT`
//! - RFC 850: `Wednesday, 21-Oct-15 07:28:00 GMT`
//! - asctime: `Wed Oct 21 07:28:00 2015`

use chrono::{DateTime, NaiveDateTime, Utc};
use std::time::Duration;
use tracing::debug;

/// Longest wait a server hint may impose
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

const RFC850_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Parse a `Retry-After` value relative to the current time.
///
/// Returns `None` for empty, negative or unparsable values and for dates in
/// the past. No ceiling is applied here; see [`MAX_RETRY_AFTER`].
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    parse_retry_after_at(header_value, Utc::now())
}

/// Same as [`parse_retry_after`], with an explicit "now"
pub fn parse_retry_after_at(header_value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = header_value.trim();
    if value.is_empty() {
        return None;
    }

    // Numeric form: digits only, so "-5" and "+5" are rejected
    if value.bytes().all(|b| b.is_ascii_digit()) {
        let seconds = value.parse::<u64>().ok()?;
        debug!(retry_after_seconds = seconds, "Parsed retry-after header (numeric format)");
        return Some(Duration::from_secs(seconds));
    }

    let target = parse_http_date(value)?;
    let wait = target.signed_duration_since(now).to_std().ok();
    match wait {
        Some(wait) => {
            debug!(
                retry_after_ms = wait.as_millis() as u64,
                target_time = %target,
                "Parsed retry-after header (HTTP-date format)"
            );
            Some(wait)
        }
        None => {
            debug!(target_time = %target, "Retry-after date is in the past");
            None
        }
    }
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }

    [RFC850_FORMAT, ASCTIME_FORMAT]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            debug!(header_value = value, "Failed to parse retry-after header");
            None
        })
}
