//! Datetime normalization for client-supplied timestamps.
//!
//! Callers send anything from bare dates to fully qualified RFC3339
//! timestamps; the Calendar API requires an explicit offset or `Z` on
//! every timestamp. `normalize_datetime` is the single choke point
//! that upgrades recoverable inputs and passes everything else through
//! unchanged.

use chrono::{NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Normalize a datetime string to RFC3339 with an explicit offset.
///
/// Rules, in order:
/// - a bare date (`YYYY-MM-DD`) becomes midnight local time in
///   `timezone`, with that date's correct UTC offset;
/// - a string already carrying `Z` or a `+HH:MM`/`-HH:MM` suffix is
///   returned unchanged;
/// - a naive datetime (`YYYY-MM-DDTHH:MM:SS`, fractional seconds
///   dropped) is interpreted as wall-clock time in `timezone` and
///   serialized with the offset for that instant;
/// - anything else is returned unchanged. Never fails.
pub fn normalize_datetime(raw: &str, timezone: &str) -> String {
    if raw.is_empty() {
        return raw.to_string();
    }

    // Bare date first: its dashes must not be mistaken for an offset.
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let naive = match date.and_hms_opt(0, 0, 0) {
            Some(naive) => naive,
            None => return raw.to_string(),
        };
        return localize(naive, timezone).unwrap_or_else(|| raw.to_string());
    }

    if has_explicit_offset(raw) {
        return raw.to_string();
    }

    let candidate = strip_fractional_seconds(raw);
    match NaiveDateTime::parse_from_str(&candidate, "%Y-%m-%dT%H:%M:%S") {
        Ok(naive) => localize(naive, timezone).unwrap_or_else(|| raw.to_string()),
        Err(_) => raw.to_string(),
    }
}

/// Whether the string already ends in `Z` or carries an offset suffix.
/// A `+` or `-` only counts as an offset when it appears after the
/// time separator, inside the trailing six characters.
fn has_explicit_offset(raw: &str) -> bool {
    if raw.ends_with('Z') {
        return true;
    }

    let chars: Vec<char> = raw.chars().collect();
    let t_pos = match chars.iter().position(|&c| c == 'T') {
        Some(pos) => pos,
        None => return false,
    };

    let tail_start = chars.len().saturating_sub(6);
    chars[tail_start..]
        .iter()
        .enumerate()
        .any(|(i, &c)| tail_start + i > t_pos && (c == '+' || c == '-'))
}

/// Drop a trailing `.NNN` fractional-seconds part, if present.
fn strip_fractional_seconds(raw: &str) -> String {
    if let Some(dot) = raw.find('.') {
        if raw[dot + 1..].chars().all(|c| c.is_ascii_digit()) && dot + 1 < raw.len() {
            return raw[..dot].to_string();
        }
    }
    raw.to_string()
}

/// Attach `timezone`'s offset for this wall-clock instant. Returns
/// None when the timezone is unknown or the instant falls in a DST gap.
fn localize(naive: NaiveDateTime, timezone: &str) -> Option<String> {
    let tz: Tz = timezone.parse().ok()?;
    let localized = tz.from_local_datetime(&naive).earliest()?;
    Some(localized.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_date_becomes_local_midnight() {
        assert_eq!(
            normalize_datetime("2024-01-15", "America/New_York"),
            "2024-01-15T00:00:00-05:00"
        );
    }

    #[test]
    fn bare_date_is_dst_aware() {
        assert_eq!(
            normalize_datetime("2024-07-15", "America/New_York"),
            "2024-07-15T00:00:00-04:00"
        );
    }

    #[test]
    fn explicit_offset_is_identity() {
        for input in [
            "2024-01-15T10:00:00Z",
            "2024-01-15T10:00:00+02:00",
            "2024-01-15T10:00:00-05:00",
        ] {
            assert_eq!(normalize_datetime(input, "America/New_York"), input);
        }
    }

    #[test]
    fn naive_datetime_keeps_wall_clock() {
        assert_eq!(
            normalize_datetime("2024-03-15T14:30:00", "Europe/London"),
            "2024-03-15T14:30:00+00:00"
        );
        assert_eq!(
            normalize_datetime("2024-06-15T14:30:00", "Europe/London"),
            "2024-06-15T14:30:00+01:00"
        );
    }

    #[test]
    fn fractional_seconds_are_dropped() {
        assert_eq!(
            normalize_datetime("2024-01-15T10:00:00.123", "America/New_York"),
            "2024-01-15T10:00:00-05:00"
        );
    }

    #[test]
    fn unparseable_input_passes_through() {
        assert_eq!(
            normalize_datetime("next tuesday", "America/New_York"),
            "next tuesday"
        );
        assert_eq!(normalize_datetime("", "UTC"), "");
    }

    #[test]
    fn unknown_timezone_passes_through() {
        assert_eq!(
            normalize_datetime("2024-01-15T10:00:00", "Not/AZone"),
            "2024-01-15T10:00:00"
        );
    }

    #[test]
    fn utc_timezone_gets_zero_offset() {
        assert_eq!(
            normalize_datetime("2024-01-15T10:00:00", "UTC"),
            "2024-01-15T10:00:00+00:00"
        );
    }
}
