// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current time as RFC3339, for document timestamps.
pub fn now_rfc3339() -> String {
    format_utc_rfc3339(Utc::now())
}

/// Parse a stored RFC3339 timestamp back to UTC.
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rfc3339_roundtrip_uses_z_suffix() {
        let date = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        let formatted = format_utc_rfc3339(date);
        assert_eq!(formatted, "2026-03-01T12:30:00Z");
        assert_eq!(parse_rfc3339(&formatted), Some(date));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_rfc3339("yesterday"), None);
    }
}
