//! Lenient parsing for request fields that clients send as free text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use prodyo_core::WorkStatus;
use serde::{Deserialize, Deserializer};

use crate::errors::TrackerError;

/// Seconds from a unit-suffixed duration (`2h`, `90m`, `1h30m`, `1.5h`) or a
/// bare integer number of seconds.
pub fn parse_timer(input: &str) -> Result<i64, TrackerError> {
    let trimmed = input.trim();
    unit_duration_secs(trimmed)
        .or_else(|| trimmed.parse::<i64>().ok())
        .ok_or_else(|| {
            TrackerError::validation(format!(
                "invalid duration format: {} (use format like '2h', '90m', or '7200' for seconds)",
                input
            ))
        })
}

fn unit_duration_secs(s: &str) -> Option<i64> {
    if s.is_empty() {
        return None;
    }
    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut rest = s;
    let mut total = 0.0_f64;
    while !rest.is_empty() {
        let number_len = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest.find(is_number).unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 1e-3,
            "us" | "µs" => 1e-6,
            "ns" => 1e-9,
            _ => return None,
        };
        total += value * scale;
        rest = &rest[unit_len..];
    }
    Some(total.trunc() as i64)
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`. Zone-less forms are UTC.
pub fn parse_time(input: &str) -> Result<DateTime<Utc>, TrackerError> {
    let s = input.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(t.and_utc());
    }
    if let Some(t) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(t.and_utc());
    }
    Err(TrackerError::validation(format!(
        "invalid time format: {} (use RFC 3339 or YYYY-MM-DD)",
        input
    )))
}

/// Absent or blank means `NotStarted`.
pub fn parse_status(input: Option<&str>) -> Result<WorkStatus, TrackerError> {
    match input.map(str::trim) {
        None | Some("") => Ok(WorkStatus::NotStarted),
        Some(s) => Ok(s.parse()?),
    }
}

/// `deserialize_with` adapter for [`parse_time`].
pub fn time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_time(&raw).map_err(serde::de::Error::custom)
}

/// Like [`time`] for optional fields; pair with `#[serde(default)]`.
pub fn optional_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => parse_time(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timer_units_and_seconds() {
        assert_eq!(parse_timer("2h").unwrap(), 7200);
        assert_eq!(parse_timer("90m").unwrap(), 5400);
        assert_eq!(parse_timer("1h30m").unwrap(), 5400);
        assert_eq!(parse_timer("1.5h").unwrap(), 5400);
        assert_eq!(parse_timer("45s").unwrap(), 45);
        assert_eq!(parse_timer("7200").unwrap(), 7200);
        assert_eq!(parse_timer(" 0 ").unwrap(), 0);
        assert_eq!(parse_timer("1500ms").unwrap(), 1);
    }

    #[test]
    fn test_timer_rejects_garbage() {
        for bad in ["", "h", "2x", "two hours", "1h-"] {
            let err = parse_timer(bad).unwrap_err();
            assert!(
                err.to_string().starts_with("invalid duration format"),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_time_formats() {
        let midnight = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_time("2026-03-01").unwrap(), midnight);
        assert_eq!(parse_time("2026-03-01T00:00:00Z").unwrap(), midnight);
        assert_eq!(parse_time("2026-03-01T02:00:00+02:00").unwrap(), midnight);
        assert_eq!(
            parse_time("2026-03-01 12:30:00").unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap()
        );
        assert!(parse_time("March 1st").is_err());
    }

    #[test]
    fn test_status_defaults_and_variants() {
        assert_eq!(parse_status(None).unwrap(), WorkStatus::NotStarted);
        assert_eq!(parse_status(Some("  ")).unwrap(), WorkStatus::NotStarted);
        assert_eq!(parse_status(Some("in_progress")).unwrap(), WorkStatus::InProgress);
        assert!(matches!(
            parse_status(Some("done")),
            Err(TrackerError::Validation(_))
        ));
    }

    #[derive(Deserialize)]
    struct Window {
        #[serde(deserialize_with = "time")]
        start_at: DateTime<Utc>,
        #[serde(default, deserialize_with = "optional_time")]
        end_at: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_serde_adapters() {
        let w: Window = serde_json::from_str(r#"{"start_at": "2026-03-01"}"#).unwrap();
        assert_eq!(w.start_at, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        assert!(w.end_at.is_none());

        let w: Window =
            serde_json::from_str(r#"{"start_at": "2026-03-01", "end_at": null}"#).unwrap();
        assert!(w.end_at.is_none());

        assert!(serde_json::from_str::<Window>(r#"{"start_at": "soon"}"#).is_err());
    }
}
