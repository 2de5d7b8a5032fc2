//! Value coercions shared by the record mappers.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

/// Formats a count of hours as a Taskwarrior ISO-8601 duration.
///
/// `0.0` yields `PT0S`; whole days are emitted as `P{n}D`.
pub fn hours_to_duration(hours: f64) -> String {
    let total = (hours * 3600.0).round() as i64;
    if total == 0 {
        return "PT0S".to_string();
    }

    let sign = if total < 0 { "-" } else { "" };
    let mut rest = total.unsigned_abs();
    let seconds = rest % 60;
    rest /= 60;
    let minutes = rest % 60;
    rest /= 60;
    let hours = rest % 24;
    let days = rest / 24;

    let mut out = format!("{}P", sign);
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if hours > 0 || minutes > 0 || seconds > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if seconds > 0 {
            out.push_str(&format!("{}S", seconds));
        }
    }
    out
}

/// Parses a provider timestamp and truncates it to whole seconds.
///
/// Accepts RFC 3339, offset-less `YYYY-MM-DDTHH:MM:SS[.f]` and bare
/// `YYYY-MM-DD`. Values without an offset are read in the local timezone.
pub fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    let parsed = if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        dt.with_timezone(&Utc)
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
    {
        local_to_utc(naive)?
    } else {
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .with_context(|| format!("Unrecognized date format: {}", value))?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("Invalid date: {}", value))?;
        local_to_utc(midnight)?
    };
    Ok(truncate_to_seconds(parsed))
}

fn local_to_utc(naive: NaiveDateTime) -> Result<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("Local time {} does not exist", naive))
}

pub fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Drops every character outside `[a-zA-Z0-9]` and lower-cases the rest.
pub fn strip_non_alphanumeric(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Replaces every character outside `[a-zA-Z0-9]` with `replacement` and lower-cases the result.
pub fn replace_non_alphanumeric(value: &str, replacement: char) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                replacement
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hours_is_not_absent() {
        assert_eq!(hours_to_duration(0.0), "PT0S");
    }

    #[test]
    fn test_hours_to_duration() {
        assert_eq!(hours_to_duration(1.0), "PT1H");
        assert_eq!(hours_to_duration(3.5), "PT3H30M");
        assert_eq!(hours_to_duration(0.25), "PT15M");
        assert_eq!(hours_to_duration(24.0), "P1D");
        assert_eq!(hours_to_duration(26.5), "P1DT2H30M");
        assert_eq!(hours_to_duration(1.0 / 3600.0), "PT1S");
        assert_eq!(hours_to_duration(-2.0), "-PT2H");
    }

    #[test]
    fn test_parse_rfc3339_truncates_subseconds() {
        let dt = parse_date("2024-01-15T10:00:00.750Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-15T10:00:00+00:00");
        assert_eq!(dt.nanosecond(), 0);
    }

    #[test]
    fn test_parse_offset_timestamp() {
        let dt = parse_date("2024-01-15T12:30:00+02:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-15T10:30:00+00:00");
    }

    #[test]
    fn test_parse_bare_date_is_local_midnight() {
        let dt = parse_date("2024-03-01").unwrap();
        let local = dt.with_timezone(&Local);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(local.hour(), 0);
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_date("next tuesday").is_err());
    }

    #[test]
    fn test_slugs() {
        assert_eq!(strip_non_alphanumeric("My Proj!"), "myproj");
        assert_eq!(replace_non_alphanumeric("Death Star", '_'), "death_star");
        assert_eq!(replace_non_alphanumeric("look sir metal", '_'), "look_sir_metal");
    }
}
