//! UTC → target zone conversion and connection durations.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::StatusError;

/// Timestamp layout written by OpenVPN.
pub const SOURCE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Layout of normalised timestamps.
pub const DISPLAY_FORMAT: &str = "%d.%m.%Y %H:%M:%S";
/// Duration shown when the start timestamp cannot be parsed.
pub const UNKNOWN_DURATION: &str = "-";

/// Converts naive UTC timestamps from the status log into one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeNormalizer {
    zone: Tz,
}

impl TimeNormalizer {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    /// Normaliser for an IANA zone name such as `Europe/Moscow`.
    pub fn for_zone(name: &str) -> Result<Self, StatusError> {
        let zone = name
            .trim()
            .parse::<Tz>()
            .map_err(|_| StatusError::InvalidTimezone {
                name: name.to_string(),
            })?;
        Ok(Self::new(zone))
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// `2025-01-01 09:00:00` (UTC) → `01.01.2025 12:00:00` for Moscow.
    ///
    /// Returns `raw` trimmed but otherwise unchanged when it does not parse.
    pub fn to_target_zone(&self, raw: &str) -> String {
        match parse_utc(raw) {
            Some(instant) => instant
                .with_timezone(&self.zone)
                .format(DISPLAY_FORMAT)
                .to_string(),
            None => raw.trim().to_string(),
        }
    }

    /// Time elapsed since `raw` until now.
    pub fn duration_since(&self, raw: &str) -> String {
        self.duration_between(raw, Utc::now())
    }

    /// Time elapsed from `raw` until `now`, as
    /// `"<d> дней, <hh> часов <mm> минут"`.
    ///
    /// A start after `now` renders as zero; an unparsable start as `"-"`.
    pub fn duration_between<Z: TimeZone>(&self, raw: &str, now: DateTime<Z>) -> String {
        let Some(start) = parse_utc(raw) else {
            tracing::warn!(timestamp = raw, "cannot parse connection start");
            return UNKNOWN_DURATION.to_string();
        };
        let now = now.with_timezone(&self.zone);
        let start = start.with_timezone(&self.zone);
        let minutes = (now - start).num_minutes().max(0);
        format_duration(minutes)
    }
}

fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), SOURCE_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn format_duration(total_minutes: i64) -> String {
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;
    format!("{days} дней, {hours:02} часов {minutes:02} минут")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn moscow() -> TimeNormalizer {
        TimeNormalizer::for_zone("Europe/Moscow").unwrap()
    }

    fn utc(raw: &str) -> DateTime<Utc> {
        parse_utc(raw).unwrap()
    }

    #[test]
    fn converts_to_moscow_time() {
        assert_eq!(moscow().to_target_zone("2025-01-01 09:00:00"), "01.01.2025 12:00:00");
    }

    #[test]
    fn crosses_midnight() {
        assert_eq!(moscow().to_target_zone("2024-12-31 22:30:15"), "01.01.2025 01:30:15");
    }

    #[rstest]
    #[case("")]
    #[case("yesterday")]
    #[case("2025-13-01 00:00:00")]
    #[case("Thu Jan  1 10:00:00 2025")]
    #[case("  soon \t")]
    fn unparsable_timestamp_is_returned_trimmed(#[case] raw: &str) {
        assert_eq!(moscow().to_target_zone(raw), raw.trim());
        assert_eq!(moscow().duration_between(raw, Utc::now()), UNKNOWN_DURATION);
    }

    #[test]
    fn duration_decomposes_days_hours_minutes() {
        let now = utc("2025-01-02 03:04:00");
        assert_eq!(
            moscow().duration_between("2025-01-01 00:00:00", now),
            "1 дней, 03 часов 04 минут"
        );
    }

    #[test]
    fn duration_ignores_zone_of_now() {
        let now = utc("2025-01-02 03:04:00").with_timezone(&chrono_tz::Europe::Moscow);
        assert_eq!(
            moscow().duration_between("2025-01-01 00:00:00", now),
            "1 дней, 03 часов 04 минут"
        );
    }

    #[test]
    fn future_start_clamps_to_zero() {
        let now = utc("2025-01-01 00:00:00");
        assert_eq!(
            moscow().duration_between("2025-01-01 05:00:00", now),
            "0 дней, 00 часов 00 минут"
        );
    }

    #[test]
    fn unknown_zone_is_rejected() {
        let err = TimeNormalizer::for_zone("Mars/Olympus").unwrap_err();
        assert!(matches!(err, StatusError::InvalidTimezone { .. }));
    }
}
