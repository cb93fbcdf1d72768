//! Quiet hours and the local-time window helpers shared with focus schedules.

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Parse an IANA timezone name, falling back to UTC.
pub(crate) fn parse_timezone(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::debug!(timezone = name, "Unknown timezone, using UTC");
            Tz::UTC
        }
    }
}

/// Whether `time` falls in `[start, end)`.
///
/// `start > end` wraps past midnight; `start == end` is an empty window.
pub(crate) fn time_in_window(time: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start < end {
        time >= start && time < end
    } else if start > end {
        time >= start || time < end
    } else {
        false
    }
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

fn default_start() -> NaiveTime {
    NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default()
}

fn default_end() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Daily window in which non-critical notifications are held back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuietHoursConfig {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Only apply on Saturday and Sunday.
    pub weekends_only: bool,
    /// Let critical signals through while quiet hours are active.
    pub allow_critical_override: bool,
    /// IANA timezone the window is expressed in.
    pub timezone: String,
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start: default_start(),
            end: default_end(),
            weekends_only: false,
            allow_critical_override: true,
            timezone: default_timezone(),
        }
    }
}

impl QuietHoursConfig {
    /// An enabled window from `start` to `end` in UTC.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            enabled: true,
            start,
            end,
            ..Default::default()
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn with_weekends_only(mut self, weekends_only: bool) -> Self {
        self.weekends_only = weekends_only;
        self
    }

    pub fn with_critical_override(mut self, allow: bool) -> Self {
        self.allow_critical_override = allow;
        self
    }

    /// Whether quiet hours are in effect at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        let local = now.with_timezone(&parse_timezone(&self.timezone));
        if self.weekends_only && !is_weekend(local.weekday()) {
            return false;
        }
        time_in_window(local.time(), self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2024-06-05 is a Wednesday.
    fn wednesday(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 5, h, m, 0).unwrap()
    }

    #[test]
    fn test_window_helper() {
        assert!(time_in_window(hm(9, 0), hm(9, 0), hm(17, 0)));
        assert!(!time_in_window(hm(17, 0), hm(9, 0), hm(17, 0)));
        assert!(time_in_window(hm(23, 30), hm(22, 0), hm(8, 0)));
        assert!(time_in_window(hm(7, 59), hm(22, 0), hm(8, 0)));
        assert!(!time_in_window(hm(12, 0), hm(22, 0), hm(8, 0)));
        assert!(!time_in_window(hm(12, 0), hm(12, 0), hm(12, 0)));
    }

    #[test]
    fn test_disabled_by_default() {
        let quiet = QuietHoursConfig::default();
        assert!(!quiet.is_active(wednesday(23, 0)));
    }

    #[test]
    fn test_overnight_window() {
        let quiet = QuietHoursConfig::new(hm(22, 0), hm(8, 0));
        assert!(quiet.is_active(wednesday(23, 0)));
        assert!(quiet.is_active(wednesday(3, 0)));
        assert!(!quiet.is_active(wednesday(8, 0)));
        assert!(!quiet.is_active(wednesday(14, 0)));
    }

    #[test]
    fn test_equal_bounds_never_active() {
        let quiet = QuietHoursConfig::new(hm(22, 0), hm(22, 0));
        for h in 0..24 {
            assert!(!quiet.is_active(wednesday(h, 0)));
        }
    }

    #[test]
    fn test_timezone_shifts_window() {
        // 20:00 UTC is 22:00 in Berlin during summer time.
        let quiet = QuietHoursConfig::new(hm(22, 0), hm(8, 0)).with_timezone("Europe/Berlin");
        assert!(quiet.is_active(wednesday(20, 30)));
        assert!(!quiet.is_active(wednesday(19, 30)));

        let fallback = QuietHoursConfig::new(hm(22, 0), hm(8, 0)).with_timezone("Mars/Olympus");
        assert!(fallback.is_active(wednesday(22, 30)));
    }

    #[test]
    fn test_weekends_only() {
        let quiet = QuietHoursConfig::new(hm(0, 0), hm(23, 59)).with_weekends_only(true);
        assert!(!quiet.is_active(wednesday(12, 0)));
        // 2024-06-08 is a Saturday.
        assert!(quiet.is_active(Utc.with_ymd_and_hms(2024, 6, 8, 12, 0, 0).unwrap()));
    }
}
