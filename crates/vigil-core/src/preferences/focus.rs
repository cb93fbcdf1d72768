//! Focus zones: temporarily narrow notifications to a set of domains.

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::quiet_hours::{parse_timezone, time_in_window};
use crate::types::SignalDomain;

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Recurring local-time window in which a zone is active on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusSchedule {
    /// Days the schedule applies. Empty means every day.
    #[serde(default)]
    pub days: Vec<Weekday>,
    pub start: NaiveTime,
    pub end: NaiveTime,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl FocusSchedule {
    pub fn new(days: Vec<Weekday>, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            days,
            start,
            end,
            timezone: default_timezone(),
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Whether the schedule covers `now` in its own timezone.
    ///
    /// The hours an overnight window runs past midnight belong to the day it
    /// started on.
    pub fn covers(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&parse_timezone(&self.timezone));
        let time = local.time();
        if !time_in_window(time, self.start, self.end) {
            return false;
        }
        if self.days.is_empty() {
            return true;
        }
        let day = if self.start > self.end && time < self.end {
            local.weekday().pred()
        } else {
            local.weekday()
        };
        self.days.contains(&day)
    }
}

/// A named set of domains to focus on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusZone {
    pub id: String,
    pub name: String,
    pub domains: Vec<SignalDomain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<FocusSchedule>,
    pub created_at: DateTime<Utc>,
}

impl FocusZone {
    pub fn new(name: impl Into<String>, domains: Vec<SignalDomain>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            domains,
            schedule: None,
            created_at: now,
        }
    }

    pub fn with_schedule(mut self, schedule: FocusSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn includes(&self, domain: SignalDomain) -> bool {
        self.domains.contains(&domain)
    }

    /// Whether the zone's own schedule covers `now`.
    pub fn is_scheduled_at(&self, now: DateTime<Utc>) -> bool {
        self.schedule.as_ref().is_some_and(|s| s.covers(now))
    }
}

/// The focus currently in effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFocus {
    pub zone_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    /// Derived from a zone schedule rather than a manual activation.
    #[serde(default)]
    pub scheduled: bool,
}

impl ActiveFocus {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|ends_at| now >= ends_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_schedule_days_and_window() {
        let schedule = FocusSchedule::new(vec![Weekday::Mon, Weekday::Tue], hm(9, 0), hm(12, 0));
        // 2024-06-03 is a Monday.
        let monday_ten = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        assert!(schedule.covers(monday_ten));
        assert!(!schedule.covers(monday_ten + Duration::hours(3)));
        assert!(!schedule.covers(monday_ten + Duration::days(2)));

        let every_day = FocusSchedule::new(vec![], hm(9, 0), hm(12, 0));
        assert!(every_day.covers(monday_ten + Duration::days(2)));
    }

    #[test]
    fn test_overnight_schedule_belongs_to_start_day() {
        let schedule = FocusSchedule::new(vec![Weekday::Fri], hm(22, 0), hm(2, 0));
        // 2024-06-07 is a Friday.
        let friday_late = Utc.with_ymd_and_hms(2024, 6, 7, 23, 0, 0).unwrap();
        assert!(schedule.covers(friday_late));
        assert!(schedule.covers(friday_late + Duration::hours(2)));
        assert!(!schedule.covers(friday_late + Duration::hours(3)));

        // Friday early morning is the tail of Thursday's window.
        assert!(!schedule.covers(friday_late - Duration::hours(22)));
        // Saturday night starts a new, unscheduled window.
        assert!(!schedule.covers(friday_late + Duration::days(1)));
    }

    #[test]
    fn test_zone_membership() {
        let zone = FocusZone::new("Deal", vec![SignalDomain::Financial], Utc::now());
        assert!(zone.includes(SignalDomain::Financial));
        assert!(!zone.includes(SignalDomain::Market));
        assert!(!zone.is_scheduled_at(Utc::now()));
    }

    #[test]
    fn test_active_focus_expiry() {
        let now = Utc::now();
        let focus = ActiveFocus {
            zone_id: "z".to_string(),
            started_at: now,
            ends_at: Some(now + Duration::minutes(30)),
            scheduled: false,
        };
        assert!(!focus.is_expired(now + Duration::minutes(29)));
        assert!(focus.is_expired(now + Duration::minutes(30)));

        let open = ActiveFocus { ends_at: None, ..focus };
        assert!(!open.is_expired(now + Duration::days(30)));
    }
}
