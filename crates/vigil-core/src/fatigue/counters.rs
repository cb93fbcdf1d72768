//! Rolling delivery counters.
//!
//! Windows reset wholesale once their `reset_at` has passed rather than sliding
//! continuously. The reset is evaluated lazily whenever a count is read.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single counting window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterWindow {
    pub count: u32,
    /// End of the current window. `None` until the first delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
}

impl CounterWindow {
    /// Whether the window has run out at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.reset_at.map_or(true, |reset_at| now >= reset_at)
    }

    /// Effective count at `now`.
    pub fn count_at(&self, now: DateTime<Utc>) -> u32 {
        if self.is_expired(now) {
            0
        } else {
            self.count
        }
    }

    /// When the window in effect at `now` ends, if one is running.
    pub fn resets_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.is_expired(now) {
            None
        } else {
            self.reset_at
        }
    }

    /// Count one delivery, opening a new window first if the old one ran out.
    pub fn increment(&mut self, now: DateTime<Utc>, length: Duration) {
        if self.is_expired(now) {
            self.count = 0;
            self.reset_at = Some(now + length);
        }
        self.count = self.count.saturating_add(1);
    }
}

/// Persisted state of the fatigue guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryCounters {
    pub hourly: CounterWindow,
    pub daily: CounterWindow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_delivery_at: Option<DateTime<Utc>>,
}

impl DeliveryCounters {
    pub fn hourly_count(&self, now: DateTime<Utc>) -> u32 {
        self.hourly.count_at(now)
    }

    pub fn daily_count(&self, now: DateTime<Utc>) -> u32 {
        self.daily.count_at(now)
    }

    /// Count one delivery in both windows.
    pub fn record(&mut self, now: DateTime<Utc>) {
        self.hourly.increment(now, Duration::hours(1));
        self.daily.increment(now, Duration::days(1));
        self.last_delivery_at = Some(now);
    }
}
