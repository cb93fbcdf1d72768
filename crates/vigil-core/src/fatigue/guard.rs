//! Delivery budget decisions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::DeliveryCounters;
use crate::config::FatigueConfig;
use crate::types::Urgency;

/// Why the guard refused a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FatigueReason {
    DailyLimit,
    HourlyLimit,
    MinimumGap,
    /// Hourly usage is high enough that only `timely` signals may spend the rest.
    BudgetPreservation,
}

/// Outcome of [`FatigueGuard::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatigueDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FatigueReason>,
    /// Earliest time the refused delivery could succeed, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_at: Option<DateTime<Utc>>,
}

impl FatigueDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            retry_at: None,
        }
    }

    pub fn deny(reason: FatigueReason, retry_at: Option<DateTime<Utc>>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            retry_at,
        }
    }
}

/// Snapshot of the remaining delivery budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub hourly_used: u32,
    pub hourly_limit: u32,
    /// Deliveries left in the current hourly window.
    pub hourly: u32,
    pub daily_used: u32,
    pub daily_limit: u32,
    /// Deliveries left in the current daily window.
    pub daily: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_resets_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_resets_at: Option<DateTime<Utc>>,
    /// Set while the minimum gap since the last delivery is still running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_delivery_at: Option<DateTime<Utc>>,
    /// Share of the hourly budget already spent, 0.0-1.0.
    pub hourly_usage: f64,
}

/// Rolling hourly/daily budget plus a minimum inter-delivery gap.
///
/// The guard is stateless; callers load [`DeliveryCounters`], ask for a decision,
/// and call [`FatigueGuard::record_delivery`] exactly once per delivered signal.
#[derive(Debug, Clone)]
pub struct FatigueGuard {
    hourly_limit: u32,
    daily_limit: u32,
    min_gap: Duration,
    preservation_ratio: f64,
}

impl Default for FatigueGuard {
    fn default() -> Self {
        Self::new(&FatigueConfig::default())
    }
}

impl FatigueGuard {
    pub fn new(config: &FatigueConfig) -> Self {
        Self {
            hourly_limit: config.hourly_limit,
            daily_limit: config.daily_limit,
            min_gap: Duration::seconds(config.min_gap_secs.max(0)),
            preservation_ratio: config.preservation_ratio.clamp(0.0, 1.0),
        }
    }

    /// Override the caps, e.g. with the active persona's.
    pub fn with_limits(mut self, hourly_limit: u32, daily_limit: u32) -> Self {
        self.hourly_limit = hourly_limit;
        self.daily_limit = daily_limit;
        self
    }

    pub fn hourly_limit(&self) -> u32 {
        self.hourly_limit
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    pub fn min_gap(&self) -> Duration {
        self.min_gap
    }

    /// Decide whether any delivery of the given urgency may happen at `now`.
    ///
    /// - The daily cap is hard for every urgency.
    /// - `immediate` skips the hourly cap and budget preservation but still waits
    ///   half the minimum gap.
    /// - Everything else must respect the hourly cap, the full gap, and budget
    ///   preservation unless it is `timely`.
    pub fn check(
        &self,
        counters: &DeliveryCounters,
        urgency: Urgency,
        now: DateTime<Utc>,
    ) -> FatigueDecision {
        let hourly = counters.hourly_count(now);
        let daily = counters.daily_count(now);

        if urgency == Urgency::Immediate {
            if daily >= self.daily_limit {
                return FatigueDecision::deny(
                    FatigueReason::DailyLimit,
                    counters.daily.resets_at(now),
                );
            }
            return match self.gap_ends(counters, self.min_gap / 2, now) {
                Some(ends) => FatigueDecision::deny(FatigueReason::MinimumGap, Some(ends)),
                None => FatigueDecision::allow(),
            };
        }

        if hourly >= self.hourly_limit {
            return FatigueDecision::deny(
                FatigueReason::HourlyLimit,
                counters.hourly.resets_at(now),
            );
        }
        if daily >= self.daily_limit {
            return FatigueDecision::deny(FatigueReason::DailyLimit, counters.daily.resets_at(now));
        }
        if let Some(ends) = self.gap_ends(counters, self.min_gap, now) {
            return FatigueDecision::deny(FatigueReason::MinimumGap, Some(ends));
        }
        if urgency != Urgency::Timely && self.hourly_usage(hourly) > self.preservation_ratio {
            return FatigueDecision::deny(
                FatigueReason::BudgetPreservation,
                counters.hourly.resets_at(now),
            );
        }

        FatigueDecision::allow()
    }

    /// Consume one unit of budget.
    pub fn record_delivery(&self, counters: &mut DeliveryCounters, now: DateTime<Utc>) {
        counters.record(now);
    }

    pub fn budget_status(&self, counters: &DeliveryCounters, now: DateTime<Utc>) -> BudgetStatus {
        let hourly_used = counters.hourly_count(now);
        let daily_used = counters.daily_count(now);

        BudgetStatus {
            hourly_used,
            hourly_limit: self.hourly_limit,
            hourly: self.hourly_limit.saturating_sub(hourly_used),
            daily_used,
            daily_limit: self.daily_limit,
            daily: self.daily_limit.saturating_sub(daily_used),
            hourly_resets_at: counters.hourly.resets_at(now),
            daily_resets_at: counters.daily.resets_at(now),
            next_delivery_at: self.gap_ends(counters, self.min_gap, now),
            hourly_usage: self.hourly_usage(hourly_used).min(1.0),
        }
    }

    fn hourly_usage(&self, hourly: u32) -> f64 {
        if self.hourly_limit == 0 {
            return 1.0;
        }
        hourly as f64 / self.hourly_limit as f64
    }

    /// End of the gap after the last delivery, if it has not elapsed yet.
    fn gap_ends(
        &self,
        counters: &DeliveryCounters,
        gap: Duration,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        counters
            .last_delivery_at
            .map(|last| last + gap)
            .filter(|ends| *ends > now)
    }
}
