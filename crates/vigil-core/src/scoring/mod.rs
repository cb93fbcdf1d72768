//! Signal Intelligence Score (SIS) and urgency tiers.
//!
//! The SIS is a weighted sum of four sub-scores, each normalized to 0-100:
//! - base relevance: provider relevance scaled by a fixed per-domain weight
//! - priority: fixed lookup
//! - recency: exponential decay from publication time
//! - user history: derived from the [`UserBehaviorData`] snapshot
//!
//! Urgency thresholds are constants and do not move with the weights.

use chrono::{DateTime, Utc};

use crate::config::ScoringConfig;
use crate::learning::UserBehaviorData;
use crate::types::{Priority, Signal, SignalDomain, Urgency};

/// SIS at or above which a signal is `immediate`.
pub const IMMEDIATE_THRESHOLD: u8 = 80;
/// SIS at or above which a signal is `timely`.
pub const TIMELY_THRESHOLD: u8 = 60;
/// SIS at or above which a signal is `batched`.
pub const BATCHED_THRESHOLD: u8 = 40;

/// History score when there is nothing learned yet.
const NEUTRAL_HISTORY: f64 = 50.0;

/// Fixed relevance weight per domain.
pub fn domain_weight(domain: SignalDomain) -> f64 {
    match domain {
        SignalDomain::Regulatory => 1.20,
        SignalDomain::Competitive => 1.15,
        SignalDomain::Financial => 1.10,
        SignalDomain::Market => 1.00,
        SignalDomain::Technology => 0.95,
        SignalDomain::Partnership => 0.90,
    }
}

/// Fixed priority sub-score.
pub fn priority_score(priority: Priority) -> f64 {
    match priority {
        Priority::Critical => 100.0,
        Priority::High => 75.0,
        Priority::Medium => 50.0,
        Priority::Low => 25.0,
    }
}

/// Map a SIS and priority to an urgency tier.
///
/// Critical priority is always `immediate`, whatever the score.
pub fn determine_urgency(sis: u8, priority: Priority) -> Urgency {
    if priority == Priority::Critical {
        return Urgency::Immediate;
    }
    match sis {
        s if s >= IMMEDIATE_THRESHOLD => Urgency::Immediate,
        s if s >= TIMELY_THRESHOLD => Urgency::Timely,
        s if s >= BATCHED_THRESHOLD => Urgency::Batched,
        _ => Urgency::Digest,
    }
}

/// Computes the SIS for incoming signals.
#[derive(Debug, Clone, Default)]
pub struct SignalScorer {
    config: ScoringConfig,
}

impl SignalScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a signal. Always in `[0, 100]`.
    pub fn calculate_sis(
        &self,
        signal: &Signal,
        behavior: Option<&UserBehaviorData>,
        now: DateTime<Utc>,
    ) -> u8 {
        let weighted = self.relevance_score(signal) * self.config.relevance_weight
            + priority_score(signal.priority) * self.config.priority_weight
            + self.recency_score(signal.published_at, now) * self.config.recency_weight
            + self.history_score(signal.domain, behavior) * self.config.history_weight;

        if !weighted.is_finite() {
            return 0;
        }
        weighted.round().clamp(0.0, 100.0) as u8
    }

    /// Score and classify in one step.
    pub fn score(
        &self,
        signal: &Signal,
        behavior: Option<&UserBehaviorData>,
        now: DateTime<Utc>,
    ) -> (u8, Urgency) {
        let sis = self.calculate_sis(signal, behavior, now);
        (sis, determine_urgency(sis, signal.priority))
    }

    /// Provider relevance blended with the domain weight, 0-100.
    pub fn relevance_score(&self, signal: &Signal) -> f64 {
        let relevance = if signal.relevance_score.is_finite() {
            signal.relevance_score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        (relevance * 100.0 * domain_weight(signal.domain)).clamp(0.0, 100.0)
    }

    /// Exponential decay with the configured half-life, 0-100.
    pub fn recency_score(&self, published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_hours = ((now - published_at).num_milliseconds() as f64 / 3_600_000.0).max(0.0);
        let half_life = self.config.recency_half_life_hours.max(f64::EPSILON);
        100.0 * 0.5_f64.powf(age_hours / half_life)
    }

    /// Learned engagement with the domain, 0-100.
    pub fn history_score(&self, domain: SignalDomain, behavior: Option<&UserBehaviorData>) -> f64 {
        let Some(behavior) = behavior else {
            return NEUTRAL_HISTORY;
        };
        let read_rate = behavior.read_rate(domain).clamp(0.0, 1.0);
        if behavior.top_domain() == Some(domain) {
            NEUTRAL_HISTORY + 50.0 * read_rate
        } else {
            100.0 * read_rate
        }
    }
}
