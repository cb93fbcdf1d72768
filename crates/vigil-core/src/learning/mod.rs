//! Behavior learning from user interactions.
//!
//! Read and dismiss actions feed per-domain exponential moving averages; feedback
//! feeds helpful/not-helpful counters. The scorer consults a snapshot of this state
//! on the *next* signal, never retroactively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::SignalDomain;

/// Rate every domain starts from on first interaction.
pub const NEUTRAL_RATE: f64 = 0.5;

/// Per-domain engagement rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainRates {
    /// EMA of read actions.
    pub read_rate: f64,
    /// EMA of dismiss actions.
    pub dismiss_rate: f64,
}

impl Default for DomainRates {
    fn default() -> Self {
        Self {
            read_rate: NEUTRAL_RATE,
            dismiss_rate: NEUTRAL_RATE,
        }
    }
}

/// Learned behavior for the single user of this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBehaviorData {
    pub domains: BTreeMap<SignalDomain, DomainRates>,
    /// Domains by descending read rate. Re-sorted after every interaction.
    pub preferred_domains: Vec<SignalDomain>,
    pub helpful_count: u32,
    pub not_helpful_count: u32,
    pub interaction_count: u32,
    pub last_updated: DateTime<Utc>,
}

impl UserBehaviorData {
    /// Fresh behavior with neutral rates for every domain.
    pub fn neutral(now: DateTime<Utc>) -> Self {
        let domains: BTreeMap<_, _> = SignalDomain::all()
            .into_iter()
            .map(|d| (d, DomainRates::default()))
            .collect();
        let mut behavior = Self {
            domains,
            preferred_domains: Vec::new(),
            helpful_count: 0,
            not_helpful_count: 0,
            interaction_count: 0,
            last_updated: now,
        };
        behavior.resort_preferences();
        behavior
    }

    /// Rates for a domain, neutral if the domain was never seen.
    pub fn rates(&self, domain: SignalDomain) -> DomainRates {
        self.domains.get(&domain).copied().unwrap_or_default()
    }

    pub fn read_rate(&self, domain: SignalDomain) -> f64 {
        self.rates(domain).read_rate
    }

    pub fn dismiss_rate(&self, domain: SignalDomain) -> f64 {
        self.rates(domain).dismiss_rate
    }

    /// The domain the user engages with most, if any.
    pub fn top_domain(&self) -> Option<SignalDomain> {
        self.preferred_domains.first().copied()
    }

    /// Shape check used when loading persisted behavior.
    pub fn is_well_formed(&self) -> bool {
        self.domains.values().all(|r| {
            (0.0..=1.0).contains(&r.read_rate) && (0.0..=1.0).contains(&r.dismiss_rate)
        })
    }

    fn resort_preferences(&mut self) {
        let mut ranked: Vec<(SignalDomain, f64)> = self
            .domains
            .iter()
            .map(|(domain, rates)| (*domain, rates.read_rate))
            .collect();
        // Stable sort keeps declaration order among equal rates.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        self.preferred_domains = ranked.into_iter().map(|(domain, _)| domain).collect();
    }
}

/// A user interaction the learner understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Read,
    Dismiss,
    /// -1 not helpful, 0 neutral, 1 helpful.
    Feedback(i8),
}

/// Applies interactions to [`UserBehaviorData`].
#[derive(Debug, Clone)]
pub struct BehaviorLearner {
    learning_rate: f64,
}

impl Default for BehaviorLearner {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl BehaviorLearner {
    /// Create a learner with the given EMA weight.
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate: learning_rate.clamp(0.0, 1.0),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Apply one interaction on a domain.
    ///
    /// `behavior` is initialized with neutral rates on the first ever interaction.
    pub fn record(
        &self,
        behavior: Option<UserBehaviorData>,
        domain: SignalDomain,
        interaction: Interaction,
        now: DateTime<Utc>,
    ) -> UserBehaviorData {
        let mut behavior = behavior.unwrap_or_else(|| UserBehaviorData::neutral(now));
        let rates = behavior.domains.entry(domain).or_default();

        match interaction {
            Interaction::Read => rates.read_rate = self.ema(rates.read_rate, 1.0),
            Interaction::Dismiss => rates.dismiss_rate = self.ema(rates.dismiss_rate, 1.0),
            Interaction::Feedback(score) if score > 0 => behavior.helpful_count += 1,
            Interaction::Feedback(score) if score < 0 => behavior.not_helpful_count += 1,
            Interaction::Feedback(_) => {}
        }

        behavior.interaction_count += 1;
        behavior.last_updated = now;
        behavior.resort_preferences();

        tracing::debug!(
            domain = %domain,
            ?interaction,
            read_rate = behavior.read_rate(domain),
            dismiss_rate = behavior.dismiss_rate(domain),
            "Behavior updated"
        );

        behavior
    }

    fn ema(&self, rate: f64, observed: f64) -> f64 {
        (rate * (1.0 - self.learning_rate) + observed * self.learning_rate).clamp(0.0, 1.0)
    }
}
