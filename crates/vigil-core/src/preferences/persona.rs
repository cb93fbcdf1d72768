//! Personas: named bundles of notification policy defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::types::{Priority, SignalDomain, Urgency};

/// Persona the preferences fall back to when the active one disappears.
pub const DEFAULT_PERSONA_ID: &str = "balanced";

/// How deliverable signals are paced.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum BatchingMode {
    /// Deliver everything that passes the guards right away.
    Realtime,
    /// Hold `digest`-urgency signals for the next digest.
    #[default]
    Smart,
    /// Hold everything but `immediate` signals for the next digest.
    Digest,
}

impl BatchingMode {
    /// Whether a deliverable signal of this urgency waits for the digest.
    pub fn holds(&self, urgency: Urgency) -> bool {
        match self {
            BatchingMode::Realtime => false,
            BatchingMode::Smart => urgency == Urgency::Digest,
            BatchingMode::Digest => urgency != Urgency::Immediate,
        }
    }
}

/// A named policy bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Signals ranked below this priority are held for the digest.
    pub min_priority: Priority,
    /// Per-domain switches. Domains missing from the map are enabled.
    #[serde(default)]
    pub domains: BTreeMap<SignalDomain, bool>,
    #[serde(default)]
    pub batching: BatchingMode,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    #[serde(default = "default_true")]
    pub respect_quiet_hours: bool,
    pub hourly_limit: u32,
    pub daily_limit: u32,
    #[serde(default)]
    pub built_in: bool,
}

fn default_true() -> bool {
    true
}

impl Persona {
    /// Create a custom persona with balanced defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            min_priority: Priority::Medium,
            domains: BTreeMap::new(),
            batching: BatchingMode::Smart,
            sound_enabled: true,
            respect_quiet_hours: true,
            hourly_limit: 8,
            daily_limit: 30,
            built_in: false,
        }
    }

    /// Whether signals from this domain are wanted at all.
    pub fn is_domain_enabled(&self, domain: SignalDomain) -> bool {
        self.domains.get(&domain).copied().unwrap_or(true)
    }

    /// Whether a priority clears this persona's threshold.
    pub fn accepts_priority(&self, priority: Priority) -> bool {
        priority.rank() >= self.min_priority.rank()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_min_priority(mut self, priority: Priority) -> Self {
        self.min_priority = priority;
        self
    }

    /// Switch a single domain on or off.
    pub fn with_domain(mut self, domain: SignalDomain, enabled: bool) -> Self {
        self.domains.insert(domain, enabled);
        self
    }

    /// Enable exactly the given domains.
    pub fn only_domains(mut self, domains: &[SignalDomain]) -> Self {
        self.domains = SignalDomain::all()
            .into_iter()
            .map(|d| (d, domains.contains(&d)))
            .collect();
        self
    }

    pub fn with_batching(mut self, batching: BatchingMode) -> Self {
        self.batching = batching;
        self
    }

    pub fn with_sound(mut self, enabled: bool) -> Self {
        self.sound_enabled = enabled;
        self
    }

    pub fn with_quiet_hours(mut self, respect: bool) -> Self {
        self.respect_quiet_hours = respect;
        self
    }

    pub fn with_limits(mut self, hourly_limit: u32, daily_limit: u32) -> Self {
        self.hourly_limit = hourly_limit;
        self.daily_limit = daily_limit;
        self
    }

    fn built_in(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self.built_in = true;
        self
    }
}

/// The five immutable personas every user has.
pub fn built_in_personas() -> Vec<Persona> {
    vec![
        Persona::new("Balanced")
            .with_description("Steady flow of relevant signals, low-value ones saved for the digest")
            .built_in(DEFAULT_PERSONA_ID),
        Persona::new("Executive")
            .with_description("Only high-impact signals, everything else in the digest")
            .with_min_priority(Priority::High)
            .with_batching(BatchingMode::Digest)
            .with_limits(5, 15)
            .built_in("executive"),
        Persona::new("Analyst")
            .with_description("Everything, as it happens")
            .with_min_priority(Priority::Low)
            .with_batching(BatchingMode::Realtime)
            .with_limits(15, 60)
            .built_in("analyst"),
        Persona::new("Compliance")
            .with_description("Regulatory and financial signals only")
            .with_min_priority(Priority::Low)
            .only_domains(&[SignalDomain::Regulatory, SignalDomain::Financial])
            .with_limits(10, 40)
            .built_in("compliance"),
        Persona::new("Minimal")
            .with_description("Critical signals only, silently")
            .with_min_priority(Priority::Critical)
            .with_batching(BatchingMode::Digest)
            .with_sound(false)
            .with_limits(3, 10)
            .built_in("minimal"),
    ]
}

/// Look up a built-in persona by id.
pub fn built_in_persona(id: &str) -> Option<Persona> {
    built_in_personas().into_iter().find(|p| p.id == id)
}

/// The fallback persona.
pub fn default_persona() -> Persona {
    built_in_personas()
        .into_iter()
        .find(|p| p.id == DEFAULT_PERSONA_ID)
        .unwrap_or_else(|| Persona::new("Balanced").built_in(DEFAULT_PERSONA_ID))
}
