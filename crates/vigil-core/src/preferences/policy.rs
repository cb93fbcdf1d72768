//! The master allow/deny decision over a loaded preferences snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::focus::ActiveFocus;
use super::model::IntelligentPreferences;
use super::persona::Persona;
use super::rules::{evaluate_rules, overrides_quiet_hours, RuleEffects};
use crate::types::{Priority, SignalContext, Urgency};

/// The gate that refused a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Snoozed,
    QuietHours,
    FocusZone,
    DomainDisabled,
    BelowMinimumPriority,
}

impl DenyReason {}

/// Outcome of [`PreferenceEngine::should_notify`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
    /// Urgency a denied signal should be held at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_to: Option<Urgency>,
    /// Effects of matching rules. Empty when denied.
    pub effects: RuleEffects,
    pub sound: bool,
}

impl NotifyDecision {
    fn deny(reason: DenyReason, route_to: Option<Urgency>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            route_to,
            effects: RuleEffects::default(),
            sound: false,
        }
    }
}

/// Evaluates the preference gates in fixed order: snooze, quiet hours, focus,
/// persona. Rules run last and only ever escalate.
#[derive(Debug, Clone, Copy)]
pub struct PreferenceEngine<'a> {
    prefs: &'a IntelligentPreferences,
}

impl<'a> PreferenceEngine<'a> {
    pub fn new(prefs: &'a IntelligentPreferences) -> Self {
        Self { prefs }
    }

    pub fn active_persona(&self) -> Persona {
        self.prefs.active_persona()
    }

    /// The focus in effect at `now`.
    ///
    /// A running manual focus wins; otherwise the first zone whose schedule covers
    /// `now` is active.
    pub fn active_focus(&self, now: DateTime<Utc>) -> Option<ActiveFocus> {
        if let Some(focus) = &self.prefs.active_focus {
            if !focus.is_expired(now) && self.prefs.focus_zone(&focus.zone_id).is_some() {
                return Some(focus.clone());
            }
        }
        self.prefs
            .focus_zones
            .iter()
            .find(|zone| zone.is_scheduled_at(now))
            .map(|zone| ActiveFocus {
                zone_id: zone.id.clone(),
                started_at: now,
                ends_at: None,
                scheduled: true,
            })
    }

    /// Quiet hours as they apply under the active persona.
    pub fn is_quiet_hours(&self, now: DateTime<Utc>) -> bool {
        self.active_persona().respect_quiet_hours && self.prefs.quiet_hours.is_active(now)
    }

    pub fn should_notify(&self, ctx: &SignalContext<'_>, now: DateTime<Utc>) -> NotifyDecision {
        let critical = ctx.priority == Priority::Critical;

        if !critical && self.prefs.is_snoozed(now) {
            tracing::debug!(domain = %ctx.domain, "Denied: snoozed");
            return NotifyDecision::deny(DenyReason::Snoozed, None);
        }

        // Only critical signals get through quiet hours, either by the global
        // override or by a matching rule that asks for it.
        if self.is_quiet_hours(now) {
            let critical_pass = critical
                && (self.prefs.quiet_hours.allow_critical_override
                    || overrides_quiet_hours(&self.prefs.alert_rules, ctx));
            if !critical_pass {
                tracing::debug!(domain = %ctx.domain, priority = %ctx.priority, "Denied: quiet hours");
                return NotifyDecision::deny(DenyReason::QuietHours, None);
            }
        }

        if let Some(focus) = self.active_focus(now) {
            let in_zone = self
                .prefs
                .focus_zone(&focus.zone_id)
                .map_or(true, |zone| zone.includes(ctx.domain));
            if !in_zone {
                tracing::debug!(domain = %ctx.domain, zone = %focus.zone_id, "Denied: outside focus");
                return NotifyDecision::deny(DenyReason::FocusZone, Some(Urgency::Batched));
            }
        }

        let persona = self.active_persona();
        if !persona.is_domain_enabled(ctx.domain) {
            tracing::debug!(domain = %ctx.domain, persona = %persona.id, "Denied: domain disabled");
            return NotifyDecision::deny(DenyReason::DomainDisabled, None);
        }
        if !persona.accepts_priority(ctx.priority) {
            tracing::debug!(priority = %ctx.priority, persona = %persona.id, "Denied: below persona minimum");
            return NotifyDecision::deny(DenyReason::BelowMinimumPriority, Some(Urgency::Digest));
        }

        let effects = evaluate_rules(&self.prefs.alert_rules, ctx);
        NotifyDecision {
            allowed: true,
            reason: None,
            route_to: None,
            sound: persona.sound_enabled || effects.sound,
            effects,
        }
    }
}
