//! The preferences aggregate and its mutations.
//!
//! Every mutation is applied to a loaded copy and written back whole by the engine.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::focus::{ActiveFocus, FocusZone};
use super::persona::{built_in_persona, built_in_personas, default_persona, Persona, DEFAULT_PERSONA_ID};
use super::quiet_hours::{parse_timezone, QuietHoursConfig};
use super::rules::CustomAlertRule;
use crate::error::{ErrorCode, VigilError, VigilResult};

fn default_digest_times() -> Vec<NaiveTime> {
    [(8, 0), (17, 0)]
        .into_iter()
        .filter_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0))
        .collect()
}

/// Local times at which held signals are delivered as a digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestSchedule {
    pub enabled: bool,
    pub times: Vec<NaiveTime>,
    pub timezone: String,
}

impl Default for DigestSchedule {
    fn default() -> Self {
        Self {
            enabled: true,
            times: default_digest_times(),
            timezone: "UTC".to_string(),
        }
    }
}

impl DigestSchedule {
    /// Most recent scheduled slot at or before `now`, looking back one day.
    pub fn last_slot(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let tz = parse_timezone(&self.timezone);
        let today = now.with_timezone(&tz).date_naive();
        let yesterday = today.pred_opt()?;

        [yesterday, today]
            .into_iter()
            .flat_map(|date| self.times.iter().map(move |t| date.and_time(*t)))
            .filter_map(|local| tz.from_local_datetime(&local).earliest())
            .map(|slot| slot.with_timezone(&Utc))
            .filter(|slot| *slot <= now)
            .max()
    }

    /// Whether a slot has passed since the last digest.
    pub fn is_due(&self, now: DateTime<Utc>, last_digest_at: Option<DateTime<Utc>>) -> bool {
        if !self.enabled {
            return false;
        }
        match (self.last_slot(now), last_digest_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(slot), Some(last)) => last < slot,
        }
    }
}

/// Everything the user has configured about notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntelligentPreferences {
    pub active_persona_id: String,
    pub custom_personas: Vec<Persona>,
    pub focus_zones: Vec<FocusZone>,
    pub active_focus: Option<ActiveFocus>,
    pub alert_rules: Vec<CustomAlertRule>,
    pub quiet_hours: QuietHoursConfig,
    pub snoozed_until: Option<DateTime<Utc>>,
    pub learning_enabled: bool,
    pub digest_schedule: DigestSchedule,
}

impl Default for IntelligentPreferences {
    fn default() -> Self {
        Self {
            active_persona_id: DEFAULT_PERSONA_ID.to_string(),
            custom_personas: Vec::new(),
            focus_zones: Vec::new(),
            active_focus: None,
            alert_rules: Vec::new(),
            quiet_hours: QuietHoursConfig::default(),
            snoozed_until: None,
            learning_enabled: true,
            digest_schedule: DigestSchedule::default(),
        }
    }
}

impl IntelligentPreferences {
    /// Built-in personas followed by custom ones.
    pub fn personas(&self) -> Vec<Persona> {
        let mut personas = built_in_personas();
        personas.extend(self.custom_personas.iter().cloned());
        personas
    }

    pub fn persona(&self, id: &str) -> Option<Persona> {
        built_in_persona(id).or_else(|| self.custom_personas.iter().find(|p| p.id == id).cloned())
    }

    /// The active persona, or the default one if the id no longer resolves.
    pub fn active_persona(&self) -> Persona {
        self.persona(&self.active_persona_id)
            .unwrap_or_else(default_persona)
    }

    pub fn focus_zone(&self, id: &str) -> Option<&FocusZone> {
        self.focus_zones.iter().find(|z| z.id == id)
    }

    pub fn is_snoozed(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| now < until)
    }

    /// Snooze end while a snooze is running.
    pub fn snooze_end(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.snoozed_until.filter(|until| now < *until)
    }

    /// Structural checks applied when loading persisted preferences.
    pub fn is_well_formed(&self) -> bool {
        !self.active_persona_id.is_empty()
            && self.custom_personas.iter().all(|p| !p.id.is_empty() && !p.built_in)
            && self.focus_zones.iter().all(|z| !z.id.is_empty())
            && self.alert_rules.iter().all(|r| !r.id.is_empty())
    }

    pub fn set_active_persona(&mut self, id: &str) -> VigilResult<()> {
        if self.persona(id).is_none() {
            return Err(VigilError::not_found(ErrorCode::NfPersona, "Persona", id));
        }
        self.active_persona_id = id.to_string();
        Ok(())
    }

    /// Add a custom persona. Ids that are empty or taken are replaced.
    pub fn add_persona(&mut self, mut persona: Persona) -> VigilResult<Persona> {
        if persona.name.trim().is_empty() {
            return Err(VigilError::missing_field("name"));
        }
        if persona.id.is_empty() || self.persona(&persona.id).is_some() {
            persona.id = Uuid::new_v4().to_string();
        }
        persona.built_in = false;
        self.custom_personas.push(persona.clone());
        Ok(persona)
    }

    /// Remove a custom persona, falling back to the default if it was active.
    pub fn remove_persona(&mut self, id: &str) -> VigilResult<()> {
        if built_in_persona(id).is_some() {
            return Err(VigilError::Validation {
                message: format!("Persona '{}' is built in and cannot be deleted", id),
                code: ErrorCode::ValImmutable,
                details: Default::default(),
                suggestion: Some("Create a custom persona instead".to_string()),
            });
        }
        let before = self.custom_personas.len();
        self.custom_personas.retain(|p| p.id != id);
        if self.custom_personas.len() == before {
            return Err(VigilError::not_found(ErrorCode::NfPersona, "Persona", id));
        }
        if self.active_persona_id == id {
            self.active_persona_id = DEFAULT_PERSONA_ID.to_string();
        }
        Ok(())
    }

    pub fn add_focus_zone(&mut self, mut zone: FocusZone) -> VigilResult<FocusZone> {
        if zone.name.trim().is_empty() {
            return Err(VigilError::missing_field("name"));
        }
        if zone.domains.is_empty() {
            return Err(VigilError::validation_with_suggestion(
                "A focus zone needs at least one domain",
                "Add the domains you want to keep receiving",
            ));
        }
        if zone.id.is_empty() || self.focus_zone(&zone.id).is_some() {
            zone.id = Uuid::new_v4().to_string();
        }
        self.focus_zones.push(zone.clone());
        Ok(zone)
    }

    /// Manually activate a zone, replacing any running focus.
    pub fn activate_focus(
        &mut self,
        zone_id: &str,
        duration: Option<Duration>,
        now: DateTime<Utc>,
    ) -> VigilResult<ActiveFocus> {
        if self.focus_zone(zone_id).is_none() {
            return Err(VigilError::not_found(ErrorCode::NfFocusZone, "Focus zone", zone_id));
        }
        let focus = ActiveFocus {
            zone_id: zone_id.to_string(),
            started_at: now,
            ends_at: duration.map(|d| now + d),
            scheduled: false,
        };
        self.active_focus = Some(focus.clone());
        Ok(focus)
    }

    /// Returns whether a focus was running.
    pub fn deactivate_focus(&mut self) -> bool {
        self.active_focus.take().is_some()
    }

    pub fn remove_focus_zone(&mut self, id: &str) -> VigilResult<()> {
        let before = self.focus_zones.len();
        self.focus_zones.retain(|z| z.id != id);
        if self.focus_zones.len() == before {
            return Err(VigilError::not_found(ErrorCode::NfFocusZone, "Focus zone", id));
        }
        if self.active_focus.as_ref().is_some_and(|f| f.zone_id == id) {
            self.active_focus = None;
        }
        Ok(())
    }

    /// Drop a manual focus whose end has passed. Returns whether anything changed.
    pub fn expire_focus(&mut self, now: DateTime<Utc>) -> bool {
        let stale = self.active_focus.as_ref().is_some_and(|f| {
            f.is_expired(now) || self.focus_zone(&f.zone_id).is_none()
        });
        if stale {
            self.active_focus = None;
        }
        stale
    }

    pub fn add_rule(&mut self, mut rule: CustomAlertRule) -> VigilResult<CustomAlertRule> {
        if rule.name.trim().is_empty() {
            return Err(VigilError::missing_field("name"));
        }
        if rule.id.is_empty() || self.alert_rules.iter().any(|r| r.id == rule.id) {
            rule.id = Uuid::new_v4().to_string();
        }
        self.alert_rules.push(rule.clone());
        Ok(rule)
    }

    /// Replace a rule in place, keeping its position and creation time.
    pub fn update_rule(&mut self, rule: CustomAlertRule) -> VigilResult<CustomAlertRule> {
        let existing = self
            .alert_rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or_else(|| VigilError::not_found(ErrorCode::NfRule, "Alert rule", rule.id.as_str()))?;
        let created_at = existing.created_at;
        *existing = CustomAlertRule { created_at, ..rule };
        Ok(existing.clone())
    }

    pub fn remove_rule(&mut self, id: &str) -> VigilResult<()> {
        let before = self.alert_rules.len();
        self.alert_rules.retain(|r| r.id != id);
        if self.alert_rules.len() == before {
            return Err(VigilError::not_found(ErrorCode::NfRule, "Alert rule", id));
        }
        Ok(())
    }

    /// Flip a rule on or off, returning its new state.
    pub fn toggle_rule(&mut self, id: &str) -> VigilResult<bool> {
        let rule = self
            .alert_rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| VigilError::not_found(ErrorCode::NfRule, "Alert rule", id))?;
        rule.enabled = !rule.enabled;
        Ok(rule.enabled)
    }

    /// Keep only the first `limit` rules. Returns how many were dropped.
    pub fn truncate_rules(&mut self, limit: usize) -> usize {
        let dropped = self.alert_rules.len().saturating_sub(limit);
        self.alert_rules.truncate(limit);
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalDomain;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 5, h, m, 0).unwrap()
    }

    #[test]
    fn test_defaults() {
        let prefs = IntelligentPreferences::default();
        assert_eq!(prefs.active_persona().id, DEFAULT_PERSONA_ID);
        assert!(prefs.learning_enabled);
        assert!(!prefs.quiet_hours.enabled);
        assert_eq!(prefs.personas().len(), 5);
        assert!(prefs.is_well_formed());
    }

    #[test]
    fn test_deleting_active_custom_persona_falls_back() {
        let mut prefs = IntelligentPreferences::default();
        let persona = prefs.add_persona(Persona::new("Night owl")).unwrap();
        prefs.set_active_persona(&persona.id).unwrap();
        assert_eq!(prefs.active_persona().name, "Night owl");

        prefs.remove_persona(&persona.id).unwrap();
        assert_eq!(prefs.active_persona_id, DEFAULT_PERSONA_ID);
    }

    #[test]
    fn test_built_in_personas_are_immutable() {
        let mut prefs = IntelligentPreferences::default();
        let err = prefs.remove_persona("executive").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValImmutable);

        let impostor = Persona {
            id: "executive".to_string(),
            built_in: true,
            ..Persona::new("Fake exec")
        };
        let added = prefs.add_persona(impostor).unwrap();
        assert_ne!(added.id, "executive");
        assert!(!added.built_in);
    }

    #[test]
    fn test_unknown_ids() {
        let mut prefs = IntelligentPreferences::default();
        assert_eq!(prefs.set_active_persona("nope").unwrap_err().code(), ErrorCode::NfPersona);
        assert_eq!(
            prefs.activate_focus("nope", None, Utc::now()).unwrap_err().code(),
            ErrorCode::NfFocusZone
        );
        assert_eq!(prefs.toggle_rule("nope").unwrap_err().code(), ErrorCode::NfRule);
    }

    #[test]
    fn test_focus_lifecycle() {
        let now = Utc::now();
        let mut prefs = IntelligentPreferences::default();
        let zone = prefs
            .add_focus_zone(FocusZone::new("Filing week", vec![SignalDomain::Regulatory], now))
            .unwrap();

        prefs.activate_focus(&zone.id, Some(Duration::hours(1)), now).unwrap();
        assert!(!prefs.expire_focus(now + Duration::minutes(59)));
        assert!(prefs.expire_focus(now + Duration::hours(1)));
        assert!(prefs.active_focus.is_none());

        prefs.activate_focus(&zone.id, None, now).unwrap();
        prefs.remove_focus_zone(&zone.id).unwrap();
        assert!(prefs.active_focus.is_none());
    }

    #[test]
    fn test_zone_without_domains_rejected() {
        let mut prefs = IntelligentPreferences::default();
        assert!(prefs.add_focus_zone(FocusZone::new("Empty", vec![], Utc::now())).is_err());
    }

    #[test]
    fn test_rule_update_keeps_created_at() {
        let created = at(9, 0);
        let mut prefs = IntelligentPreferences::default();
        let rule = prefs.add_rule(CustomAlertRule::new("acme", created)).unwrap();

        let edited = CustomAlertRule {
            id: rule.id.clone(),
            ..CustomAlertRule::new("acme renamed", at(12, 0))
        };
        let updated = prefs.update_rule(edited).unwrap();
        assert_eq!(updated.name, "acme renamed");
        assert_eq!(updated.created_at, created);

        assert!(!prefs.toggle_rule(&rule.id).unwrap());
        assert!(prefs.toggle_rule(&rule.id).unwrap());
        prefs.remove_rule(&rule.id).unwrap();
        assert!(prefs.alert_rules.is_empty());
    }

    #[test]
    fn test_snooze_is_read_time() {
        let now = at(10, 0);
        let prefs = IntelligentPreferences {
            snoozed_until: Some(now + Duration::minutes(30)),
            ..Default::default()
        };
        assert!(prefs.is_snoozed(now));
        assert_eq!(prefs.snooze_end(now), Some(now + Duration::minutes(30)));
        assert!(!prefs.is_snoozed(now + Duration::minutes(30)));
        assert_eq!(prefs.snooze_end(now + Duration::hours(1)), None);
    }

    #[test]
    fn test_digest_slots() {
        let schedule = DigestSchedule::default();
        assert_eq!(schedule.last_slot(at(9, 0)), Some(at(8, 0)));
        assert_eq!(schedule.last_slot(at(18, 0)), Some(at(17, 0)));
        // Before 08:00 the last slot is yesterday's 17:00.
        assert_eq!(schedule.last_slot(at(7, 0)), Some(at(17, 0) - Duration::days(1)));

        assert!(schedule.is_due(at(9, 0), None));
        assert!(schedule.is_due(at(9, 0), Some(at(7, 59))));
        assert!(!schedule.is_due(at(9, 0), Some(at(8, 30))));
        assert!(schedule.is_due(at(17, 0), Some(at(8, 30))));

        let off = DigestSchedule {
            enabled: false,
            ..Default::default()
        };
        assert!(!off.is_due(at(9, 0), None));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let prefs: IntelligentPreferences =
            serde_json::from_value(serde_json::json!({"active_persona_id": "analyst"})).unwrap();
        assert_eq!(prefs.active_persona().id, "analyst");
        assert!(prefs.learning_enabled);
        assert_eq!(prefs.digest_schedule.times.len(), 2);
    }
}
