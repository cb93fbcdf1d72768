//! Preference queries and mutations on the engine.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::info;

use super::service::SignalEngine;
use crate::error::{VigilError, VigilResult};
use crate::preferences::{
    ActiveFocus, CustomAlertRule, DigestSchedule, FocusZone, IntelligentPreferences, Persona,
    PreferenceEngine, QuietHoursConfig,
};

fn check_timezone(name: &str) -> VigilResult<()> {
    name.parse::<Tz>().map(|_| ()).map_err(|_| {
        VigilError::validation_with_suggestion(
            format!("Unknown timezone '{}'", name),
            "Use an IANA name such as 'Europe/Berlin' or 'UTC'",
        )
    })
}

impl SignalEngine {
    /// Load, change and save the preferences under the write lock.
    fn update_preferences<T>(
        &self,
        change: impl FnOnce(&mut IntelligentPreferences, DateTime<Utc>) -> VigilResult<T>,
    ) -> VigilResult<T> {
        let _guard = self.lock();
        let now = self.clock.now();
        let mut prefs = self.load_preferences(now);
        let result = change(&mut prefs, now)?;
        self.preferences.save(&prefs);
        Ok(result)
    }

    pub fn preferences(&self) -> IntelligentPreferences {
        self.preferences.load_or_default()
    }

    pub fn active_persona(&self) -> Persona {
        self.preferences.load_or_default().active_persona()
    }

    pub fn personas(&self) -> Vec<Persona> {
        self.preferences.load_or_default().personas()
    }

    /// The focus in effect now, manual or scheduled. Clears an expired one.
    pub fn active_focus(&self) -> Option<ActiveFocus> {
        let _guard = self.lock();
        let now = self.clock.now();
        let prefs = self.load_preferences(now);
        PreferenceEngine::new(&prefs).active_focus(now)
    }

    pub fn focus_zones(&self) -> Vec<FocusZone> {
        self.preferences.load_or_default().focus_zones
    }

    pub fn alert_rules(&self) -> Vec<CustomAlertRule> {
        self.preferences.load_or_default().alert_rules
    }

    pub fn quiet_hours(&self) -> QuietHoursConfig {
        self.preferences.load_or_default().quiet_hours
    }

    /// Whether quiet hours apply right now under the active persona.
    pub fn is_quiet_hours(&self) -> bool {
        let prefs = self.preferences.load_or_default();
        PreferenceEngine::new(&prefs).is_quiet_hours(self.clock.now())
    }

    pub fn is_snoozed(&self) -> bool {
        self.preferences.load_or_default().is_snoozed(self.clock.now())
    }

    pub fn snooze_end(&self) -> Option<DateTime<Utc>> {
        self.preferences.load_or_default().snooze_end(self.clock.now())
    }

    pub fn set_active_persona(&self, id: &str) -> VigilResult<Persona> {
        self.update_preferences(|prefs, _| {
            prefs.set_active_persona(id)?;
            let persona = prefs.active_persona();
            info!(persona = %persona.id, "Active persona changed");
            Ok(persona)
        })
    }

    pub fn create_persona(&self, persona: Persona) -> VigilResult<Persona> {
        self.update_preferences(|prefs, _| {
            let persona = prefs.add_persona(persona)?;
            info!(persona = %persona.id, name = %persona.name, "Persona created");
            Ok(persona)
        })
    }

    pub fn delete_persona(&self, id: &str) -> VigilResult<()> {
        self.update_preferences(|prefs, _| {
            prefs.remove_persona(id)?;
            info!(persona = id, "Persona deleted");
            Ok(())
        })
    }

    pub fn create_focus_zone(&self, zone: FocusZone) -> VigilResult<FocusZone> {
        if let Some(schedule) = &zone.schedule {
            check_timezone(&schedule.timezone)?;
        }
        self.update_preferences(|prefs, _| {
            let zone = prefs.add_focus_zone(zone)?;
            info!(zone = %zone.id, name = %zone.name, "Focus zone created");
            Ok(zone)
        })
    }

    /// Activate a zone, optionally for a limited time.
    pub fn activate_focus_zone(&self, id: &str, duration: Option<Duration>) -> VigilResult<ActiveFocus> {
        self.update_preferences(|prefs, now| {
            let focus = prefs.activate_focus(id, duration, now)?;
            info!(zone = id, ends_at = ?focus.ends_at, "Focus activated");
            Ok(focus)
        })
    }

    /// End a manual focus. Returns whether one was running.
    pub fn deactivate_focus(&self) -> bool {
        self.update_preferences(|prefs, _| Ok(prefs.deactivate_focus()))
            .unwrap_or(false)
    }

    pub fn delete_focus_zone(&self, id: &str) -> VigilResult<()> {
        self.update_preferences(|prefs, _| {
            prefs.remove_focus_zone(id)?;
            info!(zone = id, "Focus zone deleted");
            Ok(())
        })
    }

    pub fn create_alert_rule(&self, rule: CustomAlertRule) -> VigilResult<CustomAlertRule> {
        self.update_preferences(|prefs, _| {
            let rule = prefs.add_rule(rule)?;
            info!(rule = %rule.id, name = %rule.name, "Alert rule created");
            Ok(rule)
        })
    }

    pub fn update_alert_rule(&self, rule: CustomAlertRule) -> VigilResult<CustomAlertRule> {
        self.update_preferences(|prefs, _| prefs.update_rule(rule))
    }

    pub fn delete_alert_rule(&self, id: &str) -> VigilResult<()> {
        self.update_preferences(|prefs, _| prefs.remove_rule(id))
    }

    /// Flip a rule on or off, returning its new state.
    pub fn toggle_alert_rule(&self, id: &str) -> VigilResult<bool> {
        self.update_preferences(|prefs, _| prefs.toggle_rule(id))
    }

    pub fn set_quiet_hours(&self, quiet_hours: QuietHoursConfig) -> VigilResult<QuietHoursConfig> {
        check_timezone(&quiet_hours.timezone)?;
        self.update_preferences(|prefs, _| {
            prefs.quiet_hours = quiet_hours.clone();
            info!(
                enabled = quiet_hours.enabled,
                start = %quiet_hours.start,
                end = %quiet_hours.end,
                "Quiet hours updated"
            );
            Ok(quiet_hours)
        })
    }

    /// Snooze for `duration` from now. Returns the snooze end.
    pub fn snooze_for(&self, duration: Duration) -> VigilResult<DateTime<Utc>> {
        if duration <= Duration::zero() {
            return Err(VigilError::validation("Snooze duration must be positive"));
        }
        self.update_preferences(|prefs, now| {
            let until = now + duration;
            prefs.snoozed_until = Some(until);
            info!(%until, "Snoozed");
            Ok(until)
        })
    }

    pub fn snooze_until(&self, until: DateTime<Utc>) -> VigilResult<DateTime<Utc>> {
        self.update_preferences(|prefs, now| {
            if until <= now {
                return Err(VigilError::validation("Snooze end must be in the future"));
            }
            prefs.snoozed_until = Some(until);
            info!(%until, "Snoozed");
            Ok(until)
        })
    }

    /// Returns whether a snooze was running.
    pub fn unsnooze(&self) -> bool {
        self.update_preferences(|prefs, now| {
            let was_snoozed = prefs.is_snoozed(now);
            prefs.snoozed_until = None;
            Ok(was_snoozed)
        })
        .unwrap_or(false)
    }

    pub fn set_learning_enabled(&self, enabled: bool) {
        let _ = self.update_preferences(|prefs, _| {
            prefs.learning_enabled = enabled;
            info!(enabled, "Learning toggled");
            Ok(())
        });
    }

    pub fn set_digest_schedule(&self, schedule: DigestSchedule) -> VigilResult<DigestSchedule> {
        check_timezone(&schedule.timezone)?;
        self.update_preferences(|prefs, _| {
            prefs.digest_schedule = schedule.clone();
            Ok(schedule)
        })
    }

    /// Forget everything learned from interactions.
    pub fn clear_learning_data(&self) {
        let _guard = self.lock();
        if self.behavior.clear() {
            info!("Learning data cleared");
        }
    }

    /// Restore default preferences. Learned behavior is kept.
    pub fn reset_preferences(&self) {
        let _guard = self.lock();
        self.preferences.save(&IntelligentPreferences::default());
        info!("Preferences reset");
    }
}
