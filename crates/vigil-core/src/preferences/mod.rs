//! Notification preferences: personas, quiet hours, snooze, focus zones and
//! custom alert rules, plus the policy that combines them.

mod focus;
mod model;
mod persona;
mod policy;
mod quiet_hours;
mod rules;

pub use focus::{ActiveFocus, FocusSchedule, FocusZone};
pub use model::{DigestSchedule, IntelligentPreferences};
pub use persona::{
    built_in_persona, built_in_personas, default_persona, BatchingMode, Persona,
    DEFAULT_PERSONA_ID,
};
pub use policy::{DenyReason, NotifyDecision, PreferenceEngine};
pub use quiet_hours::QuietHoursConfig;
pub use rules::{
    evaluate_rules, overrides_quiet_hours, ConditionField, ConditionOperator, CustomAlertRule, RuleAction,
    RuleCondition, RuleEffects, RuleLogic,
};
