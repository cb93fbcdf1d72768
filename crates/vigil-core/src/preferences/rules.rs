//! Custom alert rules.
//!
//! Rules are evaluated after the deny gates and can only make a signal louder:
//! raise its urgency, add sound or highlight it. They never deny.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::types::{SignalContext, Urgency};

/// Signal attribute a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    Domain,
    Priority,
    Competitor,
    Topic,
    SignalType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    Contains,
    NotEquals,
}

/// How a rule combines its conditions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum RuleLogic {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: ConditionField,
    pub operator: ConditionOperator,
    pub value: String,
}

impl RuleCondition {
    pub fn new(field: ConditionField, operator: ConditionOperator, value: impl Into<String>) -> Self {
        Self {
            field,
            operator,
            value: value.into(),
        }
    }

    /// Case-insensitive comparison against the signal attribute.
    ///
    /// A missing attribute never equals or contains anything and always counts
    /// as not equal.
    pub fn matches(&self, ctx: &SignalContext<'_>) -> bool {
        let actual = match self.field {
            ConditionField::Domain => Some(ctx.domain.to_string()),
            ConditionField::Priority => Some(ctx.priority.to_string()),
            ConditionField::Competitor => ctx.competitor.map(str::to_string),
            ConditionField::Topic => ctx.topic.map(str::to_string),
            ConditionField::SignalType => ctx.signal_type.map(str::to_string),
        };
        let expected = self.value.to_lowercase();

        match (self.operator, actual) {
            (ConditionOperator::NotEquals, None) => true,
            (_, None) => false,
            (ConditionOperator::Equals, Some(actual)) => actual.to_lowercase() == expected,
            (ConditionOperator::Contains, Some(actual)) => {
                actual.to_lowercase().contains(&expected)
            }
            (ConditionOperator::NotEquals, Some(actual)) => actual.to_lowercase() != expected,
        }
    }
}

/// What a matching rule does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Raise the signal to at least this urgency.
    Urgency { level: Urgency },
    Sound,
    OverrideQuietHours,
    Highlight,
}

/// A user-defined escalation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomAlertRule {
    pub id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub logic: RuleLogic,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
    pub created_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl CustomAlertRule {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            enabled: true,
            conditions: Vec::new(),
            logic: RuleLogic::And,
            actions: Vec::new(),
            created_at: now,
        }
    }

    pub fn with_condition(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_logic(mut self, logic: RuleLogic) -> Self {
        self.logic = logic;
        self
    }

    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    /// A rule with no conditions never matches.
    pub fn matches(&self, ctx: &SignalContext<'_>) -> bool {
        if self.conditions.is_empty() {
            return false;
        }
        match self.logic {
            RuleLogic::And => self.conditions.iter().all(|c| c.matches(ctx)),
            RuleLogic::Or => self.conditions.iter().any(|c| c.matches(ctx)),
        }
    }

    /// The first urgency this rule escalates to, if any.
    pub fn urgency_action(&self) -> Option<Urgency> {
        self.actions.iter().find_map(|action| match action {
            RuleAction::Urgency { level } => Some(*level),
            _ => None,
        })
    }
}

/// Combined effect of every matching rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEffects {
    /// Urgency from the first matching rule that sets one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    pub sound: bool,
    pub highlight: bool,
    pub override_quiet_hours: bool,
    pub matched_rules: Vec<String>,
}

impl RuleEffects {
    /// Raise `urgency` if a matching rule asks for something more urgent.
    pub fn escalate(&self, urgency: Urgency) -> Urgency {
        match self.urgency {
            Some(level) if level.is_more_urgent_than(urgency) => level,
            _ => urgency,
        }
    }
}

/// Whether an enabled rule matching `ctx` carries an `OverrideQuietHours` action.
pub fn overrides_quiet_hours(rules: &[CustomAlertRule], ctx: &SignalContext<'_>) -> bool {
    rules.iter().any(|r| {
        r.enabled && r.actions.contains(&RuleAction::OverrideQuietHours) && r.matches(ctx)
    })
}

/// Evaluate enabled rules in order.
pub fn evaluate_rules(rules: &[CustomAlertRule], ctx: &SignalContext<'_>) -> RuleEffects {
    let mut effects = RuleEffects::default();

    for rule in rules.iter().filter(|r| r.enabled && r.matches(ctx)) {
        effects.matched_rules.push(rule.id.clone());
        if effects.urgency.is_none() {
            effects.urgency = rule.urgency_action();
        }
        for action in &rule.actions {
            match action {
                RuleAction::Sound => effects.sound = true,
                RuleAction::Highlight => effects.highlight = true,
                RuleAction::OverrideQuietHours => effects.override_quiet_hours = true,
                RuleAction::Urgency { .. } => {}
            }
        }
    }

    effects
}
