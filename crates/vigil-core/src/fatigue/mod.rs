//! Notification fatigue guard.
//!
//! Decides whether *any* delivery is permitted right now, independent of what the
//! signal is about:
//! - a rolling hourly and daily delivery cap
//! - a minimum gap between two deliveries
//! - budget preservation once most of the hourly budget is spent

mod counters;
mod guard;

pub use counters::{CounterWindow, DeliveryCounters};
pub use guard::{BudgetStatus, FatigueDecision, FatigueGuard, FatigueReason};
