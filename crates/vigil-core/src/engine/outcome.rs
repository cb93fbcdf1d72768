//! Results returned by the engine's processing operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::clustering::NotificationCluster;
use crate::store::DeferReason;
use crate::types::IntelligentSignal;

/// Why a signal was neither delivered nor queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Failed validation.
    Invalid,
    /// Already delivered or queued.
    Duplicate,
    /// Scored below everything in a full queue.
    QueueFull,
}

/// What happened to one incoming signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Delivered { signal: IntelligentSignal },
    Queued {
        signal: IntelligentSignal,
        reason: DeferReason,
    },
    Rejected { reason: RejectReason },
}

impl ProcessOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ProcessOutcome::Delivered { .. })
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, ProcessOutcome::Queued { .. })
    }

    /// The delivered signal, if any.
    pub fn delivered(self) -> Option<IntelligentSignal> {
        match self {
            ProcessOutcome::Delivered { signal } => Some(signal),
            _ => None,
        }
    }
}

/// Summary of one queue drain pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrainReport {
    pub delivered: Vec<IntelligentSignal>,
    /// Entries left for the next pass.
    pub remaining: usize,
    /// Entries moved over to the digest.
    pub moved_to_digest: usize,
    /// Entries dropped because they were already delivered.
    pub dropped: usize,
}

/// Held signals delivered together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub generated_at: DateTime<Utc>,
    pub signals: Vec<IntelligentSignal>,
    pub clusters: Vec<NotificationCluster>,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}
