//! Signals held back by the guards or by batching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fatigue::FatigueReason;
use crate::preferences::DenyReason;
use crate::types::IntelligentSignal;

/// Why a signal is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeferReason {
    /// Out of delivery budget.
    Fatigue { reason: FatigueReason },
    /// Held by snooze, quiet hours or a focus zone.
    Preference { reason: DenyReason },
    /// Waiting for the next digest.
    Digest,
}

impl DeferReason {
    pub fn is_digest(&self) -> bool {
        matches!(self, DeferReason::Digest)
    }
}

/// One deferred signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedSignal {
    pub signal: IntelligentSignal,
    pub reason: DeferReason,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
}

impl QueuedSignal {
    pub fn new(signal: IntelligentSignal, reason: DeferReason, queued_at: DateTime<Utc>) -> Self {
        Self {
            signal,
            reason,
            queued_at,
            attempts: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.signal.id
    }
}

/// The persisted deferred queue, highest SIS first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeferredQueue {
    pub entries: Vec<QueuedSignal>,
    pub last_digest_at: Option<DateTime<Utc>>,
}

impl DeferredQueue {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id() == id)
    }

    /// Enqueue and enforce `limit`, dropping the lowest SIS.
    ///
    /// Returns `false` if the signal was already queued or was itself dropped.
    pub fn push(&mut self, entry: QueuedSignal, limit: usize) -> bool {
        if !entry.signal.is_valid() || self.contains(entry.id()) {
            return false;
        }
        let id = entry.signal.id.clone();
        self.entries.push(entry);
        self.sort();
        let dropped = self.truncate(limit);
        if dropped > 0 {
            tracing::debug!(dropped, limit, "Deferred queue over capacity");
        }
        self.contains(&id)
    }

    /// Keep the `limit` highest scoring entries. Returns how many were dropped.
    pub fn truncate(&mut self, limit: usize) -> usize {
        let dropped = self.entries.len().saturating_sub(limit);
        self.entries.truncate(limit);
        dropped
    }

    /// Remove and return entries the drain should retry, highest SIS first.
    pub fn take_pending(&mut self) -> Vec<QueuedSignal> {
        self.take_where(|e| !e.reason.is_digest())
    }

    /// Remove and return entries held for the digest, highest SIS first.
    pub fn take_digest(&mut self) -> Vec<QueuedSignal> {
        self.take_where(|e| e.reason.is_digest())
    }

    pub fn digest_len(&self) -> usize {
        self.entries.iter().filter(|e| e.reason.is_digest()).count()
    }

    /// Put entries back, e.g. after a drain pass.
    pub fn restore(&mut self, entries: Vec<QueuedSignal>) {
        self.entries.extend(entries);
        self.sort();
    }

    fn take_where(&mut self, pred: impl Fn(&QueuedSignal) -> bool) -> Vec<QueuedSignal> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| pred(e));
        self.entries = kept;
        taken
    }

    fn sort(&mut self) {
        self.entries.sort_by(|a, b| b.signal.sis.cmp(&a.signal.sis));
    }
}
