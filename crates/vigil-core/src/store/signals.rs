//! Record of delivered signals.

use serde::{Deserialize, Serialize};

use crate::types::IntelligentSignal;

/// Delivered signals, highest SIS first.
///
/// Signals are never deleted individually; retention drops the lowest scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalArchive {
    signals: Vec<IntelligentSignal>,
}

impl SignalArchive {
    pub fn new(mut signals: Vec<IntelligentSignal>) -> Self {
        signals.retain(|s| s.is_valid());
        let mut archive = Self { signals };
        archive.sort();
        archive
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.signals.iter().any(|s| s.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&IntelligentSignal> {
        self.signals.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut IntelligentSignal> {
        self.signals.iter_mut().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntelligentSignal> {
        self.signals.iter()
    }

    /// Insert a delivered signal and enforce `limit`.
    ///
    /// Returns `false` for duplicates and invalid signals.
    pub fn insert(&mut self, signal: IntelligentSignal, limit: usize) -> bool {
        if !signal.is_valid() || self.contains(&signal.id) {
            return false;
        }
        self.signals.push(signal);
        self.sort();
        self.truncate(limit);
        true
    }

    /// Keep the `limit` highest scoring signals. Returns how many were dropped.
    pub fn truncate(&mut self, limit: usize) -> usize {
        let dropped = self.signals.len().saturating_sub(limit);
        self.signals.truncate(limit);
        dropped
    }

    pub fn unread(&self) -> Vec<IntelligentSignal> {
        self.signals.iter().filter(|s| s.is_unread()).cloned().collect()
    }

    pub fn unread_count(&self) -> usize {
        self.signals.iter().filter(|s| s.is_unread()).count()
    }

    /// Signals that have not been dismissed.
    pub fn active(&self) -> Vec<IntelligentSignal> {
        self.signals.iter().filter(|s| !s.is_dismissed()).cloned().collect()
    }

    pub fn into_vec(self) -> Vec<IntelligentSignal> {
        self.signals
    }

    // Newer first among equal scores, so retention evicts the oldest.
    fn sort(&mut self) {
        self.signals
            .sort_by(|a, b| b.sis.cmp(&a.sis).then(b.created_at.cmp(&a.created_at)));
    }
}
