//! Typed access to one persisted aggregate per key.
//!
//! A repository hides the key and the JSON encoding, replaces unreadable state
//! with defaults, and retries a rejected write once with a smaller payload.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

use super::KeyValueStore;
use crate::clustering::NotificationCluster;
use crate::config::RetentionConfig;
use crate::error::{VigilError, VigilResult};
use crate::fatigue::DeliveryCounters;
use crate::learning::UserBehaviorData;
use crate::preferences::IntelligentPreferences;
use crate::store::{DeferredQueue, SignalArchive};

/// A value persisted whole under a fixed key.
pub trait Aggregate: Serialize + DeserializeOwned + Sized {
    /// Storage key.
    const KEY: &'static str;

    /// Shape check after decoding. Values failing it are treated as corrupt.
    fn is_well_formed(&self) -> bool {
        true
    }

    /// A smaller version to retry with after a capacity failure.
    fn shrink(&self, _retention: &RetentionConfig) -> Option<Self> {
        None
    }
}

/// Result of [`Repository::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The full value did not fit; a shrunk version was written instead.
    SavedTruncated,
    Failed,
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        !matches!(self, SaveOutcome::Failed)
    }
}

/// Typed gateway for one aggregate.
pub struct Repository<T> {
    store: Arc<dyn KeyValueStore>,
    retention: RetentionConfig,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            retention: self.retention.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Aggregate> Repository<T> {
    pub fn new(store: Arc<dyn KeyValueStore>, retention: RetentionConfig) -> Self {
        Self {
            store,
            retention,
            _marker: PhantomData,
        }
    }

    /// Decode the stored value.
    ///
    /// `Ok(None)` means nothing was stored. Undecodable or malformed values are
    /// reported as [`VigilError::CorruptState`].
    pub fn try_load(&self) -> VigilResult<Option<T>> {
        let Some(raw) = self.store.get(T::KEY)? else {
            return Ok(None);
        };
        let value: T =
            serde_json::from_str(&raw).map_err(|e| VigilError::corrupt(T::KEY, e.to_string()))?;
        if !value.is_well_formed() {
            return Err(VigilError::corrupt(T::KEY, "value failed validation"));
        }
        Ok(Some(value))
    }

    /// Load the value, treating any failure as absent.
    pub fn load(&self) -> Option<T> {
        match self.try_load() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = T::KEY, error = %e, "Falling back to defaults");
                None
            }
        }
    }

    /// Persist the value, retrying once with a shrunk payload on capacity errors.
    pub fn save(&self, value: &T) -> SaveOutcome {
        let err = match self.write(value) {
            Ok(()) => return SaveOutcome::Saved,
            Err(e) => e,
        };

        if !err.is_capacity_exceeded() {
            tracing::error!(key = T::KEY, error = %err, "Failed to persist");
            return SaveOutcome::Failed;
        }

        let Some(smaller) = value.shrink(&self.retention) else {
            tracing::error!(key = T::KEY, error = %err, "Store full and value cannot shrink");
            return SaveOutcome::Failed;
        };

        match self.write(&smaller) {
            Ok(()) => {
                tracing::warn!(key = T::KEY, "Store full, persisted a truncated value");
                SaveOutcome::SavedTruncated
            }
            Err(e) => {
                tracing::error!(key = T::KEY, error = %e, "Failed to persist truncated value");
                SaveOutcome::Failed
            }
        }
    }

    /// Delete the stored value. Returns whether the delete succeeded.
    pub fn clear(&self) -> bool {
        match self.store.remove(T::KEY) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(key = T::KEY, error = %e, "Failed to clear");
                false
            }
        }
    }

    fn write(&self, value: &T) -> VigilResult<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(T::KEY, &raw)
    }
}

impl<T: Aggregate + Default> Repository<T> {
    pub fn load_or_default(&self) -> T {
        self.load().unwrap_or_default()
    }
}

impl Aggregate for IntelligentPreferences {
    const KEY: &'static str = "vigil.preferences";

    fn is_well_formed(&self) -> bool {
        IntelligentPreferences::is_well_formed(self)
    }

    fn shrink(&self, retention: &RetentionConfig) -> Option<Self> {
        if self.alert_rules.len() <= retention.pressure_rules {
            return None;
        }
        let mut smaller = self.clone();
        smaller.truncate_rules(retention.pressure_rules);
        Some(smaller)
    }
}

impl Aggregate for SignalArchive {
    const KEY: &'static str = "vigil.signals";

    fn is_well_formed(&self) -> bool {
        self.iter().all(|s| s.is_valid() && s.sis <= 100)
    }

    fn shrink(&self, retention: &RetentionConfig) -> Option<Self> {
        if self.len() <= retention.pressure_signals {
            return None;
        }
        let mut smaller = self.clone();
        smaller.truncate(retention.pressure_signals);
        Some(smaller)
    }
}

impl Aggregate for DeferredQueue {
    const KEY: &'static str = "vigil.queue";

    fn is_well_formed(&self) -> bool {
        self.entries.iter().all(|e| e.signal.is_valid())
    }

    fn shrink(&self, retention: &RetentionConfig) -> Option<Self> {
        if self.len() <= retention.pressure_queue {
            return None;
        }
        let mut smaller = self.clone();
        smaller.truncate(retention.pressure_queue);
        Some(smaller)
    }
}

impl Aggregate for UserBehaviorData {
    const KEY: &'static str = "vigil.behavior";

    fn is_well_formed(&self) -> bool {
        UserBehaviorData::is_well_formed(self)
    }
}

impl Aggregate for DeliveryCounters {
    const KEY: &'static str = "vigil.counters";
}

impl Aggregate for Vec<NotificationCluster> {
    const KEY: &'static str = "vigil.clusters";

    fn is_well_formed(&self) -> bool {
        self.iter().all(|c| !c.id.is_empty() && !c.signal_ids.is_empty())
    }

    fn shrink(&self, retention: &RetentionConfig) -> Option<Self> {
        let limit = retention.max_clusters / 2;
        if self.len() <= limit {
            return None;
        }
        let mut smaller = self.clone();
        smaller.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        smaller.truncate(limit);
        Some(smaller)
    }
}

pub type PreferencesRepository = Repository<IntelligentPreferences>;
pub type SignalRepository = Repository<SignalArchive>;
pub type QueueRepository = Repository<DeferredQueue>;
pub type BehaviorRepository = Repository<UserBehaviorData>;
pub type CountersRepository = Repository<DeliveryCounters>;
pub type ClusterRepository = Repository<Vec<NotificationCluster>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::preferences::CustomAlertRule;
    use crate::types::{IntelligentSignal, Priority, Signal, SignalDomain, Urgency};
    use chrono::Utc;

    fn scored(i: usize) -> IntelligentSignal {
        let now = Utc::now();
        let signal = Signal::new(format!("sig-{}", i), "A reasonably long signal title", SignalDomain::Market, Priority::Medium, 0.5, now);
        IntelligentSignal::from_signal(&signal, (i % 100) as u8, Urgency::Batched, now)
    }

    fn retention() -> RetentionConfig {
        RetentionConfig {
            pressure_signals: 2,
            pressure_rules: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_key_loads_default() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let repo = CountersRepository::new(store, RetentionConfig::default());
        assert_eq!(repo.load(), None);
        assert_eq!(repo.load_or_default(), DeliveryCounters::default());
    }

    #[test]
    fn test_corrupt_value_falls_back() {
        let store = Arc::new(MemoryStore::new());
        store.set("vigil.preferences", "{not json").unwrap();
        let repo = PreferencesRepository::new(store.clone(), RetentionConfig::default());

        assert!(matches!(repo.try_load(), Err(VigilError::CorruptState { .. })));
        assert_eq!(repo.load_or_default(), IntelligentPreferences::default());

        // Decodes but fails the shape check.
        store
            .set("vigil.preferences", r#"{"active_persona_id": ""}"#)
            .unwrap();
        assert!(repo.try_load().is_err());
    }

    #[test]
    fn test_round_trip() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let repo = SignalRepository::new(store, RetentionConfig::default());
        let mut archive = SignalArchive::default();
        archive.insert(scored(1), 10);
        archive.insert(scored(2), 10);

        assert_eq!(repo.save(&archive), SaveOutcome::Saved);
        assert_eq!(repo.load(), Some(archive));
        assert!(repo.clear());
        assert_eq!(repo.load(), None);
    }

    #[test]
    fn test_capacity_retry_truncates_signals() {
        let mut archive = SignalArchive::default();
        for i in 0..20 {
            archive.insert(scored(i), 200);
        }
        let full = serde_json::to_string(&archive).unwrap().len();
        let two = serde_json::to_string(&archive.clone().into_vec()[..2].to_vec()).unwrap().len();

        let store: Arc<dyn KeyValueStore> =
            Arc::new(MemoryStore::new().with_max_value_bytes((full + two) / 2));
        let repo = SignalRepository::new(store, retention());

        assert_eq!(repo.save(&archive), SaveOutcome::SavedTruncated);
        let saved = repo.load().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved.iter().next().unwrap().sis, 19);
    }

    #[test]
    fn test_capacity_retry_truncates_rules() {
        let now = Utc::now();
        let mut prefs = IntelligentPreferences::default();
        for i in 0..10 {
            prefs
                .add_rule(CustomAlertRule::new(format!("rule number {}", i), now))
                .unwrap();
        }
        let full = serde_json::to_string(&prefs).unwrap().len();
        let store: Arc<dyn KeyValueStore> =
            Arc::new(MemoryStore::new().with_max_value_bytes(full - 1));
        let repo = PreferencesRepository::new(store, retention());

        assert_eq!(repo.save(&prefs), SaveOutcome::SavedTruncated);
        let saved = repo.load().unwrap();
        assert_eq!(saved.alert_rules.len(), 1);
        assert_eq!(saved.alert_rules[0].name, "rule number 0");
    }

    #[test]
    fn test_second_failure_is_reported() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new().with_max_value_bytes(1));
        let repo = CountersRepository::new(store.clone(), retention());
        assert_eq!(repo.save(&DeliveryCounters::default()), SaveOutcome::Failed);

        let repo = SignalRepository::new(store, retention());
        let mut archive = SignalArchive::default();
        for i in 0..5 {
            archive.insert(scored(i), 200);
        }
        assert_eq!(repo.save(&archive), SaveOutcome::Failed);
    }
}
