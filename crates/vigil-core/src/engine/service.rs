//! The signal engine: scoring, gating, delivery, deferral and learning.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::outcome::{Digest, DrainReport, ProcessOutcome, RejectReason};
use crate::clustering::{ClusterBuilder, NotificationCluster};
use crate::config::VigilConfig;
use crate::error::VigilResult;
use crate::fatigue::{DeliveryCounters, FatigueGuard};
use crate::learning::{BehaviorLearner, Interaction, UserBehaviorData};
use crate::persistence::{
    BehaviorRepository, ClusterRepository, CountersRepository, KeyValueStore, MemoryStore,
    PreferencesRepository, QueueRepository, SignalRepository, SqliteStore,
};
use crate::preferences::{IntelligentPreferences, NotifyDecision, Persona, PreferenceEngine};
use crate::scoring::{determine_urgency, SignalScorer};
use crate::store::{DeferReason, DeferredQueue, QueuedSignal, SignalArchive};
use crate::types::{IntelligentSignal, RawSignal, Signal, SignalContext, Urgency};

/// Single-user notification decision service.
///
/// Holds no state of its own beyond configuration: every call loads the
/// aggregates it needs through the repositories and writes back what changed.
/// Mutating calls are serialized internally, so one engine can be shared behind
/// an `Arc`.
pub struct SignalEngine {
    pub(super) config: VigilConfig,
    pub(super) clock: Arc<dyn Clock>,
    scorer: SignalScorer,
    learner: BehaviorLearner,
    cluster_builder: ClusterBuilder,
    pub(super) preferences: PreferencesRepository,
    signals: SignalRepository,
    queue: QueueRepository,
    pub(super) behavior: BehaviorRepository,
    counters: CountersRepository,
    clusters: ClusterRepository,
    write_lock: Mutex<()>,
}

impl SignalEngine {
    /// Create an engine over an existing store.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: VigilConfig) -> Self {
        let retention = config.retention.clone();
        Self {
            scorer: SignalScorer::new(config.scoring.clone()),
            learner: BehaviorLearner::new(config.learning.learning_rate),
            cluster_builder: ClusterBuilder::new(&config.clustering),
            preferences: PreferencesRepository::new(store.clone(), retention.clone()),
            signals: SignalRepository::new(store.clone(), retention.clone()),
            queue: QueueRepository::new(store.clone(), retention.clone()),
            behavior: BehaviorRepository::new(store.clone(), retention.clone()),
            counters: CountersRepository::new(store.clone(), retention.clone()),
            clusters: ClusterRepository::new(store, retention),
            config,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Open the store described by `config.storage` with the system clock.
    pub fn open(config: VigilConfig) -> VigilResult<Self> {
        let store: Arc<dyn KeyValueStore> = match &config.storage.db_path {
            Some(path) => {
                debug!(path = %path.display(), "Opening SQLite store");
                let mut store = SqliteStore::new(path)?;
                if let Some(limit) = config.storage.max_value_bytes {
                    store = store.with_max_value_bytes(limit);
                }
                Arc::new(store)
            }
            None => {
                debug!("Using in-memory store");
                let mut store = MemoryStore::new();
                if let Some(limit) = config.storage.max_value_bytes {
                    store = store.with_max_value_bytes(limit);
                }
                Arc::new(store)
            }
        };
        Ok(Self::new(store, Arc::new(SystemClock), config))
    }

    /// In-memory engine with default configuration.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            VigilConfig::default(),
        )
    }

    pub fn config(&self) -> &VigilConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Load preferences and drop an expired focus.
    pub(super) fn load_preferences(&self, now: DateTime<Utc>) -> IntelligentPreferences {
        let mut prefs = self.preferences.load_or_default();
        if prefs.expire_focus(now) {
            info!("Focus ended");
            self.preferences.save(&prefs);
        }
        prefs
    }

    fn fatigue_guard(&self, persona: &Persona) -> FatigueGuard {
        FatigueGuard::new(&self.config.fatigue).with_limits(persona.hourly_limit, persona.daily_limit)
    }

    // ------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------

    /// Score and route one signal. Returns the signal if it was delivered now.
    pub fn process_signal(&self, signal: &Signal) -> Option<IntelligentSignal> {
        self.evaluate_signal(signal).delivered()
    }

    /// Process a lenient JSON signal. Malformed input is logged and ignored.
    pub fn process_raw(&self, value: serde_json::Value) -> Option<IntelligentSignal> {
        let raw: RawSignal = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed signal");
                return None;
            }
        };
        match raw.into_signal(self.clock.now()) {
            Ok(signal) => self.process_signal(&signal),
            Err(e) => {
                warn!(error = %e, "Ignoring invalid signal");
                None
            }
        }
    }

    /// Score and route one signal, reporting what happened to it.
    pub fn evaluate_signal(&self, signal: &Signal) -> ProcessOutcome {
        if let Err(e) = signal.validate() {
            warn!(id = %signal.id, error = %e, "Rejecting invalid signal");
            return ProcessOutcome::Rejected {
                reason: RejectReason::Invalid,
            };
        }

        let _guard = self.lock();
        let now = self.clock.now();

        let mut archive = self.signals.load_or_default();
        let mut queue = self.queue.load_or_default();
        if archive.contains(&signal.id) || queue.contains(&signal.id) {
            debug!(id = %signal.id, "Ignoring duplicate signal");
            return ProcessOutcome::Rejected {
                reason: RejectReason::Duplicate,
            };
        }

        let prefs = self.load_preferences(now);
        let behavior = self.behavior.load();
        let (sis, urgency) = self.scorer.score(signal, behavior.as_ref(), now);
        let mut scored = IntelligentSignal::from_signal(signal, sis, urgency, now);
        debug!(id = %scored.id, sis, urgency = %urgency, "Signal scored");

        let policy = PreferenceEngine::new(&prefs);
        let decision = policy.should_notify(&SignalContext::from(signal), now);
        if let Some(reason) = decision.reason.filter(|_| !decision.allowed) {
            let defer = match decision.route_to {
                Some(Urgency::Digest) => DeferReason::Digest,
                _ => DeferReason::Preference { reason },
            };
            if let Some(route) = decision.route_to {
                scored.urgency = route;
            }
            return self.enqueue(&mut queue, scored, defer, now);
        }

        apply_effects(&mut scored, &decision);
        let persona = policy.active_persona();
        if persona.batching.holds(scored.urgency) {
            return self.enqueue(&mut queue, scored, DeferReason::Digest, now);
        }

        let guard = self.fatigue_guard(&persona);
        let mut counters = self.counters.load_or_default();
        let check = guard.check(&counters, scored.urgency, now);
        if let Some(reason) = check.reason.filter(|_| !check.allowed) {
            return self.enqueue(&mut queue, scored, DeferReason::Fatigue { reason }, now);
        }

        let mut clusters = self.clusters.load_or_default();
        let delivered = self.deliver(scored, &guard, &mut counters, &mut archive, &mut clusters, now);
        self.counters.save(&counters);
        self.signals.save(&archive);
        self.clusters.save(&clusters);

        ProcessOutcome::Delivered { signal: delivered }
    }

    fn enqueue(
        &self,
        queue: &mut DeferredQueue,
        signal: IntelligentSignal,
        reason: DeferReason,
        now: DateTime<Utc>,
    ) -> ProcessOutcome {
        let id = signal.id.clone();
        if !queue.push(QueuedSignal::new(signal.clone(), reason, now), self.config.retention.max_queue) {
            warn!(id = %id, "Queue full, dropping signal");
            return ProcessOutcome::Rejected {
                reason: RejectReason::QueueFull,
            };
        }
        self.queue.save(queue);
        debug!(id = %id, ?reason, queued = queue.len(), "Signal deferred");
        ProcessOutcome::Queued { signal, reason }
    }

    fn deliver(
        &self,
        mut signal: IntelligentSignal,
        guard: &FatigueGuard,
        counters: &mut DeliveryCounters,
        archive: &mut SignalArchive,
        clusters: &mut Vec<NotificationCluster>,
        now: DateTime<Utc>,
    ) -> IntelligentSignal {
        guard.record_delivery(counters, now);
        signal.cluster_id = self.cluster_builder.find_or_create_cluster(clusters, &signal, now);
        self.cluster_builder.prune(clusters, self.config.retention.max_clusters);
        archive.insert(signal.clone(), self.config.retention.max_signals);
        info!(
            id = %signal.id,
            sis = signal.sis,
            urgency = %signal.urgency,
            hourly = counters.hourly_count(now),
            daily = counters.daily_count(now),
            "Signal delivered"
        );
        signal
    }

    /// Retry deferred signals, highest SIS first.
    ///
    /// Every entry goes through the preference gates and the fatigue guard again.
    /// Entries still refused stay queued with `attempts` incremented. Entries held
    /// for the digest are left alone.
    pub fn process_queue(&self) -> DrainReport {
        let _guard = self.lock();
        let now = self.clock.now();

        let mut queue = self.queue.load_or_default();
        let pending = queue.take_pending();
        if pending.is_empty() {
            return DrainReport {
                remaining: queue.len(),
                ..Default::default()
            };
        }

        let prefs = self.load_preferences(now);
        let policy = PreferenceEngine::new(&prefs);
        let persona = policy.active_persona();
        let guard = self.fatigue_guard(&persona);
        let mut counters = self.counters.load_or_default();
        let mut archive = self.signals.load_or_default();
        let mut clusters = self.clusters.load_or_default();

        let mut report = DrainReport::default();
        let mut kept = Vec::new();

        for mut entry in pending {
            if archive.contains(entry.id()) {
                report.dropped += 1;
                continue;
            }

            let decision = policy.should_notify(&SignalContext::from(&entry.signal), now);
            if let Some(reason) = decision.reason.filter(|_| !decision.allowed) {
                if decision.route_to == Some(Urgency::Digest) {
                    entry.signal.urgency = Urgency::Digest;
                    entry.reason = DeferReason::Digest;
                    report.moved_to_digest += 1;
                } else {
                    if let Some(route) = decision.route_to {
                        entry.signal.urgency = route;
                    }
                    entry.reason = DeferReason::Preference { reason };
                    entry.attempts += 1;
                }
                kept.push(entry);
                continue;
            }

            // Undo any routing applied while the signal was held.
            entry.signal.urgency = determine_urgency(entry.signal.sis, entry.signal.priority);
            apply_effects(&mut entry.signal, &decision);

            if persona.batching.holds(entry.signal.urgency) {
                entry.reason = DeferReason::Digest;
                report.moved_to_digest += 1;
                kept.push(entry);
                continue;
            }

            let check = guard.check(&counters, entry.signal.urgency, now);
            if let Some(reason) = check.reason.filter(|_| !check.allowed) {
                entry.reason = DeferReason::Fatigue { reason };
                entry.attempts += 1;
                kept.push(entry);
                continue;
            }

            let delivered =
                self.deliver(entry.signal, &guard, &mut counters, &mut archive, &mut clusters, now);
            report.delivered.push(delivered);
        }

        queue.restore(kept);
        report.remaining = queue.len();
        self.queue.save(&queue);
        if !report.delivered.is_empty() {
            self.counters.save(&counters);
            self.signals.save(&archive);
            self.clusters.save(&clusters);
        }

        info!(
            delivered = report.delivered.len(),
            remaining = report.remaining,
            moved_to_digest = report.moved_to_digest,
            dropped = report.dropped,
            "Queue processed"
        );
        report
    }

    /// Whether a digest slot has passed since the last digest.
    pub fn digest_due(&self) -> bool {
        let now = self.clock.now();
        let prefs = self.preferences.load_or_default();
        let queue = self.queue.load_or_default();
        prefs.digest_schedule.is_due(now, queue.last_digest_at)
    }

    /// Deliver everything held for the digest.
    ///
    /// Returns `None` when no digest is due (unless `force`) or when the daily
    /// budget is spent. A digest costs one unit of budget however many signals it
    /// carries.
    pub fn take_digest(&self, force: bool) -> Option<Digest> {
        let _guard = self.lock();
        let now = self.clock.now();

        let prefs = self.load_preferences(now);
        let mut queue = self.queue.load_or_default();
        if !force && !prefs.digest_schedule.is_due(now, queue.last_digest_at) {
            return None;
        }

        let held = queue.take_digest();
        let mut counters = self.counters.load_or_default();
        let guard = self.fatigue_guard(&prefs.active_persona());
        if !held.is_empty() && counters.daily_count(now) >= guard.daily_limit() {
            warn!(held = held.len(), "Daily budget spent, postponing digest");
            return None;
        }

        queue.last_digest_at = Some(now);
        if held.is_empty() {
            self.queue.save(&queue);
            return Some(Digest {
                generated_at: now,
                signals: Vec::new(),
                clusters: Vec::new(),
            });
        }

        let mut archive = self.signals.load_or_default();
        let mut clusters = self.clusters.load_or_default();
        let mut digest_clusters = Vec::new();
        let mut signals: Vec<IntelligentSignal> = held
            .into_iter()
            .map(|entry| entry.signal)
            .filter(|signal| !archive.contains(&signal.id))
            .collect();

        // Cluster in arrival order so each window opens at its earliest member.
        let mut by_arrival: Vec<usize> = (0..signals.len()).collect();
        by_arrival.sort_by_key(|&i| signals[i].created_at);
        for i in by_arrival {
            let cluster_id =
                self.cluster_builder
                    .find_or_create_cluster(&mut digest_clusters, &signals[i], now);
            signals[i].cluster_id = cluster_id;
        }
        for signal in &signals {
            archive.insert(signal.clone(), self.config.retention.max_signals);
        }

        guard.record_delivery(&mut counters, now);
        clusters.extend(digest_clusters.iter().cloned());
        self.cluster_builder.prune(&mut clusters, self.config.retention.max_clusters);

        self.queue.save(&queue);
        self.counters.save(&counters);
        self.signals.save(&archive);
        self.clusters.save(&clusters);

        info!(signals = signals.len(), clusters = digest_clusters.len(), "Digest delivered");
        Some(Digest {
            generated_at: now,
            signals,
            clusters: digest_clusters,
        })
    }

    // ------------------------------------------------------------------
    // Interactions
    // ------------------------------------------------------------------

    /// Mark a delivered signal read. Returns `false` if it is unknown.
    pub fn mark_read(&self, id: &str) -> bool {
        self.interact(id, Interaction::Read, |signal, now| {
            if signal.read_at.is_some() {
                return false;
            }
            signal.read_at = Some(now);
            true
        })
    }

    /// Dismiss a delivered signal. Returns `false` if it is unknown.
    pub fn dismiss(&self, id: &str) -> bool {
        self.interact(id, Interaction::Dismiss, |signal, now| {
            if signal.dismissed_at.is_some() {
                return false;
            }
            signal.dismissed_at = Some(now);
            true
        })
    }

    /// Record -1/0/1 feedback on a delivered signal.
    pub fn feedback(&self, id: &str, score: i8) -> bool {
        if !(-1..=1).contains(&score) {
            warn!(id, score, "Ignoring out-of-range feedback");
            return false;
        }
        self.interact(id, Interaction::Feedback(score), |signal, _| {
            signal.feedback_score = Some(score);
            true
        })
    }

    /// Apply `update` to the stored signal and, if it changed, learn from it.
    fn interact(
        &self,
        id: &str,
        interaction: Interaction,
        update: impl FnOnce(&mut IntelligentSignal, DateTime<Utc>) -> bool,
    ) -> bool {
        let _guard = self.lock();
        let now = self.clock.now();

        let mut archive = self.signals.load_or_default();
        let Some(signal) = archive.get_mut(id) else {
            warn!(id, ?interaction, "Interaction on unknown signal");
            return false;
        };
        let domain = signal.domain;
        if !update(signal, now) {
            return true;
        }
        self.signals.save(&archive);

        let prefs = self.preferences.load_or_default();
        if prefs.learning_enabled {
            let behavior = self.learner.record(self.behavior.load(), domain, interaction, now);
            self.behavior.save(&behavior);
        }
        true
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn signal(&self, id: &str) -> Option<IntelligentSignal> {
        self.signals.load_or_default().get(id).cloned()
    }

    /// Delivered signals that have not been dismissed, highest SIS first.
    pub fn active_signals(&self) -> Vec<IntelligentSignal> {
        self.signals.load_or_default().active()
    }

    pub fn unread_signals(&self) -> Vec<IntelligentSignal> {
        self.signals.load_or_default().unread()
    }

    pub fn unread_count(&self) -> usize {
        self.signals.load_or_default().unread_count()
    }

    pub fn queued_signals(&self) -> Vec<QueuedSignal> {
        self.queue.load_or_default().entries
    }

    pub fn clusters(&self) -> Vec<NotificationCluster> {
        self.clusters.load_or_default()
    }

    pub fn behavior(&self) -> Option<UserBehaviorData> {
        self.behavior.load()
    }

    pub fn budget_status(&self) -> crate::fatigue::BudgetStatus {
        let now = self.clock.now();
        let persona = self.preferences.load_or_default().active_persona();
        let counters = self.counters.load_or_default();
        self.fatigue_guard(&persona).budget_status(&counters, now)
    }
}

/// Fold matching rule effects into a deliverable signal.
fn apply_effects(signal: &mut IntelligentSignal, decision: &NotifyDecision) {
    signal.urgency = decision.effects.escalate(signal.urgency);
    signal.sound = decision.sound;
    signal.highlight = decision.effects.highlight;
}
