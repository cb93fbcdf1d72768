//! vigil-core - Core library for vigil.
//!
//! This crate decides, for each incoming signal, whether, when and how
//! insistently to surface it to a single user without overwhelming them.
//! It provides the scoring function, the delivery budget, the preference
//! policy, clustering, behavior learning and the durable store they share.
//!
//! # Example
//!
//! ```ignore
//! use vigil_core::{Priority, Signal, SignalDomain, SignalEngine};
//!
//! let engine = SignalEngine::in_memory();
//! let signal = Signal::new("sig-1", "New filing rule", SignalDomain::Regulatory, Priority::Critical, 0.9, chrono::Utc::now());
//!
//! if let Some(delivered) = engine.process_signal(&signal) {
//!     println!("{} ({:?}, SIS {})", delivered.title, delivered.urgency, delivered.sis);
//! }
//! ```

pub mod clustering;
pub mod config;
pub mod engine;
pub mod error;
pub mod fatigue;
pub mod learning;
pub mod persistence;
pub mod preferences;
pub mod scoring;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use clustering::{ClusterBuilder, NotificationCluster};
pub use config::VigilConfig;
pub use engine::{
    Clock, Digest, DrainReport, ManualClock, ProcessOutcome, RejectReason, SignalEngine,
    SystemClock,
};
pub use error::{ErrorCode, VigilError, VigilResult};
pub use fatigue::{BudgetStatus, DeliveryCounters, FatigueDecision, FatigueGuard, FatigueReason};
pub use learning::{BehaviorLearner, Interaction, UserBehaviorData};
pub use persistence::{KeyValueStore, MemoryStore, SqliteStore};
pub use preferences::{
    ActiveFocus, BatchingMode, CustomAlertRule, DenyReason, DigestSchedule, FocusZone,
    IntelligentPreferences, NotifyDecision, Persona, PreferenceEngine, QuietHoursConfig,
};
pub use scoring::{determine_urgency, SignalScorer};
pub use store::{DeferReason, QueuedSignal};
pub use types::{IntelligentSignal, Priority, RawSignal, Signal, SignalContext, SignalDomain, Urgency};
