//! Durable storage: the key-value abstraction, its implementations, and the
//! typed repositories the engine reads and writes through.

mod kv;
mod repository;
mod sqlite;

pub use kv::{KeyValueStore, MemoryStore};
pub use repository::{
    Aggregate, BehaviorRepository, ClusterRepository, CountersRepository, PreferencesRepository,
    QueueRepository, Repository, SaveOutcome, SignalRepository,
};
pub use sqlite::SqliteStore;
