//! The engine ties scoring, preferences, fatigue, clustering and learning
//! together over the repositories.

mod clock;
mod outcome;
mod service;
mod settings;

pub use clock::{Clock, ManualClock, SystemClock};
pub use outcome::{Digest, DrainReport, ProcessOutcome, RejectReason};
pub use service::SignalEngine;
