//! Delivered signals and the deferred queue.

mod queue;
mod signals;

pub use queue::{DeferReason, DeferredQueue, QueuedSignal};
pub use signals::SignalArchive;
