//! Core types for vigil.

mod signal;

pub use signal::*;
