//! A terminal client for chat services that stream their answers.
//!
//! Besides the `chatstream` binary, the crate exposes the pieces it is
//! built from, so other front ends can reuse them.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod follow;
mod printer;
mod settings;

pub use follow::{ResponseEvent, TICK_INTERVAL, follow_response};
pub use printer::TranscriptPrinter;
pub use settings::{DEFAULT_BASE_URL, Settings, SettingsError};

/// Re-exports of [`chatstream_core`] crate.
pub mod core {
    pub use chatstream_core::*;
}
