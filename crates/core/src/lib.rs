//! Core logic of the chat client: the transcript model, the reducer that
//! folds streamed chunks into it, and the assembler that drives requests.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod assembler;
pub mod grouping;
mod reducer;
mod stream_client;
pub mod transcript;

pub use assembler::{Assembler, AssemblerBuilder};
pub use reducer::{Event, FailureReason, Phase, Reducer, TransitionError};
