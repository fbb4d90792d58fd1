//! Shared vocabulary between chat providers and the transcript assembler.
//!
//! A provider turns a user query into a response, and a response is a
//! sequence of [`Chunk`]s pulled one at a time. How the chunks travel
//! (server-sent events over HTTP, a scripted fixture, anything else) is
//! the provider's business; consumers only see this crate's types.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod chunk;
mod error;
mod provider;
mod request;
mod response;

pub use chunk::*;
pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
