//! deepchat-core: Core types and streaming logic for deepchat
//!
//! This crate provides the pieces shared by every deepchat front end:
//! the delimiter-aware stream splitter, the token source boundary, the
//! per-generation driver, and conversation thread storage.

pub mod error;
pub mod generation;
pub mod hydrator;
pub mod message;
pub mod source;
pub mod thread;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::Error;
pub use generation::{Generation, GenerationOutcome, HydratedUpdate};
pub use hydrator::{MessageHydrator, Mode, THINK_END, THINK_START};
pub use message::{Message, Role};
pub use source::{GenerationEvent, GenerationRequest, TokenSource, TokenStream};
pub use thread::{Thread, ThreadFilter, ThreadStore};

pub type Result<T> = std::result::Result<T, Error>;
