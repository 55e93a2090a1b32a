//! ContextAssembler: composes a prompt-ready context string
//! from `memoria-profile` and `memoria-event` under a token budget, with an
//! optional LLM-driven profile filter when a chat tail is supplied.

pub mod assembler;
pub mod error;
pub mod types;

pub use assembler::ContextAssembler;
pub use error::{ContextError, Result};
pub use types::{AssembledContext, ChatTailMessage, ContextRequest};
