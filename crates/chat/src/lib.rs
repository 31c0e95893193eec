//! # Confab Chat
//!
//! The stateful heart of the service: the per-session context store and the
//! chat engine that turns one user message into one assistant reply.
//!
//! Everything else in the workspace is plumbing around these two types.

pub mod context;
pub mod engine;

pub use context::ContextStore;
pub use engine::{ChatEngine, DEFAULT_SYSTEM_PROMPT};
