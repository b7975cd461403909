//! Core types and error definitions for Lodestar.
//!
//! This crate provides the foundational types shared across all Lodestar crates,
//! including error handling, caller identity, tool call abstractions and the
//! text oracle seam used by both reasoning and reflection.
//!
//! # Main types
//!
//! - [`LodestarError`] — Unified error enum for all Lodestar subsystems.
//! - [`LodestarResult`] — Convenience alias for `Result<T, LodestarError>`.
//! - [`Caller`] — Role and permission labels a run acts under.
//! - [`Turn`] — One prior conversation exchange.
//! - [`ToolCall`] — A tool invocation requested by the reasoning loop.
//! - [`Oracle`] — Opaque text-in / text-out generation capability.

/// Caller identity.
pub mod caller;
/// Error taxonomy.
pub mod error;
/// Conversation history turns.
pub mod history;
/// Oracle trait and a scripted implementation.
pub mod oracle;
/// Tool call types.
pub mod tool;

pub use caller::Caller;
pub use error::{LodestarError, LodestarResult};
pub use history::Turn;
pub use oracle::{Oracle, ScriptedOracle};
pub use tool::{ActionInput, ToolCall};
