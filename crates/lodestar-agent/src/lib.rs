//! ReAct reasoning loop for Lodestar.
//!
//! Drives Thought → Action → Observation cycles against a text oracle,
//! parses each reply leniently, dispatches actions to a skill registry and
//! streams progress events over a bounded channel.
//!
//! # Main types
//!
//! - [`AgentRunner`] — The reasoning loop, streaming or accumulated.
//! - [`AgentEvent`] — Progress events of a streaming run.
//! - [`ParsedResponse`] — Tagged result of parsing one oracle reply.
//! - [`LlmClient`] — Oracle backed by the configured model provider.
//! - [`ModelConfig`] / [`AgentConfig`] — Model endpoint and loop limits.

/// Provider backends.
pub mod backends;
/// Model and loop configuration.
pub mod config;
/// The growing reasoning prompt.
pub mod context;
/// Provider-dispatching oracle client.
pub mod llm;
/// Oracle reply parsing.
pub mod parser;
/// The reasoning loop.
pub mod runner;
/// Streamed progress events.
pub mod stream;

pub use backends::ollama::OllamaBackend;
pub use config::{AgentConfig, LlmProvider, ModelConfig, DEFAULT_SYSTEM_PROMPT};
pub use context::ReasoningContext;
pub use llm::LlmClient;
pub use parser::{extract_answer, parse_response, ParsedResponse};
pub use runner::{truncate_observation, AgentResult, AgentRunner, TRUNCATION_MARKER};
pub use stream::{ActionRecord, AgentEvent, AgentStep, FinishReason, StepState};
