//! Skill system for Lodestar.
//!
//! A skill is a named operation the reasoning loop may dispatch to. Every
//! skill shares one signature: parsed action input plus the caller in, an
//! observation string out.
//!
//! # Main types
//!
//! - [`Skill`] — Trait all skills implement.
//! - [`SkillDescriptor`] — Name, description, input example and side-effect label.
//! - [`SkillRegistry`] — Name-keyed registry with timed invocation.

/// Name-keyed skill registry.
pub mod registry;
/// Skill trait and descriptor.
pub mod skill;

pub use registry::{SkillRegistry, FINAL_ANSWER};
pub use skill::{Skill, SkillDescriptor};
