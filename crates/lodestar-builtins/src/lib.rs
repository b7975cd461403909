//! Built-in skills for Lodestar.
//!
//! Provides the retrieval-backed search skills and the simulated team
//! integrations (tickets, chat, cluster commands, calendar).
//!
//! # Main entry points
//!
//! - [`register_builtins()`] — Register the integration skills, plus the
//!   search skills whose backends are supplied.

/// Simulated ticketing, chat, cluster and calendar skills.
pub mod integrations;
/// Code search over the hybrid retriever.
pub mod search_code;
/// Multi-hop document search.
pub mod search_docs;

pub use integrations::{CalendarEventSkill, JiraCreateSkill, K8sExecSkill, SlackPostSkill};
pub use search_code::SearchCodeSkill;
pub use search_docs::SearchDocsSkill;

use lodestar_core::LodestarResult;
use lodestar_retrieval::{HybridRetriever, MultiHopRetriever};
use lodestar_skills::SkillRegistry;
use std::sync::Arc;

/// Register the built-in skills into `registry`.
///
/// The search skills are only registered when their retrieval backend is
/// given, so the tool list shown to the oracle never advertises a search
/// that cannot run.
pub fn register_builtins(
    registry: &mut SkillRegistry,
    code: Option<Arc<HybridRetriever>>,
    docs: Option<Arc<MultiHopRetriever>>,
) -> LodestarResult<()> {
    if let Some(retriever) = code {
        registry.register(Arc::new(SearchCodeSkill::new(retriever)))?;
    }
    if let Some(retriever) = docs {
        registry.register(Arc::new(SearchDocsSkill::new(retriever)))?;
    }
    registry.register(Arc::new(JiraCreateSkill::new()))?;
    registry.register(Arc::new(SlackPostSkill::new()))?;
    registry.register(Arc::new(K8sExecSkill::new()))?;
    registry.register(Arc::new(CalendarEventSkill::new()))?;
    Ok(())
}
