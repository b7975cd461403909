use async_trait::async_trait;
use lodestar_core::{Caller, LodestarError, LodestarResult, ToolCall};
use lodestar_retrieval::{format_for_context, MultiHopRetriever, Source, DEFAULT_CONTEXT_CHARS};
use lodestar_skills::{Skill, SkillDescriptor};
use std::sync::Arc;
use tracing::debug;

/// Multi-hop document search rendered as prompt-ready context.
pub struct SearchDocsSkill {
    descriptor: SkillDescriptor,
    retriever: Arc<MultiHopRetriever>,
    max_chars: usize,
}

impl SearchDocsSkill {
    pub fn new(retriever: Arc<MultiHopRetriever>) -> Self {
        Self {
            descriptor: SkillDescriptor::new(
                "search_docs",
                "Search uploaded documents.",
                serde_json::json!({"query": "search terms"}),
            ),
            retriever,
            max_chars: DEFAULT_CONTEXT_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

fn render_sources(sources: &[Source]) -> String {
    sources
        .iter()
        .map(|s| match s.page {
            Some(page) => format!("{} (p. {page})", s.document),
            None => s.document.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl Skill for SearchDocsSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, call: &ToolCall, _caller: &Caller) -> LodestarResult<String> {
        // A reply whose input was not JSON arrives as {"raw": <text>}.
        let query = call.str_arg("query", call.str_arg("raw", "")).trim();
        if query.is_empty() {
            return Err(LodestarError::Skill(
                "search_docs needs a non-empty \"query\"".to_string(),
            ));
        }

        let outcome = self.retriever.retrieve_with_reflection(query, &[], None).await?;
        debug!(
            query = %query,
            hops = outcome.hops_taken,
            found = outcome.total_found,
            "Document search finished"
        );

        if outcome.chunks.is_empty() {
            return Ok("No documents found.".to_string());
        }
        let mut context = format_for_context(&outcome.chunks, self.max_chars);
        if !outcome.sources.is_empty() {
            context.push_str("\nSources: ");
            context.push_str(&render_sources(&outcome.sources));
        }
        Ok(context)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_render_sources_with_and_without_pages() {
        let sources = vec![
            Source {
                document: "handbook.pdf".into(),
                page: Some(4),
                relevance_score: 0.9,
            },
            Source {
                document: "faq.md".into(),
                page: None,
                relevance_score: 0.5,
            },
        ];
        assert_eq!(render_sources(&sources), "handbook.pdf (p. 4), faq.md");
    }
}
