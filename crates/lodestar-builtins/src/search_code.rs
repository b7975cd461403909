use async_trait::async_trait;
use lodestar_core::{Caller, LodestarError, LodestarResult, ToolCall};
use lodestar_retrieval::{HybridRetriever, SearchOptions};
use lodestar_skills::{Skill, SkillDescriptor};
use std::sync::Arc;
use tracing::debug;

const RESULT_COUNT: usize = 3;
const PREVIEW_CHARS: usize = 200;

/// Hybrid search over the indexed codebase.
pub struct SearchCodeSkill {
    descriptor: SkillDescriptor,
    retriever: Arc<HybridRetriever>,
}

impl SearchCodeSkill {
    pub fn new(retriever: Arc<HybridRetriever>) -> Self {
        Self {
            descriptor: SkillDescriptor::new(
                "search_code",
                "Search the indexed codebase for relevant code snippets.",
                serde_json::json!({"query": "search terms"}),
            ),
            retriever,
        }
    }
}

#[async_trait]
impl Skill for SearchCodeSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, call: &ToolCall, _caller: &Caller) -> LodestarResult<String> {
        // A reply whose input was not JSON arrives as {"raw": <text>}.
        let query = call.str_arg("query", call.str_arg("raw", "")).trim();
        if query.is_empty() {
            return Err(LodestarError::Skill(
                "search_code needs a non-empty \"query\"".to_string(),
            ));
        }

        let options = SearchOptions::from_config(self.retriever.config()).with_top_k(RESULT_COUNT);
        let results = self.retriever.search(query, &options).await?;
        debug!(query = %query, results = results.len(), "Code search finished");

        if results.is_empty() {
            return Ok("No code results found.".to_string());
        }
        Ok(results
            .iter()
            .map(|chunk| {
                let location = if chunk.metadata.location.is_empty() {
                    "unknown"
                } else {
                    chunk.metadata.location.as_str()
                };
                let preview: String = chunk.text.chars().take(PREVIEW_CHARS).collect();
                format!("[{location}] {preview}...")
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
