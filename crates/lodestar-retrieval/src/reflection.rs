//! Multi-hop retrieval driven by a reflection oracle.
//!
//! Each hop runs a hybrid search, merges new chunks into an accumulator and,
//! unless it is the last hop, asks the oracle whether the evidence answers
//! the question. The oracle replies `SUFFICIENT` or `NEED_MORE: <query>`;
//! anything else, an error or a timeout counts as sufficient.

use crate::chunk::{Chunk, SearchFilter};
use crate::config::ReflectionConfig;
use crate::engine::{HybridRetriever, SearchOptions};
use crate::rerank::{rerank_chunks, Reranker};
use lodestar_core::history::render_recent;
use lodestar_core::{LodestarResult, Oracle, Turn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const HISTORY_CHARS: usize = 200;

/// The reflection oracle's judgement of the accumulated evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflectionVerdict {
    Sufficient,
    NeedMore(String),
}

impl ReflectionVerdict {
    /// Parse an oracle reply. Prefixes are matched case-insensitively and
    /// every unrecognised reply, including an empty follow-up, is sufficient.
    pub fn parse(reply: &str) -> Self {
        let reply = reply.trim();
        let has_prefix =
            |prefix: &str| reply.get(..prefix.len()).is_some_and(|p| p.eq_ignore_ascii_case(prefix));

        if has_prefix("SUFFICIENT") {
            return Self::Sufficient;
        }
        if has_prefix("NEED_MORE:") {
            let follow_up = reply["NEED_MORE:".len()..].trim();
            if !follow_up.is_empty() {
                return Self::NeedMore(follow_up.to_string());
            }
        }
        Self::Sufficient
    }
}

/// A document that contributed evidence, deduplicated by document and page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub relevance_score: f64,
}

impl Source {
    fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            document: chunk.metadata.location.clone(),
            page: chunk.metadata.page,
            relevance_score: chunk.relevance(),
        }
    }

    fn key(&self) -> (String, u32) {
        (self.document.clone(), self.page.unwrap_or(0))
    }
}

/// Result of [`MultiHopRetriever::retrieve_with_reflection`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionOutcome {
    pub chunks: Vec<Chunk>,
    pub sources: Vec<Source>,
    /// Number of queries issued, the original included.
    pub hops_taken: usize,
    pub queries_made: Vec<String>,
    pub total_found: usize,
}

/// Per-call multi-hop parameters.
#[derive(Debug, Clone)]
pub struct ReflectionOptions {
    /// Searches allowed in total, the original query included.
    pub max_hops: usize,
    /// Chunks and sources returned.
    pub top_k: usize,
    pub filter: Option<SearchFilter>,
}

impl ReflectionOptions {
    /// Options matching the configured defaults.
    pub fn from_config(config: &ReflectionConfig) -> Self {
        Self {
            max_hops: config.max_hops,
            top_k: config.top_k,
            filter: None,
        }
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, filter: SearchFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Wraps a [`HybridRetriever`] with oracle-driven follow-up queries.
pub struct MultiHopRetriever {
    engine: Arc<HybridRetriever>,
    oracle: Option<Arc<dyn Oracle>>,
    reranker: Option<Arc<dyn Reranker>>,
    config: ReflectionConfig,
}

impl MultiHopRetriever {
    /// Uses the engine's reflection settings and reranker.
    pub fn new(engine: Arc<HybridRetriever>) -> Self {
        let config = engine.config().reflection.clone();
        let reranker = engine.reranker().cloned();
        Self {
            engine,
            oracle: None,
            reranker,
            config,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_config(mut self, config: ReflectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ReflectionConfig {
        &self.config
    }

    /// [`retrieve`](Self::retrieve) with the configured hop and result limits.
    pub async fn retrieve_with_reflection(
        &self,
        query: &str,
        history: &[Turn],
        filter: Option<SearchFilter>,
    ) -> LodestarResult<ReflectionOutcome> {
        let mut options = ReflectionOptions::from_config(&self.config);
        options.filter = filter;
        self.retrieve(query, history, &options).await
    }

    /// Retrieve evidence for `query`, issuing follow-up queries while the
    /// oracle asks for more, up to `options.max_hops` searches in total.
    ///
    /// Fails only when the first search fails; later failures end the loop
    /// with whatever was gathered.
    pub async fn retrieve(
        &self,
        query: &str,
        history: &[Turn],
        options: &ReflectionOptions,
    ) -> LodestarResult<ReflectionOutcome> {
        let max_hops = options.max_hops.max(1);
        let top_k = options.top_k.max(1);
        let mut search = SearchOptions::from_config(self.engine.config())
            .with_top_k(top_k)
            .without_rerank();
        search.filter = options.filter.clone();

        let mut accumulated: Vec<Chunk> = Vec::new();
        let mut seen_text: HashSet<String> = HashSet::new();
        let mut sources: Vec<Source> = Vec::new();
        let mut queries_made = vec![query.to_string()];
        let mut current = query.to_string();

        for hop in 0..max_hops {
            let found = match self.engine.search(&current, &search).await {
                Ok(found) => found,
                Err(e) if hop == 0 => return Err(e),
                Err(e) => {
                    warn!(hop = hop + 1, error = %e, "Follow-up search failed, stopping");
                    break;
                }
            };
            debug!(hop = hop + 1, query = %current, found = found.len(), "Reflection hop searched");

            for chunk in found {
                sources.push(Source::from_chunk(&chunk));
                if seen_text.insert(chunk.text.clone()) {
                    accumulated.push(chunk);
                }
            }

            if hop + 1 == max_hops {
                break;
            }

            match self.reflect(query, &accumulated, history).await {
                ReflectionVerdict::Sufficient => break,
                ReflectionVerdict::NeedMore(next) => {
                    let normalized = next.trim().to_lowercase();
                    if queries_made
                        .iter()
                        .any(|q| q.trim().to_lowercase() == normalized)
                    {
                        debug!(query = %next, "Follow-up query already issued, stopping");
                        break;
                    }
                    queries_made.push(next.clone());
                    current = next;
                }
            }
        }

        let chunks = match &self.reranker {
            Some(reranker) => {
                rerank_chunks(
                    reranker.as_ref(),
                    query,
                    accumulated,
                    top_k,
                    self.engine.config().reranker_text_chars,
                )
                .await
            }
            None => {
                accumulated.truncate(top_k);
                accumulated
            }
        };

        let sources = dedup_sources(sources, top_k);
        info!(
            hops = queries_made.len(),
            chunks = chunks.len(),
            sources = sources.len(),
            "Multi-hop retrieval completed"
        );

        Ok(ReflectionOutcome {
            total_found: chunks.len(),
            hops_taken: queries_made.len(),
            chunks,
            sources,
            queries_made,
        })
    }

    async fn reflect(&self, question: &str, evidence: &[Chunk], history: &[Turn]) -> ReflectionVerdict {
        let Some(oracle) = &self.oracle else {
            return ReflectionVerdict::Sufficient;
        };

        let prompt = self.reflection_prompt(question, evidence, history);
        let deadline = Duration::from_secs(self.config.oracle_timeout_secs);
        match tokio::time::timeout(deadline, oracle.generate(&prompt)).await {
            Ok(Ok(reply)) => ReflectionVerdict::parse(&reply),
            Ok(Err(e)) => {
                warn!(error = %e, "Reflection oracle failed, treating evidence as sufficient");
                ReflectionVerdict::Sufficient
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.oracle_timeout_secs,
                    "Reflection oracle timed out, treating evidence as sufficient"
                );
                ReflectionVerdict::Sufficient
            }
        }
    }

    fn reflection_prompt(&self, question: &str, evidence: &[Chunk], history: &[Turn]) -> String {
        let chunks_text = evidence
            .iter()
            .take(self.config.chunk_count)
            .enumerate()
            .map(|(i, c)| {
                let text: String = c.text.chars().take(self.config.chunk_chars).collect();
                format!("[Chunk {}]: {text}...", i + 1)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let history_block = if history.is_empty() {
            String::new()
        } else {
            format!(
                "\nRecent conversation:\n{}\n",
                render_recent(history, self.config.history_turns, HISTORY_CHARS)
            )
        };

        format!(
            "You are evaluating whether retrieved information is sufficient to answer a user's question.\n\n\
             User Question: {question}\n\
             {history_block}\n\
             Retrieved Information:\n\
             {chunks_text}\n\n\
             Task: Determine if this information is sufficient to fully and accurately answer the user's question.\n\n\
             If the information IS SUFFICIENT, respond with exactly:\n\
             SUFFICIENT\n\n\
             If the information is NOT SUFFICIENT, respond with:\n\
             NEED_MORE: <specific follow-up search query to find the missing information>\n\n\
             Be concise. Only say NEED_MORE if critical information is truly missing."
        )
    }
}

/// Keep the first source per document and page, best relevance first.
fn dedup_sources(sources: Vec<Source>, limit: usize) -> Vec<Source> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Source> = sources
        .into_iter()
        .filter(|s| seen.insert(s.key()))
        .collect();
    unique.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    unique.truncate(limit);
    unique
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_parsing() {
        assert_eq!(ReflectionVerdict::parse("SUFFICIENT"), ReflectionVerdict::Sufficient);
        assert_eq!(
            ReflectionVerdict::parse("  sufficient, thanks"),
            ReflectionVerdict::Sufficient
        );
        assert_eq!(
            ReflectionVerdict::parse("NEED_MORE: Q3 revenue results"),
            ReflectionVerdict::NeedMore("Q3 revenue results".into())
        );
        assert_eq!(
            ReflectionVerdict::parse("need_more:   hiring policy "),
            ReflectionVerdict::NeedMore("hiring policy".into())
        );
    }

    #[test]
    fn test_unrecognised_or_empty_verdict_is_sufficient() {
        assert_eq!(ReflectionVerdict::parse("I think so?"), ReflectionVerdict::Sufficient);
        assert_eq!(ReflectionVerdict::parse(""), ReflectionVerdict::Sufficient);
        assert_eq!(ReflectionVerdict::parse("NEED_MORE:   "), ReflectionVerdict::Sufficient);
        assert_eq!(ReflectionVerdict::parse("NEED MORE: x"), ReflectionVerdict::Sufficient);
        assert_eq!(ReflectionVerdict::parse("ñéé"), ReflectionVerdict::Sufficient);
    }

    #[test]
    fn test_sources_dedup_on_document_and_page() {
        let source = |doc: &str, page: Option<u32>, score: f64| Source {
            document: doc.into(),
            page,
            relevance_score: score,
        };
        let out = dedup_sources(
            vec![
                source("handbook.pdf", Some(1), 0.2),
                source("handbook.pdf", Some(1), 0.9),
                source("handbook.pdf", Some(2), 0.5),
                source("faq.md", None, 0.7),
            ],
            5,
        );
        let keys: Vec<(&str, Option<u32>)> =
            out.iter().map(|s| (s.document.as_str(), s.page)).collect();
        assert_eq!(
            keys,
            vec![
                ("faq.md", None),
                ("handbook.pdf", Some(2)),
                ("handbook.pdf", Some(1)),
            ]
        );
        assert_eq!(dedup_sources(out, 1).len(), 1);
    }
}
