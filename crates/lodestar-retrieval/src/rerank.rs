use crate::bm25::tokenize;
use crate::chunk::Chunk;
use async_trait::async_trait;
use lodestar_core::LodestarResult;
use std::collections::HashSet;
use tracing::warn;

/// Pairwise (query, candidate) relevance scorer.
///
/// Optional: the engine holds an `Option<Arc<dyn Reranker>>` and simply keeps
/// fused order when none is configured.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score each text against the query; higher is more relevant.
    /// Must return exactly one score per input text.
    async fn score(&self, query: &str, texts: &[&str]) -> LodestarResult<Vec<f32>>;

    fn name(&self) -> &str {
        "reranker"
    }
}

/// Reorder `chunks` by reranker score and keep the best `top_k`.
///
/// Each text is cut to `max_chars` characters before scoring and the score is
/// recorded on the chunk. On reranker failure, or a score count that does not
/// match the input, the input order is kept and simply truncated.
pub async fn rerank_chunks(
    reranker: &dyn Reranker,
    query: &str,
    chunks: Vec<Chunk>,
    top_k: usize,
    max_chars: usize,
) -> Vec<Chunk> {
    if chunks.is_empty() {
        return chunks;
    }

    let cut: Vec<String> = chunks
        .iter()
        .map(|c| c.text.chars().take(max_chars).collect())
        .collect();
    let texts: Vec<&str> = cut.iter().map(String::as_str).collect();

    let scores = match reranker.score(query, &texts).await {
        Ok(scores) if scores.len() == chunks.len() => scores,
        Ok(scores) => {
            warn!(
                reranker = reranker.name(),
                expected = chunks.len(),
                got = scores.len(),
                "Reranker returned wrong number of scores, keeping fused order"
            );
            return truncate(chunks, top_k);
        }
        Err(e) => {
            warn!(reranker = reranker.name(), error = %e, "Reranking failed, keeping fused order");
            return truncate(chunks, top_k);
        }
    };

    let mut scored: Vec<(usize, Chunk, f32)> = chunks
        .into_iter()
        .zip(scores)
        .enumerate()
        .map(|(idx, (chunk, score))| (idx, chunk, score))
        .collect();
    // Stable on the incoming position so equal scores keep fused order.
    scored.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    scored
        .into_iter()
        .take(top_k)
        .map(|(_, mut chunk, score)| {
            chunk.rerank_score = Some(score);
            chunk
        })
        .collect()
}

fn truncate(mut chunks: Vec<Chunk>, top_k: usize) -> Vec<Chunk> {
    chunks.truncate(top_k);
    chunks
}

/// Local reranker scoring query-term coverage plus adjacent-pair matches.
///
/// Stands in for a cross-encoder when no model server is available: a chunk
/// that contains every query term scores 1.0, and each query bigram found
/// verbatim in the chunk adds a small bonus.
#[derive(Debug, Clone, Default)]
pub struct TermOverlapReranker;

#[async_trait]
impl Reranker for TermOverlapReranker {
    async fn score(&self, query: &str, texts: &[&str]) -> LodestarResult<Vec<f32>> {
        let query_terms = tokenize(query);
        let unique: HashSet<&str> = query_terms.iter().map(String::as_str).collect();
        let bigrams: Vec<(&str, &str)> = query_terms
            .windows(2)
            .map(|w| (w[0].as_str(), w[1].as_str()))
            .collect();

        Ok(texts
            .iter()
            .map(|text| {
                if unique.is_empty() {
                    return 0.0;
                }
                let doc_terms = tokenize(text);
                let present: HashSet<&str> = doc_terms.iter().map(String::as_str).collect();
                let coverage =
                    unique.iter().filter(|t| present.contains(*t)).count() as f32 / unique.len() as f32;
                let adjacent = bigrams
                    .iter()
                    .filter(|(a, b)| {
                        doc_terms
                            .windows(2)
                            .any(|w| w[0] == *a && w[1] == *b)
                    })
                    .count() as f32;
                coverage + 0.1 * adjacent
            })
            .collect())
    }

    fn name(&self) -> &str {
        "term-overlap"
    }
}
