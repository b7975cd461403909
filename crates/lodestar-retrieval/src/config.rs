use crate::fusion::{FusionWeights, DEFAULT_RRF_K};
use serde::{Deserialize, Serialize};

/// Tuning knobs for hybrid retrieval and multi-hop reflection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results returned by a search when the caller does not say otherwise.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// RRF smoothing constant.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,
    #[serde(default)]
    pub weights: FusionWeights,
    /// Whether searches use the reranker when one is configured.
    #[serde(default = "default_true")]
    pub rerank: bool,
    /// Fused candidates used as graph-expansion seeds.
    #[serde(default = "default_graph_seed_count")]
    pub graph_seed_count: usize,
    /// Neighbors taken per seed.
    #[serde(default = "default_graph_neighbor_limit")]
    pub graph_neighbor_limit: usize,
    /// Fraction of the seed's score given to each neighbor.
    #[serde(default = "default_graph_discount")]
    pub graph_discount: f64,
    /// Deadline for each signal source lookup.
    #[serde(default = "default_signal_timeout_secs")]
    pub signal_timeout_secs: u64,
    /// Characters of each candidate shown to the reranker.
    #[serde(default = "default_reranker_text_chars")]
    pub reranker_text_chars: usize,
    #[serde(default)]
    pub reflection: ReflectionConfig,
}

/// Settings for the multi-hop reflection loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionConfig {
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
    /// Chunks returned after the final rerank.
    #[serde(default = "default_reflection_top_k")]
    pub top_k: usize,
    /// Accumulated chunks shown to the reflection oracle.
    #[serde(default = "default_reflection_chunk_count")]
    pub chunk_count: usize,
    /// Characters of each chunk shown to the reflection oracle.
    #[serde(default = "default_reflection_chunk_chars")]
    pub chunk_chars: usize,
    /// Recent conversation turns included in the reflection prompt.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    #[serde(default = "default_oracle_timeout_secs")]
    pub oracle_timeout_secs: u64,
}

fn default_top_k() -> usize {
    10
}
fn default_rrf_k() -> f64 {
    DEFAULT_RRF_K
}
fn default_true() -> bool {
    true
}
fn default_graph_seed_count() -> usize {
    3
}
fn default_graph_neighbor_limit() -> usize {
    5
}
fn default_graph_discount() -> f64 {
    0.5
}
fn default_signal_timeout_secs() -> u64 {
    10
}
fn default_reranker_text_chars() -> usize {
    1000
}
fn default_max_hops() -> usize {
    3
}
fn default_reflection_top_k() -> usize {
    5
}
fn default_reflection_chunk_count() -> usize {
    5
}
fn default_reflection_chunk_chars() -> usize {
    500
}
fn default_history_turns() -> usize {
    3
}
fn default_oracle_timeout_secs() -> u64 {
    60
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            rrf_k: default_rrf_k(),
            weights: FusionWeights::default(),
            rerank: default_true(),
            graph_seed_count: default_graph_seed_count(),
            graph_neighbor_limit: default_graph_neighbor_limit(),
            graph_discount: default_graph_discount(),
            signal_timeout_secs: default_signal_timeout_secs(),
            reranker_text_chars: default_reranker_text_chars(),
            reflection: ReflectionConfig::default(),
        }
    }
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            top_k: default_reflection_top_k(),
            chunk_count: default_reflection_chunk_count(),
            chunk_chars: default_reflection_chunk_chars(),
            history_turns: default_history_turns(),
            oracle_timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_uses_defaults() {
        let config: RetrievalConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.top_k, 10);
        assert_eq!(config.rrf_k, 60.0);
        assert_eq!(config.weights, FusionWeights::default());
        assert!(config.rerank);
        assert_eq!(config.graph_seed_count, 3);
        assert_eq!(config.reflection.max_hops, 3);
        assert_eq!(config.reflection.chunk_chars, 500);
    }

    #[test]
    fn test_partial_weights_fill_in_defaults() {
        let config: RetrievalConfig =
            serde_json::from_str(r#"{"weights":{"semantic":0.9},"reflection":{"max_hops":1}}"#)
                .unwrap();
        assert_eq!(config.weights.semantic, 0.9);
        assert_eq!(config.weights.lexical, 0.3);
        assert_eq!(config.reflection.max_hops, 1);
        assert_eq!(config.reflection.top_k, 5);
    }
}
