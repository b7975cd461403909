//! Reciprocal Rank Fusion: `score(d) = Σ_s w_s / (k + rank_s(d))`.
//!
//! Only ranks matter, so cosine similarities, normalized BM25 scores and
//! unscored graph adjacency combine without any score normalization. The sum
//! runs only over sources in which a candidate appears.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Default RRF smoothing constant.
pub const DEFAULT_RRF_K: f64 = 60.0;

/// Fused scores closer than this are considered tied.
const SCORE_RESOLUTION: f64 = 1e-12;

/// The independent ranking signals the engine fuses.
///
/// Declaration order is the fixed summation order, which keeps fused scores
/// bit-identical for candidates with identical per-source ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    Semantic,
    Lexical,
    Graph,
}

impl SignalSource {
    pub fn name(self) -> &'static str {
        match self {
            SignalSource::Semantic => "semantic",
            SignalSource::Lexical => "lexical",
            SignalSource::Graph => "graph",
        }
    }
}

impl std::fmt::Display for SignalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-source fusion weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    #[serde(default = "default_semantic_weight")]
    pub semantic: f64,
    #[serde(default = "default_lexical_weight")]
    pub lexical: f64,
    #[serde(default = "default_graph_weight")]
    pub graph: f64,
}

fn default_semantic_weight() -> f64 {
    0.5
}

fn default_lexical_weight() -> f64 {
    0.3
}

fn default_graph_weight() -> f64 {
    0.2
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            semantic: default_semantic_weight(),
            lexical: default_lexical_weight(),
            graph: default_graph_weight(),
        }
    }
}

impl FusionWeights {
    /// Same weight for every source.
    pub fn uniform(weight: f64) -> Self {
        Self {
            semantic: weight,
            lexical: weight,
            graph: weight,
        }
    }

    pub fn weight(&self, source: SignalSource) -> f64 {
        match source {
            SignalSource::Semantic => self.semantic,
            SignalSource::Lexical => self.lexical,
            SignalSource::Graph => self.graph,
        }
    }
}

/// One source's ordered hits, best first, with the source's own score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedList {
    pub source: SignalSource,
    pub hits: Vec<(String, f32)>,
}

impl RankedList {
    pub fn new(source: SignalSource, hits: Vec<(String, f32)>) -> Self {
        Self { source, hits }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// A candidate seen by at least one source during a retrieval call.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub source_scores: BTreeMap<SignalSource, f32>,
    /// 1-based rank within each source that returned the candidate.
    pub ranks: BTreeMap<SignalSource, usize>,
}

/// A candidate's fused score plus the tie-break keys used to order it.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedResult {
    pub id: String,
    pub fused_score: f64,
    pub source_count: usize,
    pub rank_sum: usize,
}

/// Weighted reciprocal-rank contribution of one source hit.
pub fn rrf_contribution(weight: f64, k: f64, rank: usize) -> f64 {
    weight / (k + rank as f64)
}

/// Join the ranked lists on candidate id.
///
/// Ranks are 1-based positions among the list's distinct ids; a repeated id
/// keeps its first (best) position. Output is ordered by id.
pub fn collect_candidates(lists: &[RankedList]) -> Vec<Candidate> {
    let mut by_id: BTreeMap<String, Candidate> = BTreeMap::new();

    for list in lists {
        let mut seen: HashSet<&str> = HashSet::new();
        for (id, score) in &list.hits {
            if !seen.insert(id.as_str()) {
                continue;
            }
            let rank = seen.len();
            let candidate = by_id.entry(id.clone()).or_insert_with(|| Candidate {
                id: id.clone(),
                source_scores: BTreeMap::new(),
                ranks: BTreeMap::new(),
            });
            // Two lists for one source: the better rank wins.
            let slot = candidate.ranks.entry(list.source).or_insert(rank);
            if rank <= *slot {
                *slot = rank;
                candidate.source_scores.insert(list.source, *score);
            }
        }
    }

    by_id.into_values().collect()
}

/// Fuse ranked lists into a single deterministic ranking.
///
/// Ordered by fused score descending; ties go to the candidate found by more
/// sources, then the lower rank sum, then the lexically smaller id.
pub fn fuse(lists: &[RankedList], weights: &FusionWeights, k: f64) -> Vec<FusedResult> {
    let mut fused: Vec<FusedResult> = collect_candidates(lists)
        .into_iter()
        .map(|candidate| {
            let fused_score: f64 = candidate
                .ranks
                .iter()
                .map(|(source, rank)| rrf_contribution(weights.weight(*source), k, *rank))
                .sum();
            FusedResult {
                fused_score,
                source_count: candidate.ranks.len(),
                rank_sum: candidate.ranks.values().sum(),
                id: candidate.id,
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        quantize(b.fused_score)
            .cmp(&quantize(a.fused_score))
            .then_with(|| b.source_count.cmp(&a.source_count))
            .then_with(|| a.rank_sum.cmp(&b.rank_sum))
            .then_with(|| a.id.cmp(&b.id))
    });
    fused
}

fn quantize(score: f64) -> i64 {
    (score / SCORE_RESOLUTION).round() as i64
}
