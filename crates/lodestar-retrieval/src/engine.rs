use crate::bm25::Bm25Index;
use crate::chunk::{Chunk, SearchFilter};
use crate::config::RetrievalConfig;
use crate::fusion::{fuse, FusedResult, FusionWeights, RankedList, SignalSource};
use crate::graph::RelationGraph;
use crate::rerank::{rerank_chunks, Reranker};
use crate::store::{ChunkStore, VectorIndex};
use lodestar_core::{LodestarError, LodestarResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-call search parameters.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub top_k: usize,
    pub weights: FusionWeights,
    pub rerank: bool,
    pub filter: Option<SearchFilter>,
}

impl SearchOptions {
    /// Options matching the configured defaults.
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            weights: config.weights,
            rerank: config.rerank,
            filter: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, filter: SearchFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn without_rerank(mut self) -> Self {
        self.rerank = false;
        self
    }
}

enum SignalOutcome {
    Ranked(RankedList),
    Unavailable(String),
    Failed(LodestarError),
}

/// Hybrid retriever that fuses vector, keyword and graph signals with
/// Reciprocal Rank Fusion, then hydrates and optionally reranks the result.
///
/// Every collaborator except the chunk store is optional. A missing or
/// failing signal source only removes that source from fusion; the search
/// fails only when no primary source (vector or keyword) produced a list.
pub struct HybridRetriever {
    store: Arc<dyn ChunkStore>,
    vector: Option<Arc<dyn VectorIndex>>,
    keyword: RwLock<Bm25Index>,
    graph: Option<Arc<dyn RelationGraph>>,
    reranker: Option<Arc<dyn Reranker>>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    /// Create a retriever over `store` with no signal sources attached yet.
    pub fn new(store: Arc<dyn ChunkStore>, config: RetrievalConfig) -> Self {
        Self {
            store,
            vector: None,
            keyword: RwLock::new(Bm25Index::new()),
            graph: None,
            reranker: None,
            config,
        }
    }

    pub fn with_vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector = Some(index);
        self
    }

    pub fn with_graph(mut self, graph: Arc<dyn RelationGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn reranker(&self) -> Option<&Arc<dyn Reranker>> {
        self.reranker.as_ref()
    }

    /// Replace the keyword index with one built from `chunks`.
    pub fn rebuild_keyword_index(&self, chunks: &[Chunk]) -> usize {
        let index = Bm25Index::build(chunks.iter().map(|c| (c.id.as_str(), c.text.as_str())));
        let count = index.document_count();
        *self.keyword.write() = index;
        info!(documents = count, "Keyword index rebuilt");
        count
    }

    /// Rebuild the keyword index from the chunk store's current contents.
    pub async fn rebuild_keyword_index_from_store(&self) -> LodestarResult<usize> {
        let chunks = self.store.snapshot().await?;
        Ok(self.rebuild_keyword_index(&chunks))
    }

    pub fn keyword_document_count(&self) -> usize {
        self.keyword.read().document_count()
    }

    /// Search with the configured default options.
    pub async fn search_default(&self, query: &str) -> LodestarResult<Vec<Chunk>> {
        self.search(query, &SearchOptions::from_config(&self.config))
            .await
    }

    /// Run the full hybrid pipeline and return at most `options.top_k` chunks.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> LodestarResult<Vec<Chunk>> {
        let top_k = options.top_k.max(1);
        let fetch_k = top_k * 3;
        let filter = options.filter.as_ref();

        // The keyword index carries no metadata, so a filtered search ranks
        // the whole index and leaves the cut to the post-hydration filter.
        let lexical_k = if filter.is_some() { usize::MAX } else { fetch_k };
        let (semantic, lexical) = tokio::join!(
            self.semantic_signal(query, fetch_k, filter),
            async { self.lexical_signal(query, lexical_k) }
        );

        let mut lists = Vec::with_capacity(3);
        let mut problems = Vec::new();
        for (source, outcome) in [
            (SignalSource::Semantic, semantic),
            (SignalSource::Lexical, lexical),
        ] {
            match outcome {
                SignalOutcome::Ranked(list) => {
                    debug!(source = %source, hits = list.hits.len(), "Signal source answered");
                    lists.push(list);
                }
                SignalOutcome::Unavailable(reason) => {
                    debug!(source = %source, reason = %reason, "Signal source unavailable");
                    problems.push(format!("{source}: {reason}"));
                }
                SignalOutcome::Failed(e) => {
                    warn!(source = %source, error = %e, "Signal source failed, continuing without it");
                    problems.push(format!("{source}: {e}"));
                }
            }
        }

        if lists.is_empty() {
            return Err(LodestarError::Retrieval(format!(
                "every signal source failed ({})",
                problems.join("; ")
            )));
        }

        let k = self.config.rrf_k;
        let mut fused = fuse(&lists, &options.weights, k);

        if let Some(graph_list) = self.graph_signal(&fused) {
            debug!(hits = graph_list.hits.len(), "Graph expansion added neighbors");
            lists.push(graph_list);
            fused = fuse(&lists, &options.weights, k);
        }

        let candidate_k = top_k * 2;
        if filter.is_none() {
            fused.truncate(candidate_k);
        }
        let scores: HashMap<&str, f64> = fused
            .iter()
            .map(|r| (r.id.as_str(), r.fused_score))
            .collect();
        let ids: Vec<String> = fused.iter().map(|r| r.id.clone()).collect();

        let mut chunks = self.store.fetch(&ids).await.map_err(|e| {
            warn!(error = %e, candidates = ids.len(), "Chunk hydration failed");
            e
        })?;
        for chunk in &mut chunks {
            chunk.fused_score = scores.get(chunk.id.as_str()).copied();
        }
        if let Some(filter) = filter {
            chunks.retain(|c| filter.matches(&c.metadata));
            chunks.truncate(candidate_k);
        }

        let results = match (&self.reranker, options.rerank) {
            (Some(reranker), true) => {
                rerank_chunks(
                    reranker.as_ref(),
                    query,
                    chunks,
                    top_k,
                    self.config.reranker_text_chars,
                )
                .await
            }
            _ => {
                chunks.truncate(top_k);
                chunks
            }
        };

        info!(
            query_len = query.len(),
            sources = lists.len(),
            results = results.len(),
            "Hybrid search completed"
        );
        Ok(results)
    }

    async fn semantic_signal(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> SignalOutcome {
        let Some(index) = &self.vector else {
            return SignalOutcome::Unavailable("no vector index configured".to_string());
        };

        let deadline = Duration::from_secs(self.config.signal_timeout_secs);
        match tokio::time::timeout(deadline, index.query(query, k, filter)).await {
            Ok(Ok(hits)) => SignalOutcome::Ranked(RankedList::new(
                SignalSource::Semantic,
                hits.into_iter()
                    .map(|(id, distance)| (id, 1.0 / (1.0 + distance.max(0.0))))
                    .collect(),
            )),
            Ok(Err(e)) => SignalOutcome::Failed(e),
            Err(_) => SignalOutcome::Failed(LodestarError::Timeout(self.config.signal_timeout_secs)),
        }
    }

    fn lexical_signal(&self, query: &str, k: usize) -> SignalOutcome {
        let index = self.keyword.read();
        if index.is_empty() {
            return SignalOutcome::Unavailable("keyword index not built".to_string());
        }
        SignalOutcome::Ranked(RankedList::new(SignalSource::Lexical, index.search(query, k)))
    }

    /// Neighbors of the top fused candidates, each scored at a discount of
    /// its seed's fused score. `None` when there is nothing to add.
    fn graph_signal(&self, fused: &[FusedResult]) -> Option<RankedList> {
        let graph = self.graph.as_ref()?;
        if self.config.graph_seed_count == 0 || fused.is_empty() {
            return None;
        }

        let mut order: Vec<String> = Vec::new();
        let mut best: HashMap<String, f32> = HashMap::new();
        for seed in fused.iter().take(self.config.graph_seed_count) {
            let Some(node) = graph.resolve(&seed.id) else {
                continue;
            };
            let score = (seed.fused_score * self.config.graph_discount) as f32;
            for neighbor in graph
                .neighbors(&node)
                .into_iter()
                .take(self.config.graph_neighbor_limit)
            {
                match best.get_mut(&neighbor) {
                    Some(existing) => *existing = existing.max(score),
                    None => {
                        best.insert(neighbor.clone(), score);
                        order.push(neighbor);
                    }
                }
            }
        }

        if order.is_empty() {
            return None;
        }

        let mut hits: Vec<(String, f32)> = order
            .into_iter()
            .map(|id| {
                let score = best.get(&id).copied().unwrap_or(0.0);
                (id, score)
            })
            .collect();
        // Stable: equal scores keep discovery order.
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Some(RankedList::new(SignalSource::Graph, hits))
    }
}
