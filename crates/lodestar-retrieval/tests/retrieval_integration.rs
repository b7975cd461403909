#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the lodestar-retrieval crate.
//!
//! Covers file-backed corpora, the full hybrid pipeline with graph
//! expansion, and multi-hop reflection: hop bounds, follow-up dedup,
//! fail-open verdicts, text dedup and final reranking.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use lodestar_core::{LodestarError, LodestarResult, Oracle, ScriptedOracle, Turn};
use lodestar_retrieval::{
    ChunkMetadata, CorpusRecord, FileChunkStore, HybridRetriever, InMemoryChunkStore,
    InMemoryGraph, LocalEmbedding, MultiHopRetriever, ReflectionOptions, RetrievalConfig,
    SearchOptions, TermOverlapReranker,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record(id: &str, text: &str) -> CorpusRecord {
    CorpusRecord {
        id: id.to_string(),
        text: text.to_string(),
        metadata: ChunkMetadata {
            location: id.to_string(),
            language: Some("rust".to_string()),
            ..ChunkMetadata::default()
        },
    }
}

async fn memory_store(records: &[(&str, &str)]) -> Arc<InMemoryChunkStore> {
    let store = Arc::new(InMemoryChunkStore::new(Arc::new(LocalEmbedding::default())));
    for (id, text) in records {
        store.insert(record(id, text)).await.unwrap();
    }
    store
}

async fn engine(records: &[(&str, &str)]) -> Arc<HybridRetriever> {
    let store = memory_store(records).await;
    let retriever =
        HybridRetriever::new(store.clone(), RetrievalConfig::default()).with_vector_index(store);
    retriever.rebuild_keyword_index_from_store().await.unwrap();
    Arc::new(retriever)
}

const CORPUS: &[(&str, &str)] = &[
    ("src/payments.rs", "payment gateway client with retry and backoff"),
    ("src/ledger.rs", "ledger entries for settled payment transactions"),
    ("src/auth.rs", "token validation and session refresh"),
    ("docs/deploy.md", "deployment runbook for the payment service"),
];

struct FailingOracle;

#[async_trait]
impl Oracle for FailingOracle {
    async fn generate(&self, _prompt: &str) -> LodestarResult<String> {
        Err(LodestarError::Oracle("model server unreachable".into()))
    }
}

async fn write_lines(path: &Path, lines: &[String]) {
    tokio::fs::write(path, lines.join("\n")).await.unwrap();
}

// ---------------------------------------------------------------------------
// 1. File-backed corpus and graph
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_file_store_search_after_reopen() {
    let tmp = TempDir::new().unwrap();
    let corpus = tmp.path().join("data").join("corpus.jsonl");
    let embedder = Arc::new(LocalEmbedding::default());

    {
        let store = FileChunkStore::open(corpus.clone(), embedder.clone())
            .await
            .unwrap();
        for (id, text) in CORPUS {
            store.insert(record(id, text)).await.unwrap();
        }
    }

    let store = Arc::new(FileChunkStore::open(corpus, embedder).await.unwrap());
    assert_eq!(store.len().await, CORPUS.len());

    let retriever =
        HybridRetriever::new(store.clone(), RetrievalConfig::default()).with_vector_index(store);
    assert_eq!(retriever.rebuild_keyword_index_from_store().await.unwrap(), 4);

    let results = retriever
        .search("token validation", &SearchOptions::from_config(retriever.config()).with_top_k(2))
        .await
        .unwrap();
    assert_eq!(results[0].id, "src/auth.rs");
    assert!(results.len() <= 2);
}

#[tokio::test]
async fn test_loaded_graph_expands_keyword_hits() {
    let tmp = TempDir::new().unwrap();
    let graph_path = tmp.path().join("graph.jsonl");
    write_lines(
        &graph_path,
        &[r#"{"from":"src/auth.rs","to":"docs/deploy.md"}"#.to_string()],
    )
    .await;

    let store = memory_store(CORPUS).await;
    let graph = InMemoryGraph::load(&graph_path).await.unwrap();
    let retriever =
        HybridRetriever::new(store, RetrievalConfig::default()).with_graph(Arc::new(graph));
    retriever.rebuild_keyword_index_from_store().await.unwrap();

    let results = retriever
        .search("session refresh", &SearchOptions::from_config(retriever.config()))
        .await
        .unwrap();
    let ids: Vec<&str> = results.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["src/auth.rs", "docs/deploy.md"]);
    assert!(results[0].fused_score.unwrap() > results[1].fused_score.unwrap());
}

// ---------------------------------------------------------------------------
// 2. Multi-hop reflection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_reflection_stops_on_repeated_follow_up() {
    let oracle = Arc::new(ScriptedOracle::new([
        "NEED_MORE: ledger entries",
        "NEED_MORE: ledger entries",
    ]));
    let multi = MultiHopRetriever::new(engine(CORPUS).await).with_oracle(oracle.clone());

    let outcome = multi
        .retrieve_with_reflection("payment gateway", &[], None)
        .await
        .unwrap();

    assert_eq!(outcome.queries_made, vec!["payment gateway", "ledger entries"]);
    assert_eq!(outcome.hops_taken, 2);
    assert_eq!(oracle.calls(), 2);
}

#[tokio::test]
async fn test_reflection_halts_at_max_hops_without_final_reflection() {
    let oracle = Arc::new(ScriptedOracle::new([
        "NEED_MORE: token validation",
        "NEED_MORE: deployment runbook",
        "NEED_MORE: never asked",
    ]));
    let multi = MultiHopRetriever::new(engine(CORPUS).await).with_oracle(oracle.clone());
    assert_eq!(multi.config().max_hops, 3);

    let outcome = multi
        .retrieve_with_reflection("payment gateway", &[Turn::user("hi")], None)
        .await
        .unwrap();

    assert_eq!(outcome.hops_taken, 3);
    assert_eq!(
        outcome.queries_made,
        vec!["payment gateway", "token validation", "deployment runbook"]
    );
    // The last hop never consults the oracle.
    assert_eq!(oracle.calls(), 2);
}

#[tokio::test]
async fn test_per_call_options_override_hops_and_top_k() {
    let oracle = Arc::new(ScriptedOracle::new([
        "NEED_MORE: token validation",
        "NEED_MORE: deployment runbook",
        "NEED_MORE: ledger entries",
    ]));
    let multi = MultiHopRetriever::new(engine(CORPUS).await).with_oracle(oracle.clone());

    let options = ReflectionOptions::from_config(multi.config())
        .with_max_hops(2)
        .with_top_k(1);
    let outcome = multi
        .retrieve("payment gateway", &[], &options)
        .await
        .unwrap();

    assert_eq!(outcome.queries_made, vec!["payment gateway", "token validation"]);
    assert_eq!(oracle.calls(), 1);
    assert_eq!(outcome.chunks.len(), 1);
    assert_eq!(outcome.sources.len(), 1);
    // The retriever's own defaults are untouched.
    assert_eq!(multi.config().max_hops, 3);
}

#[tokio::test]
async fn test_reflection_dedup_ignores_case_and_whitespace() {
    let oracle = Arc::new(ScriptedOracle::new(["NEED_MORE:   PAYMENT Gateway  "]));
    let multi = MultiHopRetriever::new(engine(CORPUS).await).with_oracle(oracle);

    let outcome = multi
        .retrieve_with_reflection("payment gateway", &[], None)
        .await
        .unwrap();
    assert_eq!(outcome.hops_taken, 1);
}

#[tokio::test]
async fn test_failing_oracle_is_treated_as_sufficient() {
    let multi =
        MultiHopRetriever::new(engine(CORPUS).await).with_oracle(Arc::new(FailingOracle));
    let outcome = multi
        .retrieve_with_reflection("ledger entries", &[], None)
        .await
        .unwrap();
    assert_eq!(outcome.hops_taken, 1);
    assert!(!outcome.chunks.is_empty());
}

#[tokio::test]
async fn test_missing_oracle_runs_a_single_hop() {
    let multi = MultiHopRetriever::new(engine(CORPUS).await);
    let outcome = multi
        .retrieve_with_reflection("payment", &[], None)
        .await
        .unwrap();
    assert_eq!(outcome.queries_made, vec!["payment"]);
    assert_eq!(outcome.total_found, outcome.chunks.len());
    assert!(outcome.chunks.len() <= multi.config().top_k);
}

#[tokio::test]
async fn test_identical_text_is_accumulated_once() {
    let corpus = [
        ("copy-a", "shared retry helper for payment calls"),
        ("copy-b", "shared retry helper for payment calls"),
        ("other", "unrelated calendar scheduling"),
    ];
    let multi = MultiHopRetriever::new(engine(&corpus).await);
    let outcome = multi
        .retrieve_with_reflection("retry helper", &[], None)
        .await
        .unwrap();

    let copies = outcome
        .chunks
        .iter()
        .filter(|c| c.text == "shared retry helper for payment calls")
        .count();
    assert_eq!(copies, 1);
    // Sources still record both documents.
    assert!(outcome.sources.iter().any(|s| s.document == "copy-a"));
    assert!(outcome.sources.iter().any(|s| s.document == "copy-b"));
}

#[tokio::test]
async fn test_final_rerank_uses_original_query() {
    let oracle = Arc::new(ScriptedOracle::new(["NEED_MORE: deployment runbook", "SUFFICIENT"]));
    let multi = MultiHopRetriever::new(engine(CORPUS).await)
        .with_oracle(oracle)
        .with_reranker(Arc::new(TermOverlapReranker));

    let outcome = multi
        .retrieve_with_reflection("token validation session", &[], None)
        .await
        .unwrap();

    assert_eq!(outcome.hops_taken, 2);
    assert_eq!(outcome.chunks[0].id, "src/auth.rs");
    assert!(outcome.chunks.iter().all(|c| c.rerank_score.is_some()));
    let sorted = outcome
        .sources
        .windows(2)
        .all(|w| w[0].relevance_score >= w[1].relevance_score);
    assert!(sorted);
}
