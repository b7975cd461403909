//! Hybrid retrieval for Lodestar.
//!
//! Fuses vector-similarity, BM25 keyword and relationship-graph signals with
//! Reciprocal Rank Fusion, hydrates the winners from a chunk store, and
//! optionally reorders them with a precision reranker. A multi-hop wrapper
//! asks a reflection oracle whether the evidence suffices and issues
//! follow-up queries when it does not.
//!
//! # Main types
//!
//! - [`HybridRetriever`] — The fused search pipeline.
//! - [`MultiHopRetriever`] — Reflection-driven multi-hop retrieval.
//! - [`Bm25Index`] — BM25 inverted index with a code-aware tokenizer.
//! - [`InMemoryChunkStore`] / [`FileChunkStore`] — Vector index plus hydration.
//! - [`InMemoryGraph`] — Undirected relationship graph.
//! - [`Reranker`] — Optional pairwise relevance capability.

/// BM25 inverted index and tokenizer.
pub mod bm25;
/// Chunks, metadata and filters.
pub mod chunk;
/// Retrieval and reflection settings.
pub mod config;
/// Embedding provider trait and local implementation.
pub mod embedding;
/// The hybrid search pipeline.
pub mod engine;
/// Rendering chunks for oracle prompts.
pub mod format;
/// Reciprocal Rank Fusion.
pub mod fusion;
/// Relationship graph used for neighbor expansion.
pub mod graph;
/// Multi-hop retrieval with reflection.
pub mod reflection;
/// Precision reranking.
pub mod rerank;
/// Vector index and chunk store.
pub mod store;

pub use bm25::Bm25Index;
pub use chunk::{Chunk, ChunkMetadata, SearchFilter};
pub use config::{ReflectionConfig, RetrievalConfig};
pub use embedding::{EmbeddingProvider, LocalEmbedding};
pub use engine::{HybridRetriever, SearchOptions};
pub use format::{format_for_context, DEFAULT_CONTEXT_CHARS};
pub use fusion::{fuse, FusedResult, FusionWeights, RankedList, SignalSource, DEFAULT_RRF_K};
pub use graph::{InMemoryGraph, RelationGraph};
pub use reflection::{MultiHopRetriever, ReflectionOptions, ReflectionOutcome, ReflectionVerdict, Source};
pub use rerank::{rerank_chunks, Reranker, TermOverlapReranker};
pub use store::{ChunkStore, CorpusRecord, FileChunkStore, InMemoryChunkStore, VectorIndex};
