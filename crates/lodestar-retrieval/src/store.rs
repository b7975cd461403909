use crate::chunk::{Chunk, ChunkMetadata, SearchFilter};
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use async_trait::async_trait;
use lodestar_core::{LodestarError, LodestarResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Vector-similarity lookup over the chunk corpus.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `k` `(chunk_id, distance)` pairs, nearest first.
    async fn query(
        &self,
        text: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> LodestarResult<Vec<(String, f32)>>;
}

/// Storage backing the indices, used to hydrate fused ids into full chunks.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Fetch chunks by id, in the order requested. Unknown ids are skipped.
    async fn fetch(&self, ids: &[String]) -> LodestarResult<Vec<Chunk>>;

    /// Every stored chunk, used to (re)build the keyword index.
    async fn snapshot(&self) -> LodestarResult<Vec<Chunk>>;
}

/// One line of a JSONL corpus snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

struct StoredChunk {
    record: CorpusRecord,
    embedding: Vec<f32>,
}

/// In-memory chunk store with brute-force cosine search.
/// Suitable for tests and corpora up to tens of thousands of chunks.
pub struct InMemoryChunkStore {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<StoredChunk>>,
}

impl InMemoryChunkStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Embed and store a chunk. An existing chunk with the same id is replaced.
    pub async fn insert(&self, record: CorpusRecord) -> LodestarResult<()> {
        let stored = self.embed(record).await?;
        self.put(stored).await;
        Ok(())
    }

    async fn embed(&self, record: CorpusRecord) -> LodestarResult<StoredChunk> {
        let embedding = self.embedder.embed(&record.text).await?;
        Ok(StoredChunk { record, embedding })
    }

    async fn put(&self, stored: StoredChunk) {
        let mut entries = self.entries.write().await;
        entries.retain(|e| e.record.id != stored.record.id);
        entries.push(stored);
    }

    pub async fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.record.id != id);
        entries.len() < before
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryChunkStore {
    async fn query(
        &self,
        text: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> LodestarResult<Vec<(String, f32)>> {
        let query_embedding = self.embedder.embed(text).await?;
        let entries = self.entries.read().await;

        let mut hits: Vec<(String, f32)> = entries
            .iter()
            .filter(|e| filter.map_or(true, |f| f.matches(&e.record.metadata)))
            .map(|e| {
                let distance = 1.0 - cosine_similarity(&query_embedding, &e.embedding);
                (e.record.id.clone(), distance)
            })
            .collect();

        hits.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn fetch(&self, ids: &[String]) -> LodestarResult<Vec<Chunk>> {
        let entries = self.entries.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| entries.iter().find(|e| &e.record.id == id))
            .map(|e| {
                Chunk::new(
                    e.record.id.clone(),
                    e.record.text.clone(),
                    e.record.metadata.clone(),
                )
            })
            .collect())
    }

    async fn snapshot(&self) -> LodestarResult<Vec<Chunk>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .map(|e| {
                Chunk::new(
                    e.record.id.clone(),
                    e.record.text.clone(),
                    e.record.metadata.clone(),
                )
            })
            .collect())
    }
}

/// Chunk store loaded from, and appended to, a JSONL snapshot on disk.
pub struct FileChunkStore {
    path: PathBuf,
    inner: InMemoryChunkStore,
}

impl FileChunkStore {
    /// Open the snapshot at `path`, embedding every record it contains.
    /// A missing file yields an empty store; its parent directory is created.
    /// Records that cannot be embedded are skipped with a warning.
    pub async fn open(path: PathBuf, embedder: Arc<dyn EmbeddingProvider>) -> LodestarResult<Self> {
        let inner = InMemoryChunkStore::new(embedder);

        if path.exists() {
            let data = tokio::fs::read_to_string(&path).await?;
            for (line_no, line) in data.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let record: CorpusRecord = serde_json::from_str(line).map_err(|e| {
                    LodestarError::Config(format!(
                        "Invalid corpus record at {}:{}: {e}",
                        path.display(),
                        line_no + 1
                    ))
                })?;
                let id = record.id.clone();
                if let Err(e) = inner.insert(record).await {
                    warn!(
                        path = %path.display(),
                        line = line_no + 1,
                        id = %id,
                        error = %e,
                        "Skipping corpus record that cannot be embedded"
                    );
                }
            }
        } else if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        Ok(Self { path, inner })
    }

    /// Append a record to the snapshot and the in-memory index.
    ///
    /// The record is embedded first; nothing is written when that fails.
    pub async fn insert(&self, record: CorpusRecord) -> LodestarResult<()> {
        use tokio::io::AsyncWriteExt;

        let stored = self.inner.embed(record).await?;
        let mut line = serde_json::to_string(&stored.record)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        self.inner.put(stored).await;
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.is_empty().await
    }
}

#[async_trait]
impl VectorIndex for FileChunkStore {
    async fn query(
        &self,
        text: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> LodestarResult<Vec<(String, f32)>> {
        self.inner.query(text, k, filter).await
    }
}

#[async_trait]
impl ChunkStore for FileChunkStore {
    async fn fetch(&self, ids: &[String]) -> LodestarResult<Vec<Chunk>> {
        self.inner.fetch(ids).await
    }

    async fn snapshot(&self) -> LodestarResult<Vec<Chunk>> {
        self.inner.snapshot().await
    }
}
