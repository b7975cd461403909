use crate::bm25::tokenize;
use async_trait::async_trait;
use lodestar_core::{LodestarError, LodestarResult};
use std::collections::HashMap;

/// Trait for computing text embeddings.
///
/// Production deployments plug in a model-backed provider; how embeddings are
/// computed is outside the retrieval engine's concern.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute the embedding vector for a single text.
    async fn embed(&self, text: &str) -> LodestarResult<Vec<f32>>;

    /// Compute embeddings for a batch of texts.
    async fn embed_batch(&self, texts: &[&str]) -> LodestarResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimension of the vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Feature-hashed bag-of-words embedding.
///
/// Deterministic and dependency-free; good enough for tests and small local
/// corpora where no embedding model is available.
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> LodestarResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(LodestarError::Retrieval(
                "Cannot embed empty text".to_string(),
            ));
        }

        let mut vector = vec![0.0f32; self.dimension];
        let words = tokenize(text);
        if words.is_empty() {
            return Ok(vector);
        }

        let mut freq: HashMap<&str, f32> = HashMap::new();
        for word in &words {
            *freq.entry(word.as_str()).or_insert(0.0) += 1.0;
        }

        let total = words.len() as f32;
        for (word, count) in &freq {
            let tf = count / total;
            // Two hash slots per word soften collisions.
            let primary = fnv1a(word.as_bytes()) as usize;
            let secondary = fnv1a(&[word.as_bytes(), b"#"].concat()) as usize;
            vector[primary % self.dimension] += tf;
            vector[secondary % self.dimension] += tf * 0.5;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for &byte in data {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

/// Cosine similarity between two vectors; zero when lengths differ or either is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
