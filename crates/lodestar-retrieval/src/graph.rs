use lodestar_core::{LodestarError, LodestarResult};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Relationship graph between corpus nodes (files, symbols, documents).
pub trait RelationGraph: Send + Sync {
    /// Direct neighbors of `node_id`, in a stable order.
    fn neighbors(&self, node_id: &str) -> Vec<String>;

    /// Resolve a chunk id to a graph node.
    ///
    /// Exact matches win; otherwise any node whose id contains the chunk id
    /// or is contained in it (chunk ids often embed a file path).
    fn resolve(&self, chunk_id: &str) -> Option<String>;
}

/// Edge record of a JSONL graph snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeRecord {
    pub from: String,
    pub to: String,
}

/// Undirected adjacency-list graph kept fully in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    adjacency: BTreeMap<String, BTreeSet<String>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an undirected edge; both endpoints become nodes.
    pub fn add_edge(&mut self, a: impl Into<String>, b: impl Into<String>) {
        let (a, b) = (a.into(), b.into());
        if a == b {
            self.adjacency.entry(a).or_default();
            return;
        }
        self.adjacency.entry(a.clone()).or_default().insert(b.clone());
        self.adjacency.entry(b).or_default().insert(a);
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Load a graph from a JSONL file of `{"from": ..., "to": ...}` records.
    pub async fn load(path: &Path) -> LodestarResult<Self> {
        let data = tokio::fs::read_to_string(path).await?;
        let mut graph = Self::new();
        for (line_no, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let edge: EdgeRecord = serde_json::from_str(line).map_err(|e| {
                LodestarError::Config(format!(
                    "Invalid graph edge at {}:{}: {e}",
                    path.display(),
                    line_no + 1
                ))
            })?;
            graph.add_edge(edge.from, edge.to);
        }
        Ok(graph)
    }
}

impl RelationGraph for InMemoryGraph {
    fn neighbors(&self, node_id: &str) -> Vec<String> {
        self.adjacency
            .get(node_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn resolve(&self, chunk_id: &str) -> Option<String> {
        if self.adjacency.contains_key(chunk_id) {
            return Some(chunk_id.to_string());
        }
        self.adjacency
            .keys()
            .find(|node| node.contains(chunk_id) || chunk_id.contains(node.as_str()))
            .cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_are_undirected_and_sorted() {
        let mut graph = InMemoryGraph::new();
        graph.add_edge("api.rs", "db.rs");
        graph.add_edge("api.rs", "auth.rs");
        assert_eq!(graph.neighbors("api.rs"), vec!["auth.rs", "db.rs"]);
        assert_eq!(graph.neighbors("db.rs"), vec!["api.rs"]);
        assert!(graph.neighbors("missing").is_empty());
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn test_resolve_exact_then_substring() {
        let mut graph = InMemoryGraph::new();
        graph.add_edge("src/payments.rs", "src/ledger.rs");
        assert_eq!(graph.resolve("src/ledger.rs").as_deref(), Some("src/ledger.rs"));
        assert_eq!(
            graph.resolve("src/payments.rs#charge").as_deref(),
            Some("src/payments.rs")
        );
        assert!(graph.resolve("README.md").is_none());
    }

    #[tokio::test]
    async fn test_load_from_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.jsonl");
        tokio::fs::write(
            &path,
            "{\"from\":\"a\",\"to\":\"b\"}\n\n{\"from\":\"b\",\"to\":\"c\"}\n",
        )
        .await
        .unwrap();

        let graph = InMemoryGraph::load(&path).await.unwrap();
        assert_eq!(graph.neighbors("b"), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.jsonl");
        tokio::fs::write(&path, "not json\n").await.unwrap();
        let err = InMemoryGraph::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("graph.jsonl:1"));
    }
}
