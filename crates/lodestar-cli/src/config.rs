use lodestar_agent::{AgentConfig, ModelConfig};
use lodestar_retrieval::RetrievalConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Contents of `lodestar.toml`.
#[derive(Debug, Deserialize)]
pub struct LodestarConfig {
    pub model: ModelConfig,
    /// Model used for reflection verdicts; derived from `model` when absent.
    #[serde(default)]
    pub reflection_model: Option<ModelConfig>,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// JSONL chunk snapshot.
    #[serde(default = "default_corpus")]
    pub corpus: PathBuf,
    /// Optional JSONL edge list for graph expansion.
    #[serde(default)]
    pub graph: Option<PathBuf>,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    /// Emit JSON log lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

fn default_corpus() -> PathBuf {
    PathBuf::from("./data/corpus.jsonl")
}

fn default_embedding_dimension() -> usize {
    256
}

impl LodestarConfig {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Oracle settings for reflection verdicts.
    pub fn reflection_model(&self) -> ModelConfig {
        self.reflection_model
            .clone()
            .unwrap_or_else(|| self.model.for_reflection())
    }

    /// Make relative data paths relative to the config file's directory.
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.corpus.is_relative() {
            self.corpus = base.join(&self.corpus);
        }
        if let Some(graph) = self.graph.as_mut() {
            if graph.is_relative() {
                *graph = base.join(&*graph);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config = LodestarConfig::from_toml("[model]\nmodel_id = \"llama3.1\"\n").unwrap();
        assert_eq!(config.model.model_id, "llama3.1");
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.retrieval.reflection.max_hops, 3);
        assert_eq!(config.corpus, PathBuf::from("./data/corpus.jsonl"));
        assert!(config.graph.is_none());
        assert!(!config.log.json);

        let reflection = config.reflection_model();
        assert_eq!(reflection.model_id, "llama3.1");
        assert_eq!(reflection.max_tokens, 100);
        assert!(config.model.system_prompt.is_some());
        assert!(reflection.system_prompt.is_none());
    }

    #[test]
    fn test_explicit_reflection_model_wins() {
        let config = LodestarConfig::from_toml(
            r#"
            [model]
            model_id = "llama3.1"

            [reflection_model]
            model_id = "qwen2.5:3b"
            temperature = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(config.reflection_model().model_id, "qwen2.5:3b");
    }

    #[test]
    fn test_sample_config_parses() {
        let text = include_str!("../../../lodestar.toml");
        let config = LodestarConfig::from_toml(text).unwrap();
        assert_eq!(config.agent.observation_limit, 1000);
        assert!((config.retrieval.weights.semantic - 0.5).abs() < f64::EPSILON);
        assert!(config.graph.is_some());
    }

    #[test]
    fn test_resolve_paths_keeps_absolute() {
        let mut config = LodestarConfig::from_toml(
            "corpus = \"/srv/corpus.jsonl\"\ngraph = \"graph.jsonl\"\n[model]\nmodel_id = \"m\"\n",
        )
        .unwrap();
        config.resolve_paths(Path::new("/etc/lodestar"));
        assert_eq!(config.corpus, PathBuf::from("/srv/corpus.jsonl"));
        assert_eq!(config.graph, Some(PathBuf::from("/etc/lodestar/graph.jsonl")));
    }
}
