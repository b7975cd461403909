mod config;

use clap::{Parser, Subcommand};
use config::LodestarConfig;
use futures_util::StreamExt;
use lodestar_agent::{AgentEvent, AgentRunner, LlmClient};
use lodestar_core::{Caller, Oracle};
use lodestar_retrieval::{
    FileChunkStore, HybridRetriever, InMemoryGraph, LocalEmbedding, MultiHopRetriever, SearchOptions,
    TermOverlapReranker,
};
use lodestar_skills::SkillRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lodestar", about = "Lodestar: retrieval-grounded reasoning agent")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "lodestar.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the agent a question
    Ask {
        query: String,
        /// Role the run acts on behalf of
        #[arg(long, default_value = "DEVELOPER")]
        role: String,
        /// Permission label granted to the role (repeatable)
        #[arg(long = "permission")]
        permissions: Vec<String>,
        /// Print progress events as they arrive
        #[arg(long)]
        stream: bool,
    },
    /// Run a hybrid search over the corpus
    Search {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
        /// Skip the precision reranker
        #[arg(long)]
        no_rerank: bool,
    },
    /// Manage skills
    Skill {
        #[command(subcommand)]
        action: SkillAction,
    },
}

#[derive(Subcommand)]
enum SkillAction {
    /// List registered skills
    List,
}

/// Everything a command needs, built once from the config.
struct Services {
    retriever: Arc<HybridRetriever>,
    skills: Arc<SkillRegistry>,
    oracle: Arc<dyn Oracle>,
}

async fn build_services(config: &LodestarConfig) -> anyhow::Result<Services> {
    let embedder = Arc::new(LocalEmbedding::new(config.embedding_dimension));
    let store = Arc::new(FileChunkStore::open(config.corpus.clone(), embedder).await?);
    info!(path = %config.corpus.display(), chunks = store.len().await, "Corpus loaded");

    let mut retriever = HybridRetriever::new(store.clone(), config.retrieval.clone())
        .with_vector_index(store)
        .with_reranker(Arc::new(TermOverlapReranker));

    if let Some(path) = &config.graph {
        match InMemoryGraph::load(path).await {
            Ok(graph) => {
                info!(path = %path.display(), nodes = graph.node_count(), "Graph loaded");
                retriever = retriever.with_graph(Arc::new(graph));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Graph unavailable, continuing without expansion"),
        }
    }

    let indexed = retriever.rebuild_keyword_index_from_store().await?;
    info!(documents = indexed, "Keyword index built");
    let retriever = Arc::new(retriever);

    let reflection_oracle: Arc<dyn Oracle> = Arc::new(LlmClient::new(config.reflection_model()));
    let multi_hop = Arc::new(MultiHopRetriever::new(retriever.clone()).with_oracle(reflection_oracle));

    let mut registry = SkillRegistry::new();
    lodestar_builtins::register_builtins(&mut registry, Some(retriever.clone()), Some(multi_hop))?;
    info!(count = registry.skill_count(), "Skills registered");

    Ok(Services {
        retriever,
        skills: Arc::new(registry),
        oracle: Arc::new(LlmClient::new(config.model.clone())),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_str = tokio::fs::read_to_string(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {e}", cli.config.display()))?;
    let mut config = LodestarConfig::from_toml(&config_str)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config_dir = cli
        .config
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .to_path_buf();
    config.resolve_paths(&config_dir);

    let services = build_services(&config).await?;

    match cli.command {
        Commands::Ask {
            query,
            role,
            permissions,
            stream,
        } => {
            let caller = permissions
                .into_iter()
                .fold(Caller::new(role), Caller::with_permission);
            let runner = AgentRunner::new(services.oracle, services.skills, config.agent.clone());

            if stream {
                let mut events = runner.run_stream(&query, &caller, &[]);
                while let Some(event) = events.next().await {
                    match event {
                        AgentEvent::StepStart { text, .. } | AgentEvent::StepDone { text, .. } => {
                            println!("  {text}");
                        }
                        AgentEvent::ActionResult { record } => {
                            println!("  [{}] {}: {}", record.system, record.status, record.result);
                        }
                        AgentEvent::Answer { content, finish } => {
                            println!("\n{content}");
                            info!(finish = ?finish, "Run finished");
                        }
                    }
                }
            } else {
                let result = runner.run(&query, &caller, &[]).await;
                println!("{}", result.answer);
                if !result.actions.is_empty() {
                    println!("\nActions:");
                    for action in &result.actions {
                        println!("  [{}] {}", action.system, action.result);
                    }
                }
                println!("\n({} step(s), {:?})", result.trace.len(), result.finish);
            }
        }
        Commands::Search {
            query,
            top_k,
            no_rerank,
        } => {
            let mut options = SearchOptions::from_config(services.retriever.config());
            if let Some(k) = top_k {
                options = options.with_top_k(k);
            }
            if no_rerank {
                options = options.without_rerank();
            }

            let chunks = services.retriever.search(&query, &options).await?;
            if chunks.is_empty() {
                println!("No results.");
            }
            for (i, chunk) in chunks.iter().enumerate() {
                let preview: String = chunk.text.chars().take(120).collect();
                println!(
                    "{:>2}. {} [{:.4}] {}",
                    i + 1,
                    chunk.metadata.location,
                    chunk.relevance(),
                    preview.replace('\n', " ")
                );
            }
        }
        Commands::Skill { action } => match action {
            SkillAction::List => {
                let skills = services.skills.list_descriptors();
                if skills.is_empty() {
                    println!("No skills registered.");
                } else {
                    println!("Registered skills:");
                    for skill in &skills {
                        match &skill.side_effect_system {
                            Some(system) => println!("  {}: {} [{system}]", skill.name, skill.description),
                            None => println!("  {}: {}", skill.name, skill.description),
                        }
                    }
                    println!("\nTotal: {} skill(s)", skills.len());
                }
            }
        },
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_services_wire_corpus_and_skills() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.jsonl");
        std::fs::write(
            &corpus,
            concat!(
                r#"{"id":"retry.rs:1","text":"fn retry_with_backoff() { exponential backoff }","metadata":{"location":"src/retry.rs","language":"rust"}}"#,
                "\n",
                r#"{"id":"auth.rs:1","text":"fn validate_token() { check jwt signature }","metadata":{"location":"src/auth.rs","language":"rust"}}"#,
                "\n"
            ),
        )
        .unwrap();

        let mut config = LodestarConfig::from_toml("corpus = \"corpus.jsonl\"\n[model]\nmodel_id = \"m\"\n").unwrap();
        config.resolve_paths(dir.path());
        let services = build_services(&config).await.unwrap();

        assert_eq!(services.retriever.keyword_document_count(), 2);
        assert_eq!(services.skills.skill_count(), 6);

        let options = SearchOptions::from_config(services.retriever.config()).with_top_k(1);
        let hits = services.retriever.search("exponential backoff retry", &options).await.unwrap();
        assert_eq!(hits[0].id, "retry.rs:1");
    }
}
