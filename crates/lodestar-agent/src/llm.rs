use crate::backends::ollama::OllamaBackend;
use crate::config::{LlmProvider, ModelConfig};
use async_trait::async_trait;
use lodestar_core::{LodestarResult, Oracle};

/// Oracle client that dispatches to the configured provider backend.
///
/// To add a provider: implement [`Oracle`] in `backends/`, add the variant to
/// [`LlmProvider`] and wire it here.
pub struct LlmClient {
    backend: Box<dyn Oracle>,
}

impl LlmClient {
    pub fn new(config: ModelConfig) -> Self {
        let backend: Box<dyn Oracle> = match config.provider {
            LlmProvider::Ollama => Box::new(OllamaBackend::new(config)),
        };
        Self { backend }
    }

    /// Create from a pre-built backend (for custom/external providers).
    pub fn from_backend(backend: Box<dyn Oracle>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Oracle for LlmClient {
    async fn generate(&self, prompt: &str) -> LodestarResult<String> {
        self.backend.generate(prompt).await
    }
}
