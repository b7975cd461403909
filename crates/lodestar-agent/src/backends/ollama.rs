use crate::config::ModelConfig;
use async_trait::async_trait;
use lodestar_core::{LodestarError, LodestarResult, Oracle};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Ollama `/api/generate` backend, non-streaming.
pub struct OllamaBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[async_trait]
impl Oracle for OllamaBackend {
    async fn generate(&self, prompt: &str) -> LodestarResult<String> {
        let url = format!("{}/api/generate", self.config.base_url());
        let body = GenerateRequest {
            model: &self.config.model_id,
            prompt,
            system: self.config.system_prompt.as_deref().filter(|s| !s.trim().is_empty()),
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                num_predict: self.config.max_tokens,
            },
        };

        let resp = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| LodestarError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(LodestarError::Http(format!(
                "Ollama API error {status}: {error_body}"
            )));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| LodestarError::Http(e.to_string()))?;
        let text = parsed
            .response
            .ok_or_else(|| LodestarError::Oracle("completion had no 'response' field".into()))?;
        debug!(model = %self.config.model_id, chars = text.len(), "Completion received");
        Ok(text)
    }
}
