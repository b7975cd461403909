use serde::{Deserialize, Serialize};

/// System prompt sent with reasoning requests unless the config overrides it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI agent that reasons step-by-step and uses tools to answer questions. \
On every turn reply with exactly one step in this format:\n\
Thought: your reasoning about what to do next\n\
Action: the name of one available tool, or final_answer\n\
Action Input: a JSON object with the tool's arguments\n\
When you have enough information, use Action: final_answer with Action Input: {\"answer\": \"...\"}. \
Never write the Observation yourself; it is provided after the tool runs.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Ollama-style `/api/generate` endpoint.
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,
    pub model_id: String,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// HTTP request deadline for one completion.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Instructions sent as the request's system message. Defaults to
    /// [`DEFAULT_SYSTEM_PROMPT`]; an empty string sends none.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: Option<String>,
}

fn default_provider() -> LlmProvider {
    LlmProvider::Ollama
}

fn default_temperature() -> f32 {
    0.3
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_tokens() -> u32 {
    2500
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_system_prompt() -> Option<String> {
    Some(DEFAULT_SYSTEM_PROMPT.to_string())
}

impl ModelConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            provider: default_provider(),
            model_id: model_id.into(),
            api_base_url: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }

    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider {
                LlmProvider::Ollama => "http://localhost:11434",
            }
        }
    }

    /// Same endpoint and model tuned for short, near-deterministic
    /// `SUFFICIENT` / `NEED_MORE:` verdicts, without the reasoning system prompt.
    pub fn for_reflection(&self) -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 100,
            timeout_secs: self.timeout_secs.min(60),
            system_prompt: None,
            ..self.clone()
        }
    }
}

/// Limits and timeouts for one reasoning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Characters of a tool observation kept in the reasoning context.
    #[serde(default = "default_observation_limit")]
    pub observation_limit: usize,
    #[serde(default = "default_oracle_timeout_secs")]
    pub oracle_timeout_secs: u64,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// Capacity of the event channel; a full channel suspends the loop.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Prior conversation turns included in the reasoning prompt.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

fn default_max_steps() -> u32 {
    5
}

fn default_observation_limit() -> usize {
    1000
}

fn default_oracle_timeout_secs() -> u64 {
    120
}

fn default_tool_timeout_secs() -> u64 {
    60
}

fn default_event_buffer() -> usize {
    32
}

fn default_history_turns() -> usize {
    3
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            observation_limit: default_observation_limit(),
            oracle_timeout_secs: default_oracle_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            event_buffer: default_event_buffer(),
            history_turns: default_history_turns(),
        }
    }
}
