use serde::{Deserialize, Serialize};

/// Structured input handed to a tool: a JSON object keyed by parameter name.
pub type ActionInput = serde_json::Map<String, serde_json::Value>;

/// A request from the reasoning loop to invoke a named tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Step of the reasoning loop that issued the call.
    pub step: u32,
    /// Name of the tool to invoke.
    pub name: String,
    /// Parameters to pass to the tool.
    pub arguments: ActionInput,
}

impl ToolCall {
    /// Creates a tool call for the given step.
    pub fn new(step: u32, name: impl Into<String>, arguments: ActionInput) -> Self {
        Self {
            step,
            name: name.into(),
            arguments,
        }
    }

    /// Reads a string argument, falling back to `default` when absent or not a string.
    pub fn str_arg<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
    }
}
