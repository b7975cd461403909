use async_trait::async_trait;
use lodestar_core::{Caller, LodestarResult, ToolCall};
use serde::{Deserialize, Serialize};

/// Metadata describing a skill's name, purpose and expected input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub name: String,
    pub description: String,
    /// Example `Action Input` object shown to the oracle.
    pub input_example: serde_json::Value,
    /// External system touched by the skill (`JIRA`, `SLACK`, ...), when it
    /// has side effects worth recording.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_effect_system: Option<String>,
}

impl SkillDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_example: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_example,
            side_effect_system: None,
        }
    }

    /// Mark the skill as side-effecting. The system label is the uppercased
    /// prefix of the skill name (`jira_create` -> `JIRA`).
    pub fn side_effecting(mut self) -> Self {
        let prefix = self.name.split('_').next().unwrap_or(&self.name);
        self.side_effect_system = Some(prefix.to_uppercase());
        self
    }

    /// One line of the tool-usage block: `- name: description Input: {...}`.
    pub fn usage_line(&self) -> String {
        format!(
            "- {}: {} Input: {}",
            self.name, self.description, self.input_example
        )
    }
}

/// A named operation the reasoning loop can invoke.
///
/// Skills receive the parsed action input and the caller, and answer with an
/// observation string. Errors are allowed; the loop turns them into
/// observations.
#[async_trait]
pub trait Skill: Send + Sync {
    fn descriptor(&self) -> &SkillDescriptor;

    async fn invoke(&self, call: &ToolCall, caller: &Caller) -> LodestarResult<String>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_side_effect_system_from_name_prefix() {
        let d = SkillDescriptor::new("k8s_exec", "Run kubectl.", json!({"command": "kubectl ..."}))
            .side_effecting();
        assert_eq!(d.side_effect_system.as_deref(), Some("K8S"));

        let d = SkillDescriptor::new("deploy", "Deploy.", json!({})).side_effecting();
        assert_eq!(d.side_effect_system.as_deref(), Some("DEPLOY"));
    }

    #[test]
    fn test_usage_line_renders_example_json() {
        let d = SkillDescriptor::new(
            "search_code",
            "Search the indexed codebase.",
            json!({"query": "search terms"}),
        );
        assert_eq!(
            d.usage_line(),
            r#"- search_code: Search the indexed codebase. Input: {"query":"search terms"}"#
        );
    }
}
