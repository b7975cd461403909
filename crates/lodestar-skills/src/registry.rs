use crate::skill::{Skill, SkillDescriptor};
use lodestar_core::{Caller, LodestarError, LodestarResult, ToolCall};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Terminal action name. Never dispatched to a skill.
pub const FINAL_ANSWER: &str = "final_answer";

/// Central registry for all available skills, keyed by name.
///
/// Built once at startup and shared read-only between concurrent runs.
pub struct SkillRegistry {
    skills: BTreeMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self {
            skills: BTreeMap::new(),
        }
    }

    /// Register a skill, replacing any skill with the same name.
    /// The terminal action name is reserved and rejected.
    pub fn register(&mut self, skill: Arc<dyn Skill>) -> LodestarResult<()> {
        let name = skill.descriptor().name.clone();
        if name == FINAL_ANSWER {
            return Err(LodestarError::Skill(format!(
                "'{FINAL_ANSWER}' is reserved for the terminal action"
            )));
        }
        if self.skills.insert(name.clone(), skill).is_some() {
            warn!(skill = %name, "Replaced previously registered skill");
        } else {
            info!(skill = %name, "Registered skill");
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Skill>> {
        self.skills.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    /// Registered skill names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.skills.keys().map(String::as_str).collect()
    }

    pub fn list_descriptors(&self) -> Vec<&SkillDescriptor> {
        self.skills.values().map(|s| s.descriptor()).collect()
    }

    pub fn skill_count(&self) -> usize {
        self.skills.len()
    }

    /// The static tool-usage block placed in every reasoning prompt,
    /// including the terminal action.
    pub fn usage_block(&self) -> String {
        let mut lines = vec!["Available Tools:".to_string()];
        lines.extend(self.skills.values().map(|s| s.descriptor().usage_line()));
        lines.push(
            SkillDescriptor::new(
                FINAL_ANSWER,
                "Provide the final answer to the user.",
                json!({"answer": "your response"}),
            )
            .usage_line(),
        );
        lines.join("\n")
    }

    /// Invoke a skill under a deadline.
    ///
    /// Unknown names and expired deadlines are errors like any failure the
    /// skill itself reports.
    pub async fn invoke(
        &self,
        call: &ToolCall,
        caller: &Caller,
        timeout: Duration,
    ) -> LodestarResult<String> {
        let skill = self
            .skills
            .get(&call.name)
            .ok_or_else(|| LodestarError::Skill(format!("Unknown skill: {}", call.name)))?;

        debug!(skill = %call.name, step = call.step, role = %caller.role, "Invoking skill");
        match tokio::time::timeout(timeout, skill.invoke(call, caller)).await {
            Ok(result) => result,
            Err(_) => Err(LodestarError::Timeout(timeout.as_secs())),
        }
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lodestar_core::ActionInput;

    struct Echo(SkillDescriptor);

    #[async_trait]
    impl Skill for Echo {
        fn descriptor(&self) -> &SkillDescriptor {
            &self.0
        }

        async fn invoke(&self, call: &ToolCall, caller: &Caller) -> LodestarResult<String> {
            Ok(format!("{} as {}", call.str_arg("text", ""), caller.role))
        }
    }

    struct Sleepy(SkillDescriptor);

    #[async_trait]
    impl Skill for Sleepy {
        fn descriptor(&self) -> &SkillDescriptor {
            &self.0
        }

        async fn invoke(&self, _call: &ToolCall, _caller: &Caller) -> LodestarResult<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("late".into())
        }
    }

    fn echo(name: &str) -> Arc<dyn Skill> {
        Arc::new(Echo(SkillDescriptor::new(name, "Echo text.", json!({"text": "..."}))))
    }

    fn call(name: &str, text: &str) -> ToolCall {
        let mut args = ActionInput::new();
        args.insert("text".into(), json!(text));
        ToolCall::new(1, name, args)
    }

    #[test]
    fn test_names_sorted_and_final_answer_reserved() {
        let mut registry = SkillRegistry::new();
        registry.register(echo("zeta")).unwrap();
        registry.register(echo("alpha")).unwrap();
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
        assert!(registry.register(echo(FINAL_ANSWER)).is_err());
        assert_eq!(registry.skill_count(), 2);
    }

    #[test]
    fn test_usage_block_lists_skills_and_terminal_action() {
        let mut registry = SkillRegistry::new();
        registry.register(echo("echo")).unwrap();
        let block = registry.usage_block();
        assert!(block.starts_with("Available Tools:"));
        assert!(block.contains("- echo: Echo text."));
        assert!(block.ends_with(r#"- final_answer: Provide the final answer to the user. Input: {"answer":"your response"}"#));
    }

    #[tokio::test]
    async fn test_invoke_passes_role() {
        let mut registry = SkillRegistry::new();
        registry.register(echo("echo")).unwrap();
        let out = registry
            .invoke(&call("echo", "hi"), &Caller::new("SRE"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, "hi as SRE");
    }

    #[tokio::test]
    async fn test_invoke_unknown_is_error() {
        let registry = SkillRegistry::new();
        let err = registry
            .invoke(&call("nope", ""), &Caller::default(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown skill: nope"));
    }

    #[tokio::test]
    async fn test_invoke_times_out() {
        let mut registry = SkillRegistry::new();
        registry
            .register(Arc::new(Sleepy(SkillDescriptor::new("sleepy", "Sleeps.", json!({})))))
            .unwrap();
        let err = registry
            .invoke(&call("sleepy", ""), &Caller::default(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, LodestarError::Timeout(_)));
    }
}
