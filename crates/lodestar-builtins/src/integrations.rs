//! Simulated team integrations.
//!
//! These skills stand in for ticketing, chat, cluster and calendar systems.
//! They answer with deterministic observations in the shape the real
//! integrations report, and are flagged as side-effecting so runs record an
//! action for each call.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use lodestar_core::{Caller, LodestarResult, ToolCall};
use lodestar_skills::{Skill, SkillDescriptor};
use serde_json::json;
use tracing::info;

/// Creates a ticket; the id is derived from the local wall clock.
pub struct JiraCreateSkill {
    descriptor: SkillDescriptor,
}

impl JiraCreateSkill {
    pub fn new() -> Self {
        Self {
            descriptor: SkillDescriptor::new(
                "jira_create",
                "Create a JIRA ticket.",
                json!({"summary": "...", "description": "...", "priority": "High/Medium/Low"}),
            )
            .side_effecting(),
        }
    }
}

impl Default for JiraCreateSkill {
    fn default() -> Self {
        Self::new()
    }
}

fn ticket_id(now: DateTime<Local>) -> String {
    format!("DEV-{}", now.format("%H%M%S"))
}

#[async_trait]
impl Skill for JiraCreateSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, call: &ToolCall, caller: &Caller) -> LodestarResult<String> {
        let summary = call.str_arg("summary", "New Ticket");
        let priority = call.str_arg("priority", "Medium");
        let id = ticket_id(Local::now());
        info!(ticket = %id, role = %caller.role, "Simulated ticket created");
        Ok(format!(
            "Created JIRA ticket {id}: '{summary}' with priority {priority}"
        ))
    }
}

/// Posts a chat message.
pub struct SlackPostSkill {
    descriptor: SkillDescriptor,
}

impl SlackPostSkill {
    pub fn new() -> Self {
        Self {
            descriptor: SkillDescriptor::new(
                "slack_post",
                "Post a message to Slack.",
                json!({"channel": "#channel-name", "message": "..."}),
            )
            .side_effecting(),
        }
    }
}

impl Default for SlackPostSkill {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Skill for SlackPostSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, call: &ToolCall, _caller: &Caller) -> LodestarResult<String> {
        let channel = call.str_arg("channel", "#general");
        let message: String = call.str_arg("message", "").chars().take(100).collect();
        Ok(format!("Posted to {channel}: {message}..."))
    }
}

const KUBECTL_OUTPUTS: &[(&str, &str)] = &[
    (
        "get pods",
        "NAME                     READY   STATUS    RESTARTS   AGE\n\
         api-gateway-7f9d8c6b4-x2k3m   1/1     Running   0          3h\n\
         payments-v2-5c8d7b4a3-y9n8z   1/1     Running   0          1h",
    ),
    (
        "get nodes",
        "NAME           STATUS   ROLES    AGE   VERSION\n\
         master-01      Ready    master   30d   v1.28.0\n\
         worker-01      Ready    <none>   30d   v1.28.0",
    ),
    (
        "get services",
        "NAME         TYPE        CLUSTER-IP     EXTERNAL-IP   PORT(S)   AGE\n\
         kubernetes   ClusterIP   10.96.0.1      <none>        443/TCP   30d",
    ),
];

/// Runs a kubectl command against a canned cluster.
pub struct K8sExecSkill {
    descriptor: SkillDescriptor,
}

impl K8sExecSkill {
    pub fn new() -> Self {
        Self {
            descriptor: SkillDescriptor::new(
                "k8s_exec",
                "Execute a Kubernetes command.",
                json!({"command": "kubectl ..."}),
            )
            .side_effecting(),
        }
    }
}

impl Default for K8sExecSkill {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Skill for K8sExecSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, call: &ToolCall, caller: &Caller) -> LodestarResult<String> {
        let command = call.str_arg("command", "kubectl get pods");
        info!(command = %command, role = %caller.role, "Simulated kubectl command");
        let lowered = command.to_lowercase();
        let output = KUBECTL_OUTPUTS
            .iter()
            .find(|(key, _)| lowered.contains(*key))
            .map_or("Command executed successfully.", |(_, out)| *out);
        Ok(format!("$ {command}\n{output}"))
    }
}

/// Schedules a calendar event.
pub struct CalendarEventSkill {
    descriptor: SkillDescriptor,
}

impl CalendarEventSkill {
    pub fn new() -> Self {
        Self {
            descriptor: SkillDescriptor::new(
                "calendar_event",
                "Create a calendar event.",
                json!({"title": "...", "participants": ["..."], "time": "..."}),
            )
            .side_effecting(),
        }
    }
}

impl Default for CalendarEventSkill {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Skill for CalendarEventSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, call: &ToolCall, _caller: &Caller) -> LodestarResult<String> {
        let title = call.str_arg("title", "Meeting");
        let time = call.str_arg("time", "Tomorrow 10:00 AM");
        let participants = call
            .arguments
            .get("participants")
            .and_then(|v| v.as_array())
            .map_or(0, Vec::len);
        Ok(format!(
            "Created calendar event: '{title}' at {time} with {participants} participants"
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lodestar_core::ActionInput;

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        let arguments: ActionInput = serde_json::from_value(args).unwrap();
        ToolCall::new(1, name, arguments)
    }

    #[test]
    fn test_ticket_id_uses_clock_time() {
        let now = Local.with_ymd_and_hms(2026, 3, 1, 9, 5, 7).unwrap();
        assert_eq!(ticket_id(now), "DEV-090507");
    }

    #[tokio::test]
    async fn test_jira_defaults() {
        let out = JiraCreateSkill::new()
            .invoke(&call("jira_create", json!({})), &Caller::new("SRE"))
            .await
            .unwrap();
        assert!(out.starts_with("Created JIRA ticket DEV-"));
        assert!(out.ends_with(": 'New Ticket' with priority Medium"));
    }

    #[tokio::test]
    async fn test_slack_message_is_cut_to_100_chars() {
        let long = "x".repeat(150);
        let out = SlackPostSkill::new()
            .invoke(
                &call("slack_post", json!({"channel": "#ops", "message": long})),
                &Caller::default(),
            )
            .await
            .unwrap();
        assert_eq!(out, format!("Posted to #ops: {}...", "x".repeat(100)));
    }

    #[tokio::test]
    async fn test_kubectl_canned_outputs() {
        let skill = K8sExecSkill::new();
        let out = skill
            .invoke(&call("k8s_exec", json!({"command": "kubectl GET NODES"})), &Caller::default())
            .await
            .unwrap();
        assert!(out.starts_with("$ kubectl GET NODES\n"));
        assert!(out.contains("master-01"));

        let out = skill
            .invoke(&call("k8s_exec", json!({"command": "kubectl rollout restart"})), &Caller::default())
            .await
            .unwrap();
        assert!(out.ends_with("Command executed successfully."));
    }

    #[tokio::test]
    async fn test_calendar_counts_participants() {
        let out = CalendarEventSkill::new()
            .invoke(
                &call(
                    "calendar_event",
                    json!({"title": "Postmortem", "participants": ["a", "b"], "time": "Fri 3pm"}),
                ),
                &Caller::default(),
            )
            .await
            .unwrap();
        assert_eq!(out, "Created calendar event: 'Postmortem' at Fri 3pm with 2 participants");
    }

    #[test]
    fn test_all_integrations_are_side_effecting() {
        let systems: Vec<Option<String>> = vec![
            JiraCreateSkill::new().descriptor().side_effect_system.clone(),
            SlackPostSkill::new().descriptor().side_effect_system.clone(),
            K8sExecSkill::new().descriptor().side_effect_system.clone(),
            CalendarEventSkill::new().descriptor().side_effect_system.clone(),
        ];
        assert_eq!(
            systems,
            vec![
                Some("JIRA".to_string()),
                Some("SLACK".to_string()),
                Some("K8S".to_string()),
                Some("CALENDAR".to_string()),
            ]
        );
    }
}
