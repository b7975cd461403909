use lodestar_core::ActionInput;
use serde::{Deserialize, Serialize};

/// One Thought/Action/Observation cycle of a reasoning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    /// 1-based step number.
    pub step: u32,
    pub thought: String,
    pub action: String,
    pub action_input: ActionInput,
    /// Tool output, once the action has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    pub state: StepState,
}

/// Lifecycle of an [`AgentStep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepState {
    /// The action is chosen but its observation is still pending.
    Processing,
    /// The observation is filled in, or the action was terminal.
    Done,
}

/// Record of a side-effecting tool call, relayed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// External system touched, e.g. `JIRA` or `K8S`.
    pub system: String,
    pub status: String,
    pub payload: ActionInput,
    pub result: String,
}

/// Why a run produced its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// The oracle chose `final_answer` or replied without an action.
    Answered,
    /// The step budget ran out and the answer was synthesized.
    Exhausted,
}

/// Progress events emitted by a streaming run, in phase order.
///
/// Every run ends with exactly one [`AgentEvent::Answer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AgentEvent {
    /// A phase began: oracle consultation or tool execution.
    StepStart { step: u32, text: String },

    /// A phase finished. Carries the step as known so far; the tool phase
    /// repeats it with the observation filled in.
    StepDone {
        step: u32,
        text: String,
        agent_step: AgentStep,
    },

    /// A side-effecting tool ran.
    ActionResult { record: ActionRecord },

    /// The final answer.
    Answer { content: String, finish: FinishReason },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_with_kebab_tags() {
        let start = AgentEvent::StepStart {
            step: 1,
            text: "Step 1: Analyzing...".into(),
        };
        let json = serde_json::to_value(&start).unwrap();
        assert_eq!(json["type"], "step-start");
        assert_eq!(json["text"], "Step 1: Analyzing...");

        let answer = AgentEvent::Answer {
            content: "done".into(),
            finish: FinishReason::Exhausted,
        };
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["type"], "answer");
        assert_eq!(json["finish"], "exhausted");

        let back: AgentEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, answer);
    }

    #[test]
    fn test_step_state_serializes_lowercase() {
        let step = AgentStep {
            step: 2,
            thought: "check pods".into(),
            action: "k8s_exec".into(),
            action_input: ActionInput::new(),
            observation: None,
            state: StepState::Processing,
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["state"], "processing");
        assert!(json.get("observation").is_none());

        let done = AgentStep {
            observation: Some("3 pods".into()),
            state: StepState::Done,
            ..step
        };
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["state"], "done");
        let back: AgentStep = serde_json::from_value(json).unwrap();
        assert_eq!(back, done);
    }

    #[test]
    fn test_action_result_shape() {
        let event = AgentEvent::ActionResult {
            record: ActionRecord {
                system: "SLACK".into(),
                status: "EXECUTED".into(),
                payload: ActionInput::new(),
                result: "Posted".into(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "action-result");
        assert_eq!(json["record"]["system"], "SLACK");
    }
}
