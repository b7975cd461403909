use crate::config::AgentConfig;
use crate::context::ReasoningContext;
use crate::parser::{extract_answer, parse_response, ParsedResponse};
use crate::stream::{ActionRecord, AgentEvent, AgentStep, FinishReason, StepState};
use futures_util::StreamExt;
use lodestar_core::{ActionInput, Caller, Oracle, ToolCall, Turn};
use lodestar_skills::{SkillRegistry, FINAL_ANSWER};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Marker appended to observations cut to the configured limit.
pub const TRUNCATION_MARKER: &str = "... (truncated)";

const EXHAUSTED_PREFIX: &str = "I've reached my reasoning limit. ";
const EXHAUSTED_FALLBACK: &str = "I could not reach a conclusion within the allowed steps.";

/// Reply substituted when the oracle fails or times out. It parses as a
/// `final_answer`, so the run ends with an apology instead of an error.
const ORACLE_FAILURE_REPLY: &str = "Thought: I encountered an error. Let me provide a direct answer.\n\
Action: final_answer\n\
Action Input: {\"answer\": \"I apologize, but I encountered an issue processing your request.\"}";

const STEP_PREVIEW_CHARS: usize = 80;

/// Accumulated outcome of a non-streaming run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub answer: String,
    pub finish: FinishReason,
    /// One entry per step, with observations where a tool ran.
    pub trace: Vec<AgentStep>,
    pub actions: Vec<ActionRecord>,
}

/// Cut `text` to `limit` characters and append [`TRUNCATION_MARKER`].
///
/// Text within the limit is returned unchanged, and truncating an already
/// truncated observation yields the same string.
pub fn truncate_observation(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let kept: String = text.chars().take(limit).collect();
    format!("{kept}{TRUNCATION_MARKER}")
}

fn exhausted_answer(last_thought: &str, last_observation: Option<&str>) -> String {
    let detail = if !last_thought.trim().is_empty() {
        last_thought.trim()
    } else {
        match last_observation.map(str::trim) {
            Some(obs) if !obs.is_empty() => obs,
            _ => EXHAUSTED_FALLBACK,
        }
    };
    format!("{EXHAUSTED_PREFIX}{detail}")
}

fn preview(text: &str) -> String {
    text.chars().take(STEP_PREVIEW_CHARS).collect()
}

/// Runs the Thought → Action → Observation loop against an oracle and a
/// skill registry.
///
/// The runner holds only shared read-only references; every run owns its own
/// context, step counter and event channel, so one runner serves concurrent
/// runs.
#[derive(Clone)]
pub struct AgentRunner {
    oracle: Arc<dyn Oracle>,
    skills: Arc<SkillRegistry>,
    config: AgentConfig,
}

impl AgentRunner {
    pub fn new(oracle: Arc<dyn Oracle>, skills: Arc<SkillRegistry>, config: AgentConfig) -> Self {
        Self {
            oracle,
            skills,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Start a run and return its event stream.
    ///
    /// The loop runs on its own task and sends into a bounded channel, so a
    /// slow consumer suspends it. Dropping the stream does not cancel the
    /// run: it completes in the background and its events are discarded.
    pub fn run_stream(&self, query: &str, caller: &Caller, history: &[Turn]) -> ReceiverStream<AgentEvent> {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let runner = self.clone();
        let query = query.to_string();
        let caller = caller.clone();
        let history = history.to_vec();
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("agent_run", run_id = %run_id, role = %caller.role);

        tokio::spawn(
            async move {
                runner.drive(&query, &caller, &history, &tx).await;
            }
            .instrument(span),
        );

        ReceiverStream::new(rx)
    }

    /// Run to completion and accumulate the streamed events.
    pub async fn run(&self, query: &str, caller: &Caller, history: &[Turn]) -> AgentResult {
        let mut stream = self.run_stream(query, caller, history);
        let mut trace: Vec<AgentStep> = Vec::new();
        let mut actions = Vec::new();
        let mut answer = None;

        while let Some(event) = stream.next().await {
            match event {
                AgentEvent::StepStart { .. } => {}
                AgentEvent::StepDone { agent_step, .. } => match trace.last_mut() {
                    Some(last) if last.step == agent_step.step => *last = agent_step,
                    _ => trace.push(agent_step),
                },
                AgentEvent::ActionResult { record } => actions.push(record),
                AgentEvent::Answer { content, finish } => answer = Some((content, finish)),
            }
        }

        let (answer, finish) = answer.unwrap_or_else(|| {
            warn!("Run ended without an answer event");
            (exhausted_answer("", None), FinishReason::Exhausted)
        });
        AgentResult {
            answer,
            finish,
            trace,
            actions,
        }
    }

    async fn drive(&self, query: &str, caller: &Caller, history: &[Turn], tx: &mpsc::Sender<AgentEvent>) {
        let mut context = ReasoningContext::new(
            query,
            caller,
            &self.skills.usage_block(),
            history,
            self.config.history_turns,
        );
        let mut last_thought = String::new();
        let mut last_observation: Option<String> = None;

        info!(max_steps = self.config.max_steps, "Starting reasoning loop");

        for step in 1..=self.config.max_steps {
            emit(
                tx,
                AgentEvent::StepStart {
                    step,
                    text: format!("Step {step}: Analyzing..."),
                },
            )
            .await;

            let reply = self.think(&context).await;

            let (thought, action, action_input) = match parse_response(&reply) {
                ParsedResponse::Unparsed { raw_text } => {
                    debug!(step, "Reply had no action, treating it as the answer");
                    let mut input = ActionInput::new();
                    input.insert("answer".into(), serde_json::Value::String(raw_text.clone()));
                    let agent_step = AgentStep {
                        step,
                        thought: String::new(),
                        action: FINAL_ANSWER.to_string(),
                        action_input: input,
                        observation: None,
                        state: StepState::Done,
                    };
                    emit(
                        tx,
                        AgentEvent::StepDone {
                            step,
                            text: format!("Step {step}: {}...", preview(&raw_text)),
                            agent_step,
                        },
                    )
                    .await;
                    let content = if raw_text.is_empty() {
                        exhausted_answer(&last_thought, last_observation.as_deref())
                    } else {
                        raw_text
                    };
                    finish(tx, content, FinishReason::Answered, step).await;
                    return;
                }
                ParsedResponse::Parsed {
                    thought,
                    action,
                    action_input,
                } => (thought, action, action_input),
            };

            if !thought.trim().is_empty() {
                last_thought.clone_from(&thought);
            }
            let mut agent_step = AgentStep {
                step,
                thought: thought.clone(),
                action: action.clone(),
                action_input: action_input.clone(),
                observation: None,
                state: if action == FINAL_ANSWER {
                    StepState::Done
                } else {
                    StepState::Processing
                },
            };
            emit(
                tx,
                AgentEvent::StepDone {
                    step,
                    text: format!("Step {step}: {}...", preview(&thought)),
                    agent_step: agent_step.clone(),
                },
            )
            .await;

            if action == FINAL_ANSWER {
                finish(tx, extract_answer(&action_input, &reply), FinishReason::Answered, step).await;
                return;
            }

            let (observation, done_text) = if self.skills.contains(&action) {
                emit(
                    tx,
                    AgentEvent::StepStart {
                        step,
                        text: format!("Executing {action}..."),
                    },
                )
                .await;

                let observation = self.act(step, &action, &action_input, caller).await;

                let system = self
                    .skills
                    .get(&action)
                    .and_then(|skill| skill.descriptor().side_effect_system.clone());
                if let Some(system) = system {
                    emit(
                        tx,
                        AgentEvent::ActionResult {
                            record: ActionRecord {
                                system,
                                status: "EXECUTED".to_string(),
                                payload: action_input.clone(),
                                result: observation.clone(),
                            },
                        },
                    )
                    .await;
                }
                context.push_step(step, &thought, &action, Some(&action_input), &observation);
                (observation, format!("Executing {action}..."))
            } else {
                let mut valid = self.skills.names();
                valid.push(FINAL_ANSWER);
                warn!(step, action = %action, "Oracle named an unknown tool");
                let observation = format!(
                    "Unknown tool '{action}'. Available tools: {}",
                    valid.join(", ")
                );
                context.push_step(step, &thought, &action, None, &observation);
                (observation, format!("Step {step}: unknown tool {action}"))
            };

            agent_step.observation = Some(observation.clone());
            agent_step.state = StepState::Done;
            emit(
                tx,
                AgentEvent::StepDone {
                    step,
                    text: done_text,
                    agent_step,
                },
            )
            .await;
            last_observation = Some(observation);
        }

        info!(
            max_steps = self.config.max_steps,
            context_tokens = context.estimated_tokens(),
            "Step budget exhausted, synthesizing answer"
        );
        finish(
            tx,
            exhausted_answer(&last_thought, last_observation.as_deref()),
            FinishReason::Exhausted,
            self.config.max_steps,
        )
        .await;
    }

    async fn think(&self, context: &ReasoningContext) -> String {
        let deadline = Duration::from_secs(self.config.oracle_timeout_secs);
        match tokio::time::timeout(deadline, self.oracle.generate(&context.render())).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(error = %e, "Reasoning oracle failed");
                ORACLE_FAILURE_REPLY.to_string()
            }
            Err(_) => {
                warn!(timeout_secs = self.config.oracle_timeout_secs, "Reasoning oracle timed out");
                ORACLE_FAILURE_REPLY.to_string()
            }
        }
    }

    /// Invoke a tool; failures become the observation text.
    async fn act(&self, step: u32, action: &str, action_input: &ActionInput, caller: &Caller) -> String {
        let call = ToolCall::new(step, action, action_input.clone());
        let timeout = Duration::from_secs(self.config.tool_timeout_secs);
        let raw = match self.skills.invoke(&call, caller, timeout).await {
            Ok(output) => {
                info!(step, tool = %action, chars = output.len(), "Tool executed");
                output
            }
            Err(e) => {
                warn!(step, tool = %action, error = %e, "Tool execution failed");
                format!("Error executing tool {action}: {e}")
            }
        };
        truncate_observation(&raw, self.config.observation_limit)
    }
}

async fn emit(tx: &mpsc::Sender<AgentEvent>, event: AgentEvent) {
    if tx.send(event).await.is_err() {
        debug!("Event consumer disconnected, continuing run");
    }
}

async fn finish(tx: &mpsc::Sender<AgentEvent>, content: String, reason: FinishReason, steps: u32) {
    info!(steps, finish = ?reason, "Reasoning loop finished");
    emit(
        tx,
        AgentEvent::Answer {
            content,
            finish: reason,
        },
    )
    .await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_bound_and_marker() {
        let text = "x".repeat(1500);
        let cut = truncate_observation(&text, 1000);
        assert_eq!(cut.chars().count(), 1000 + TRUNCATION_MARKER.len());
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert!(cut.starts_with(&"x".repeat(1000)));
    }

    #[test]
    fn test_truncate_is_idempotent() {
        let text = "é".repeat(40);
        let once = truncate_observation(&text, 10);
        assert_eq!(truncate_observation(&text, 10), once);
        assert_eq!(truncate_observation(&once, 10), once);
        assert_eq!(truncate_observation("short", 10), "short");
    }

    #[test]
    fn test_exhausted_answer_preference() {
        assert_eq!(
            exhausted_answer("check logs next", Some("obs")),
            "I've reached my reasoning limit. check logs next"
        );
        assert_eq!(
            exhausted_answer("  ", Some("pods are running")),
            "I've reached my reasoning limit. pods are running"
        );
        let fallback = exhausted_answer("", None);
        assert!(fallback.starts_with(EXHAUSTED_PREFIX));
        assert!(fallback.len() > EXHAUSTED_PREFIX.len());
    }

    #[test]
    fn test_oracle_failure_reply_parses_as_final_answer() {
        match parse_response(ORACLE_FAILURE_REPLY) {
            ParsedResponse::Parsed {
                action,
                action_input,
                ..
            } => {
                assert_eq!(action, FINAL_ANSWER);
                assert!(extract_answer(&action_input, ORACLE_FAILURE_REPLY).starts_with("I apologize"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
