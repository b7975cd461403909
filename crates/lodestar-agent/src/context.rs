use lodestar_core::history::render_recent;
use lodestar_core::{ActionInput, Caller, Turn};

const HISTORY_CHARS: usize = 200;

const FORMAT_INSTRUCTIONS: &str = "You must respond in the following format:\n\
Thought: [your reasoning about what to do next]\n\
Action: [tool name from the list above]\n\
Action Input: [JSON input for the tool]\n\n\
When you have enough information to answer, use the 'final_answer' tool.";

const NEXT_STEP_PROMPT: &str = "Now, think step by step about what to do next.";

/// The growing textual context of one reasoning run.
///
/// Starts with the query, caller and tool block and grows by one entry per
/// step. Owned by a single run and never shared.
pub struct ReasoningContext {
    header: String,
    steps: Vec<String>,
}

impl ReasoningContext {
    pub fn new(query: &str, caller: &Caller, usage_block: &str, history: &[Turn], history_turns: usize) -> Self {
        let mut header = format!(
            "User Query: {query}\nRole: {}\nPermissions: {}\n",
            caller.role,
            caller.permission_summary()
        );
        if !history.is_empty() && history_turns > 0 {
            header.push_str("\nRecent conversation:\n");
            header.push_str(&render_recent(history, history_turns, HISTORY_CHARS));
            header.push('\n');
        }
        header.push('\n');
        header.push_str(usage_block);
        header.push_str("\n\n");
        header.push_str(FORMAT_INSTRUCTIONS);

        Self {
            header,
            steps: Vec::new(),
        }
    }

    /// Record a step whose tool ran (or was rejected) with `observation`.
    pub fn push_step(
        &mut self,
        step: u32,
        thought: &str,
        action: &str,
        action_input: Option<&ActionInput>,
        observation: &str,
    ) {
        let mut entry = format!("Step {step}:\nThought: {thought}\nAction: {action}\n");
        if let Some(input) = action_input {
            let json = serde_json::to_string(input).unwrap_or_else(|_| "{}".to_string());
            entry.push_str(&format!("Action Input: {json}\n"));
        }
        entry.push_str(&format!("Observation: {observation}\n"));
        self.steps.push(entry);
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Full prompt for the next oracle call.
    pub fn render(&self) -> String {
        let mut prompt = self.header.clone();
        for entry in &self.steps {
            prompt.push_str("\n\n");
            prompt.push_str(entry);
        }
        prompt.push_str("\n\n");
        prompt.push_str(NEXT_STEP_PROMPT);
        prompt
    }

    /// Rough token estimation (4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        let steps: usize = self.steps.iter().map(|s| s.len() / 4).sum();
        self.header.len() / 4 + steps
    }
}
