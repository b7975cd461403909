use serde::{Deserialize, Serialize};

/// One prior exchange in the conversation, supplied by the caller.
///
/// Persistence of conversations happens outside this workspace; callers load
/// the recent turns themselves and pass them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Author of the turn (`user`, `assistant`, ...).
    pub role: String,
    /// Text of the turn.
    pub content: String,
}

impl Turn {
    /// Creates a turn authored by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Creates a turn authored by the assistant.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Renders the last `max_turns` turns as `Role: content` lines, each content
/// cut to `max_chars` characters.
pub fn render_recent(history: &[Turn], max_turns: usize, max_chars: usize) -> String {
    let start = history.len().saturating_sub(max_turns);
    history[start..]
        .iter()
        .map(|turn| {
            let mut role = turn.role.clone();
            if let Some(first) = role.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            let content: String = turn.content.chars().take(max_chars).collect();
            format!("{role}: {content}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_recent_keeps_tail() {
        let history = vec![
            Turn::user("one"),
            Turn::assistant("two"),
            Turn::user("three"),
            Turn::assistant("four"),
        ];
        let rendered = render_recent(&history, 3, 200);
        assert_eq!(rendered, "Assistant: two\nUser: three\nAssistant: four");
    }

    #[test]
    fn test_render_recent_truncates_content() {
        let history = vec![Turn::user("abcdefgh")];
        assert_eq!(render_recent(&history, 3, 3), "User: abc");
        assert_eq!(render_recent(&[], 3, 3), "");
    }
}
