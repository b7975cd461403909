//! Lenient parsing of free-text oracle replies.
//!
//! A reply is expected to carry `Thought:`, `Action:` and `Action Input:`
//! segments, but nothing enforces that. Markers match case-insensitively and
//! every malformed part falls back to something usable:
//!
//! - no `Action:` marker anywhere: the whole reply is the final answer
//! - `Action:` without an identifier: the action is `final_answer`
//! - invalid JSON input: a permissive literal parse, then `{"raw": <text>}`
//! - text after the first input object is ignored

use lodestar_core::ActionInput;
use lodestar_skills::FINAL_ANSWER;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Outcome of parsing one oracle reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Parsed {
        thought: String,
        action: String,
        action_input: ActionInput,
    },
    /// The reply had no `Action:` marker; `raw_text` is the answer.
    Unparsed { raw_text: String },
}

struct Patterns {
    action_marker: Regex,
    thought: Regex,
    action: Regex,
    input_marker: Regex,
    py_true: Regex,
    py_false: Regex,
    py_none: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).unwrap_or_else(|e| panic!("invalid pattern {p}: {e}"));
        Patterns {
            action_marker: re(r"(?i)\baction\s*:"),
            thought: re(r"(?is)thought\s*:\s*(.*?)\s*(?:\baction\s*:|\z)"),
            action: re(r"(?i)\baction\s*:[ \t]*([A-Za-z_][A-Za-z0-9_\-]*)"),
            input_marker: re(r"(?i)\baction\s+input\s*:"),
            py_true: re(r"\bTrue\b"),
            py_false: re(r"\bFalse\b"),
            py_none: re(r"\bNone\b"),
        }
    })
}

/// Parse an oracle reply into a tagged result.
pub fn parse_response(text: &str) -> ParsedResponse {
    let p = patterns();

    let Some(marker) = p.action_marker.find(text) else {
        return ParsedResponse::Unparsed {
            raw_text: text.trim().to_string(),
        };
    };

    let thought = match p.thought.captures(text) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
        None => text[..marker.start()].trim().to_string(),
    };

    let action = p
        .action
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| FINAL_ANSWER.to_string(), |m| m.as_str().to_string());

    ParsedResponse::Parsed {
        thought,
        action,
        action_input: parse_action_input(text),
    }
}

fn parse_action_input(text: &str) -> ActionInput {
    let Some(marker) = patterns().input_marker.find(text) else {
        return ActionInput::new();
    };
    let rest = text[marker.end()..].trim_start();

    if rest.starts_with('{') {
        // First JSON value only; anything after it (a hallucinated
        // Observation, another action) is ignored.
        if let Some(Ok(Value::Object(map))) =
            serde_json::Deserializer::from_str(rest).into_iter::<Value>().next()
        {
            return map;
        }
        let raw = balanced_object(rest).unwrap_or_else(|| rest.trim_end());
        if let Some(map) = parse_object(&permissive_literal(raw)) {
            return map;
        }
        return raw_input(raw);
    }

    match rest.lines().next().map(str::trim) {
        Some(line) if !line.is_empty() => raw_input(line),
        _ => ActionInput::new(),
    }
}

/// The leading `{...}` span of `text`, matched by brace depth outside of
/// quoted strings. `None` when the braces never balance.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                _ if c == q => quote = None,
                _ => {}
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_object(raw: &str) -> Option<ActionInput> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Rewrite a Python-style literal (`{'a': True}`) as JSON.
fn permissive_literal(raw: &str) -> String {
    let p = patterns();
    let swapped = raw.replace('\'', "\"");
    let swapped = p.py_true.replace_all(&swapped, "true");
    let swapped = p.py_false.replace_all(&swapped, "false");
    p.py_none.replace_all(&swapped, "null").into_owned()
}

fn raw_input(raw: &str) -> ActionInput {
    let mut map = ActionInput::new();
    map.insert("raw".to_string(), Value::String(raw.to_string()));
    map
}

/// Answer text carried by a `final_answer` action.
///
/// Uses the `answer` field when present and non-empty, otherwise the whole
/// reply, so a terminal step never produces an empty answer.
pub fn extract_answer(action_input: &ActionInput, reply: &str) -> String {
    match action_input.get("answer") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Null) | Some(Value::String(_)) | None => reply.trim().to_string(),
        Some(other) => other.to_string(),
    }
}
