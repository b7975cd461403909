use crate::chunk::Chunk;

/// Default character budget for rendered context.
pub const DEFAULT_CONTEXT_CHARS: usize = 8000;

/// Render chunks as fenced blocks for an oracle prompt.
///
/// Each block is headed by `location:start-end (name)`. Blocks are appended
/// in order until the next one would push the total past `max_chars`; the
/// first block that does not fit ends the output.
pub fn format_for_context(chunks: &[Chunk], max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut total = 0usize;

    for chunk in chunks {
        let block = render_block(chunk);
        let len = block.chars().count();
        if total + len > max_chars {
            break;
        }
        total += len;
        parts.push(block);
    }

    parts.join("\n")
}

fn render_block(chunk: &Chunk) -> String {
    let meta = &chunk.metadata;
    let location = if meta.location.is_empty() {
        "unknown"
    } else {
        meta.location.as_str()
    };
    let line = |n: Option<u32>| n.map_or_else(|| "?".to_string(), |n| n.to_string());

    let mut header = format!("{location}:{}-{}", line(meta.start_line), line(meta.end_line));
    if let Some(name) = meta.name.as_deref().filter(|n| !n.is_empty()) {
        header.push_str(&format!(" ({name})"));
    }
    let language = meta.language.as_deref().unwrap_or("");

    format!("\n{header}\n```{language}\n{}\n```\n", chunk.text)
}
