use crate::error::LodestarResult;
use async_trait::async_trait;

/// An opaque text-in / text-out generation capability.
///
/// Both the reasoning loop and multi-hop reflection consult an oracle. No
/// structure is assumed on the completion; callers parse it themselves.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Produce a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> LodestarResult<String>;
}

/// Oracle that replays a fixed list of completions, cycling on the last one.
///
/// Useful for wiring tests and offline demos without a model server.
pub struct ScriptedOracle {
    responses: Vec<String>,
    cursor: std::sync::atomic::AtomicUsize,
}

impl ScriptedOracle {
    /// Creates an oracle that answers with `responses` in order.
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            cursor: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of completions produced so far.
    pub fn calls(&self) -> usize {
        self.cursor.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn generate(&self, _prompt: &str) -> LodestarResult<String> {
        let idx = self
            .cursor
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let last = self.responses.len().saturating_sub(1);
        Ok(self
            .responses
            .get(idx.min(last))
            .cloned()
            .unwrap_or_default())
    }
}
