//! Token-budget trimming for prompt inputs.

mod splitter;

pub use splitter::RecursiveSplitter;

use std::sync::Arc;

use splitter::char_len;
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Shortest output `trim` cuts down to, in characters.
pub const MIN_CHUNK_SIZE: usize = 140;

/// Characters assumed per token when converting an overflow into a cut.
const CHARS_PER_TOKEN_ESTIMATE: usize = 3;

/// Upper bound on trimming passes. Each pass shrinks the input, so this is
/// never reached for sane counters.
const MAX_TRIM_PASSES: usize = 64;

/// Deterministic token length estimate.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Exact counts from a BPE encoding.
pub struct BpeCounter {
    bpe: CoreBPE,
}

impl BpeCounter {
    /// The `o200k_base` encoding used by current OpenAI models.
    pub fn o200k() -> Result<Self, String> {
        tiktoken_rs::o200k_base()
            .map(|bpe| Self { bpe })
            .map_err(|e| e.to_string())
    }
}

impl TokenCounter for BpeCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Fixed characters-per-token approximation.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicCounter {
    chars_per_token: usize,
}

impl HeuristicCounter {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for HeuristicCounter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> usize {
        char_len(text).div_ceil(self.chars_per_token)
    }
}

/// Trims text to a token budget.
///
/// ```ignore
/// let budgeter = TextBudgeter::new();
/// let prompt_part = budgeter.trim(&page_content, 25_000);
/// ```
#[derive(Clone)]
pub struct TextBudgeter {
    counter: Arc<dyn TokenCounter>,
}

impl Default for TextBudgeter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBudgeter {
    /// Uses the `o200k_base` encoder, or a 4 chars/token estimate if it cannot load.
    pub fn new() -> Self {
        match BpeCounter::o200k() {
            Ok(counter) => Self::with_counter(counter),
            Err(e) => {
                warn!(error = %e, "BPE encoder unavailable, estimating tokens from length");
                Self::with_counter(HeuristicCounter::default())
            }
        }
    }

    pub fn with_counter(counter: impl TokenCounter + 'static) -> Self {
        Self {
            counter: Arc::new(counter),
        }
    }

    /// Estimated token length of `text`.
    pub fn count(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    /// Returns `text` cut down so its estimated token length is at most
    /// `max_tokens`.
    ///
    /// Text already within budget is returned unchanged. Otherwise the
    /// overflow is converted to a character target (3 chars per token) and
    /// the first chunk of a recursive split at that size is kept; this
    /// repeats until the text fits. A target under [`MIN_CHUNK_SIZE`]
    /// returns the first `MIN_CHUNK_SIZE` characters instead, so non-empty
    /// input never yields empty output. Calling `trim` again on the result
    /// with the same budget returns it unchanged.
    pub fn trim(&self, text: &str, max_tokens: usize) -> String {
        let mut current = text.to_string();

        for _ in 0..MAX_TRIM_PASSES {
            if current.is_empty() {
                return current;
            }

            let length = self.counter.count(&current);
            if length <= max_tokens {
                return current;
            }

            let overflow = length - max_tokens;
            let current_len = char_len(&current);
            let chunk_size = current_len.saturating_sub(overflow.saturating_mul(CHARS_PER_TOKEN_ESTIMATE));
            if chunk_size < MIN_CHUNK_SIZE {
                return prefix(&current, MIN_CHUNK_SIZE).to_string();
            }

            let chunk = RecursiveSplitter::new(chunk_size)
                .first_chunk(&current)
                .unwrap_or_default();
            let chunk_len = char_len(&chunk);

            current = if chunk.is_empty() || chunk_len >= current_len {
                // Splitter made no progress
                prefix(&current, chunk_size).to_string()
            } else {
                chunk
            };
        }

        prefix(&current, MIN_CHUNK_SIZE).to_string()
    }
}

/// The first `chars` characters of `text`.
fn prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
