/// Separators tried in order: paragraph, line, sentence, word, then raw characters.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Splits text into chunks of at most `chunk_size` characters with no overlap.
///
/// Text is cut on the coarsest separator it contains; pieces that are still
/// too long are split again with the next separator. Adjacent small pieces are
/// merged back together (joined by the separator they were cut on) up to the
/// chunk size. The empty separator cuts between characters, so every chunk it
/// produces fits.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Splits `text` into chunks. Empty pieces are dropped, so text made only
    /// of separators yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, SEPARATORS)
    }

    /// Returns only the first chunk.
    pub fn first_chunk(&self, text: &str) -> Option<String> {
        self.split(text).into_iter().next()
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep));
        let Some(position) = position else {
            // Nothing left to split on
            return if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            };
        };

        let separator = separators[position];
        let remaining = &separators[position + 1..];

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }

            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, remaining));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }

        chunks
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for piece in pieces {
            let len = char_len(piece);
            if current_len + separator_len + len > self.chunk_size && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push_str(separator);
                current_len += separator_len;
            }
            current.push_str(piece);
            current_len += len;
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}
