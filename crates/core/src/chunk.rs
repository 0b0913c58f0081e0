use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tokenizer::Tokenizer;

// A sentence ends at `.`, `!` or `?` followed by whitespace. The
// whitespace run stays attached to the sentence it follows, so chunks
// concatenate back to the source text without loss.
static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("sentence boundary pattern"));

/// A token-bounded, 1-indexed slice of source text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub total: usize,
    pub text: String,
    pub token_count: usize,
}

impl Chunk {
    /// A single chunk standing for a whole text, used when re-dispatching
    /// already-merged content.
    pub fn whole(text: impl Into<String>, tokenizer: &Tokenizer) -> Self {
        let text = text.into();
        let token_count = tokenizer.count(&text);
        Chunk {
            index: 1,
            total: 1,
            text,
            token_count,
        }
    }
}

/// Split `text` into sentence-like units, each retaining its trailing
/// whitespace. Concatenating the pieces reproduces `text` exactly.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        pieces.push(&text[start..boundary.end()]);
        start = boundary.end();
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Greedily pack sentences into chunks of at most `budget` tokens. A chunk
/// is closed only when it is non-empty and the next sentence would push it
/// over budget, so a single sentence longer than the budget becomes its
/// own oversized chunk rather than being split or silently truncated.
pub fn split_chunks(text: &str, budget: usize, tokenizer: &Tokenizer) -> Result<Vec<Chunk>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let budget = budget.max(1);
    let mut closed: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;
    for sentence in split_sentences(text) {
        let sentence_tokens = tokenizer.count(sentence);
        if !current.is_empty() && current_tokens + sentence_tokens > budget {
            closed.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current.push_str(sentence);
        current_tokens += sentence_tokens;
    }
    if !current.is_empty() {
        closed.push(current);
    }
    let total = closed.len();
    Ok(closed
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let token_count = tokenizer.count(&text);
            Chunk {
                index: i + 1,
                total,
                text,
                token_count,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::default_tokenizer;

    #[test]
    fn empty_input_yields_no_chunks() {
        let tok = default_tokenizer();
        assert!(split_chunks("", 100, tok).unwrap().is_empty());
        assert!(split_chunks("   \n ", 100, tok).unwrap().is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let tok = default_tokenizer();
        let text = "One sentence. Another sentence.";
        let chunks = split_chunks(text, 800, tok).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 1);
        assert_eq!(chunks[0].total, 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn chunks_respect_budget_and_reassemble() {
        let tok = default_tokenizer();
        let text = "The regulation takes effect next year. Importers must file a declaration. \
                    Labels are revised under the new scheme! Does the annex apply to packaging? \
                    Testing is required before market entry. Records are kept for ten years."
            .repeat(6);
        let budget = 40;
        let chunks = split_chunks(&text, budget, tok).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= budget, "chunk {} over budget", chunk.index);
            assert_eq!(chunk.total, chunks.len());
        }
        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, (1..=chunks.len()).collect::<Vec<_>>());
        let rejoined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rejoined, text);
    }

    #[test]
    fn oversized_sentence_becomes_its_own_chunk() {
        let tok = default_tokenizer();
        let long = format!("{} end.", "word ".repeat(60));
        let text = format!("Short lead. {long} Short tail.");
        let chunks = split_chunks(&text, 20, tok).unwrap();
        let over: Vec<&Chunk> = chunks.iter().filter(|c| c.token_count > 20).collect();
        assert_eq!(over.len(), 1);
        assert!(over[0].text.contains("word word"));
        let rejoined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rejoined, text);
    }

    #[test]
    fn sentences_keep_separators() {
        let pieces = split_sentences("First. Second!  Third? Fourth");
        assert_eq!(pieces, vec!["First. ", "Second!  ", "Third? ", "Fourth"]);
        assert_eq!(pieces.concat(), "First. Second!  Third? Fourth");
    }
}
