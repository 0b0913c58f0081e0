use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;

use crate::error::{CoreError, Result};

static CL100K: Lazy<Tokenizer> = Lazy::new(|| {
    Tokenizer {
        bpe: tiktoken_rs::cl100k_base().expect("bundled cl100k tables"),
    }
});

/// The shared default encoder. Budgets across the engine are measured with
/// the same tokenizer the completion service accounts with.
pub fn default_tokenizer() -> &'static Tokenizer {
    &CL100K
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerKind {
    Cl100k,
    Gpt2,
    O200k,
}

impl Default for TokenizerKind {
    fn default() -> Self {
        TokenizerKind::Cl100k
    }
}

impl TokenizerKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "cl100k" | "cl100k_base" => Some(TokenizerKind::Cl100k),
            "gpt2" | "p50k" | "p50k_base" => Some(TokenizerKind::Gpt2),
            "o200k" | "o200k_base" => Some(TokenizerKind::O200k),
            _ => None,
        }
    }

    pub fn build(&self) -> Result<Tokenizer> {
        let bpe = match self {
            TokenizerKind::Cl100k => tiktoken_rs::cl100k_base(),
            TokenizerKind::Gpt2 => tiktoken_rs::p50k_base(),
            TokenizerKind::O200k => tiktoken_rs::o200k_base(),
        };
        bpe.map(|bpe| Tokenizer { bpe })
            .map_err(|e| CoreError::Tokenizer(e.to_string()))
    }
}

/// Deterministic subword tokenizer wrapping a tiktoken encoding.
pub struct Tokenizer {
    bpe: CoreBPE,
}

impl Tokenizer {
    pub fn encode(&self, text: &str) -> Vec<usize> {
        self.bpe.encode_with_special_tokens(text)
    }

    pub fn decode(&self, tokens: &[usize]) -> Result<String> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|e| CoreError::Tokenizer(e.to_string()))
    }

    pub fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    /// Token-level truncation: keep at most `max_tokens` leading tokens.
    /// A cut that lands inside a multi-byte sequence is backed off until the
    /// prefix decodes cleanly.
    pub fn truncate(&self, text: &str, max_tokens: usize) -> Result<String> {
        let tokens = self.encode(text);
        if tokens.len() <= max_tokens {
            return Ok(text.to_string());
        }
        let mut end = max_tokens;
        while end > 0 {
            match self.bpe.decode(tokens[..end].to_vec()) {
                Ok(decoded) => return Ok(decoded),
                Err(_) => end -= 1,
            }
        }
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_matches_encode_len() {
        let tok = default_tokenizer();
        let text = "The quick brown fox jumps over the lazy dog.";
        assert_eq!(tok.count(text), tok.encode(text).len());
        assert!(tok.count(text) > 0);
    }

    #[test]
    fn decode_is_encode_inverse() {
        let tok = default_tokenizer();
        let text = "Enforcement begins on 2025-01-01. Labels must be revised!";
        let decoded = tok.decode(&tok.encode(text)).unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn truncate_bounds_token_count() {
        let tok = default_tokenizer();
        let text = "one two three four five six seven eight nine ten".repeat(4);
        let truncated = tok.truncate(&text, 7).unwrap();
        assert!(tok.count(&truncated) <= 7);
        assert!(text.starts_with(&truncated));
    }

    #[test]
    fn truncate_is_identity_under_budget() {
        let tok = default_tokenizer();
        let text = "short text";
        assert_eq!(tok.truncate(text, 100).unwrap(), text);
    }

    #[test]
    fn kind_from_name() {
        assert_eq!(
            TokenizerKind::from_name("cl100k_base"),
            Some(TokenizerKind::Cl100k)
        );
        assert_eq!(TokenizerKind::from_name("o200k"), Some(TokenizerKind::O200k));
        assert_eq!(TokenizerKind::from_name("bogus"), None);
    }
}
