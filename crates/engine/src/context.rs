use bulletin_core::Tokenizer;
use bulletin_llm::{Message, MessageSet};

use crate::error::Result;

const EXCERPT_PREFIX: &str = "Relevant Content from File:\n";

/// Build the bounded message set for one turn.
///
/// A retrieved excerpt, when present, goes first as a system message and
/// takes absolute priority: if it alone saturates the budget it is
/// token-truncated to fit and no history is appended. Otherwise history is
/// walked newest to oldest while the tally stays within budget; the first
/// message that would overflow is truncated to the remaining allowance and
/// included, and nothing older is considered. The result is returned in
/// chronological order and never exceeds `budget` content tokens.
pub fn assemble_context(
    history: &[Message],
    retrieved_excerpt: Option<&str>,
    budget: usize,
    tokenizer: &Tokenizer,
) -> Result<MessageSet> {
    let mut assembled = Vec::new();
    let mut used = 0usize;

    if let Some(excerpt) = retrieved_excerpt.filter(|e| !e.trim().is_empty()) {
        let content = format!("{EXCERPT_PREFIX}{excerpt}");
        let content_tokens = tokenizer.count(&content);
        if content_tokens > budget {
            let truncated = tokenizer.truncate(&content, budget)?;
            return Ok(vec![Message::system(truncated)]);
        }
        used += content_tokens;
        assembled.push(Message::system(content));
    }

    let mut recent = Vec::new();
    for message in history.iter().rev() {
        let message_tokens = tokenizer.count(&message.content);
        if used + message_tokens > budget {
            let allowance = budget - used;
            if allowance > 0 {
                let truncated = tokenizer.truncate(&message.content, allowance)?;
                if !truncated.is_empty() {
                    used += tokenizer.count(&truncated);
                    recent.push(Message {
                        role: message.role,
                        content: truncated,
                    });
                }
            }
            break;
        }
        used += message_tokens;
        recent.push(message.clone());
    }
    assembled.extend(recent.into_iter().rev());
    Ok(assembled)
}
