use bulletin_core::{Chunk, ModelLimits, Tokenizer};
use bulletin_llm::{CompletionBackend, CompletionRequest, Message, MessageSet};
use tracing::debug;

use crate::error::{EngineError, Result};

/// Fixed system instruction for document and chat dispatches.
pub const SYSTEM_INSTRUCTION: &str = "You are a helpful AI assistant. Respond directly to the \
     user without mentioning yourself in the third person or commenting on the nature of the \
     response.";

/// System instruction for the reducer's summarize-and-extract mode.
pub const EXTRACT_INSTRUCTION: &str = "You are a helpful AI assistant. Extract relevant \
     information from the provided chunk and use it to populate the sections in the \
     instructions. If information for a section is not available in the chunk, indicate it \
     with 'Not applicable'.";

const CHUNK_NOTE: &str = "Note: This is a part of a larger document. For any sections where \
     information is not available in this chunk, please write 'Information not available in \
     this chunk.'";

const USER_INPUT_MARKER: &str = "User Input:";
const ATTACHED_FILE_MARKER: &str = "Attached File Content:";

const TEMPERATURE: f32 = 0.4;
const TOP_P: f32 = 0.95;

/// Sends one chunk to the completion service with the right framing and a
/// `max_tokens` that fits the model context window.
pub struct Dispatcher<'a> {
    backend: &'a dyn CompletionBackend,
    tokenizer: &'a Tokenizer,
    limits: ModelLimits,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        backend: &'a dyn CompletionBackend,
        tokenizer: &'a Tokenizer,
        limits: ModelLimits,
    ) -> Self {
        Self {
            backend,
            tokenizer,
            limits,
        }
    }

    /// Dispatch one document chunk. Chunks beyond the first are rewritten
    /// to carry the guided instructions and the echoed user input so each
    /// chunk is interpretable on its own; chunk 1 is sent raw.
    pub async fn dispatch(
        &self,
        chunk: &Chunk,
        carried_instructions: &str,
        prior_turns: &[Message],
    ) -> Result<String> {
        let payload = if chunk.index > 1 {
            rewrite_chunk_payload(&chunk.text, carried_instructions)
        } else {
            chunk.text.clone()
        };
        debug!(index = chunk.index, total = chunk.total, "dispatching chunk");
        self.send(SYSTEM_INSTRUCTION, prior_turns, payload, chunk.index)
            .await
    }

    /// Dispatch one chunk of merged partial responses in
    /// summarize-and-extract mode: the carried instructions frame the
    /// request and the service fills in the labeled sections.
    pub async fn dispatch_extract(
        &self,
        chunk: &Chunk,
        carried_instructions: &str,
    ) -> Result<String> {
        let (guided, _) = carried_instruction_parts(carried_instructions);
        let payload = format!(
            "{guided}\n\nPlease extract relevant information from the following chunk to \
             populate the instructions provided above:\n\n{}",
            chunk.text
        );
        debug!(index = chunk.index, total = chunk.total, "dispatching extract chunk");
        self.send(EXTRACT_INSTRUCTION, &[], payload, chunk.index)
            .await
    }

    async fn send(
        &self,
        system_instruction: &str,
        prior_turns: &[Message],
        payload: String,
        chunk_index: usize,
    ) -> Result<String> {
        let mut messages: MessageSet = Vec::with_capacity(prior_turns.len() + 2);
        messages.push(Message::system(system_instruction));
        messages.extend_from_slice(prior_turns);
        messages.push(Message::user(payload));
        let (messages, max_tokens) = self.fit_output_window(messages)?;
        let request = CompletionRequest {
            messages,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            max_tokens,
        };
        self.backend
            .complete(&request)
            .await
            .map_err(|source| EngineError::Dispatch {
                index: chunk_index,
                source,
            })
    }

    /// Compute `max_tokens` for the request. When the input leaves no
    /// positive headroom the user payload (always the last message) is
    /// token-truncated until it does, and the floor-at-1 rule applies to
    /// whatever remains.
    fn fit_output_window(&self, mut messages: MessageSet) -> Result<(MessageSet, usize)> {
        let input_tokens: usize = messages
            .iter()
            .map(|m| self.tokenizer.count(&m.content))
            .sum();
        if let Some(allowance) = self.limits.output_allowance(input_tokens) {
            return Ok((messages, allowance));
        }
        let fixed: usize = messages[..messages.len() - 1]
            .iter()
            .map(|m| self.tokenizer.count(&m.content))
            .sum();
        let payload_budget = self.limits.input_budget(fixed);
        let last = messages.last_mut().expect("message set is never empty");
        last.content = self.tokenizer.truncate(&last.content, payload_budget)?;
        let input_tokens = fixed + self.tokenizer.count(&last.content);
        let allowance = self.limits.output_allowance(input_tokens).unwrap_or(1);
        debug!(payload_budget, allowance, "input truncated to restore output headroom");
        Ok((messages, allowance))
    }
}

/// Split the original prompt into the guided-instruction part (everything
/// before `User Input:`, itself cut at `Attached File Content:`) and the
/// echoed user input.
pub(crate) fn carried_instruction_parts(original: &str) -> (&str, &str) {
    let (guided, user_input) = match original.split_once(USER_INPUT_MARKER) {
        Some((before, after)) => (before, after),
        None => (original, ""),
    };
    let guided = match guided.split_once(ATTACHED_FILE_MARKER) {
        Some((before, _)) => before,
        None => guided,
    };
    (guided.trim(), user_input.trim())
}

pub(crate) fn rewrite_chunk_payload(chunk_text: &str, carried_instructions: &str) -> String {
    let (guided, user_input) = carried_instruction_parts(carried_instructions);
    format!(
        "Instructions based on the guided prompt:\n{guided}\n\n{CHUNK_NOTE}\n\n\
         User Input and/or File Content:\n{user_input}\n\nChunk content:\n{chunk_text}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_parts_split_on_markers() {
        let prompt = "Guided template here.\n\nAttached File Content:\nraw file\n\
                      User Input:\nsummarize please";
        let (guided, user_input) = carried_instruction_parts(prompt);
        assert_eq!(guided, "Guided template here.");
        assert_eq!(user_input, "summarize please");
    }

    #[test]
    fn instruction_parts_without_markers() {
        let (guided, user_input) = carried_instruction_parts("just a question");
        assert_eq!(guided, "just a question");
        assert_eq!(user_input, "");
    }

    #[test]
    fn rewritten_payload_carries_note_and_chunk() {
        let payload = rewrite_chunk_payload(
            "chunk body",
            "Template\n\nUser Input:\nthe ask\n\nAttached File Content:\nfile",
        );
        assert!(payload.starts_with("Instructions based on the guided prompt:\nTemplate"));
        assert!(payload.contains("Information not available in this chunk."));
        assert!(payload.contains("User Input and/or File Content:\nthe ask"));
        assert!(payload.ends_with("Chunk content:\nchunk body"));
    }
}
