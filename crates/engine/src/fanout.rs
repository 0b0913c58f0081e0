use std::sync::Arc;

use bulletin_core::Chunk;
use bulletin_llm::Message;
use tokio::sync::Semaphore;

use crate::dispatch::Dispatcher;
use crate::error::EngineError;

/// One worker's output for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialResponse {
    pub chunk_index: usize,
    pub text: String,
}

/// How each chunk is framed when fanned out.
#[derive(Clone, Copy)]
pub enum FanoutMode<'a> {
    /// Document chunks: carried instructions + prior conversation turns.
    Document { prior_turns: &'a [Message] },
    /// Reducer chunks: summarize-and-extract framing.
    Extract,
}

/// Dispatch every chunk concurrently, bounded by `workers` in-flight
/// requests, and return results in chunk index order regardless of
/// completion order. A failed chunk surfaces as an error entry at its own
/// index and does not cancel its siblings.
pub async fn dispatch_all(
    dispatcher: &Dispatcher<'_>,
    chunks: &[Chunk],
    carried_instructions: &str,
    mode: FanoutMode<'_>,
    workers: usize,
) -> Vec<Result<PartialResponse, EngineError>> {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let dispatches = chunks.iter().map(|chunk| {
        let semaphore = Arc::clone(&semaphore);
        async move {
            let _permit = semaphore
                .acquire()
                .await
                .expect("fanout semaphore is never closed");
            let text = match mode {
                FanoutMode::Document { prior_turns } => {
                    dispatcher
                        .dispatch(chunk, carried_instructions, prior_turns)
                        .await?
                }
                FanoutMode::Extract => {
                    dispatcher.dispatch_extract(chunk, carried_instructions).await?
                }
            };
            Ok(PartialResponse {
                chunk_index: chunk.index,
                text,
            })
        }
    });
    // join_all yields results in the order the futures were supplied, which
    // is chunk index order, independent of completion order.
    futures::future::join_all(dispatches).await
}
