use bulletin_core::{split_chunks, Chunk, FieldMap, Tokenizer};
use tracing::{debug, warn};

use crate::dispatch::Dispatcher;
use crate::error::{EngineError, Result};
use crate::fanout::{dispatch_all, FanoutMode};

/// Upper bound on merge-and-shrink passes. Each pass is expected to shrink
/// the text because placeholder fields are dropped; when it does not, the
/// best-effort merge is returned instead of recursing forever.
pub const MAX_REDUCE_PASSES: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub text: String,
    /// False when the depth cap or a stalled pass cut the reduction short;
    /// the text is then a best-effort merge, not a synthesis output.
    pub converged: bool,
    pub passes: usize,
}

/// Fold partial responses into one bounded response.
///
/// While the blank-line concatenation exceeds `budget`, it is re-chunked,
/// each chunk is sent through summarize-and-extract mode in parallel, and
/// the field-labeled outputs are merged with placeholder suppression. Once
/// the text fits, a final synthesis pass framed by the carried
/// instructions produces the returned answer.
pub async fn reduce(
    dispatcher: &Dispatcher<'_>,
    partials: Vec<String>,
    carried_instructions: &str,
    budget: usize,
    tokenizer: &Tokenizer,
    workers: usize,
) -> Result<Reduction> {
    let mut merged = partials.join("\n\n");
    for pass in 0..MAX_REDUCE_PASSES {
        let merged_tokens = tokenizer.count(&merged);
        if merged_tokens <= budget {
            let synthesis = Chunk::whole(merged, tokenizer);
            let text = dispatcher
                .dispatch_extract(&synthesis, carried_instructions)
                .await?;
            return Ok(Reduction {
                text,
                converged: true,
                passes: pass + 1,
            });
        }
        debug!(pass, merged_tokens, budget, "merged text over budget, re-chunking");
        let chunks = split_chunks(&merged, budget, tokenizer)?;
        let results = dispatch_all(
            dispatcher,
            &chunks,
            carried_instructions,
            FanoutMode::Extract,
            workers,
        )
        .await;
        let total = results.len();
        let mut fields = FieldMap::new();
        let mut first_failure: Option<EngineError> = None;
        let mut failures = 0usize;
        for result in results {
            match result {
                Ok(partial) => fields.absorb(&partial.text),
                Err(err) => {
                    warn!(%err, "reduce chunk failed, continuing with siblings");
                    failures += 1;
                    first_failure.get_or_insert(err);
                }
            }
        }
        if failures == total {
            let first = first_failure
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no chunks produced".to_string());
            return Err(EngineError::AllChunksFailed { total, first });
        }
        let next = fields.render();
        if next.trim().is_empty() {
            // Every contribution was a placeholder; nothing left to say.
            return Ok(Reduction {
                text: next,
                converged: true,
                passes: pass + 1,
            });
        }
        if tokenizer.count(&next) >= merged_tokens {
            warn!(pass, "reduction stalled, returning best-effort merge");
            return Ok(Reduction {
                text: next,
                converged: false,
                passes: pass + 1,
            });
        }
        merged = next;
    }
    warn!(
        passes = MAX_REDUCE_PASSES,
        "reduction pass cap reached, returning best-effort merge"
    );
    Ok(Reduction {
        text: merged,
        converged: false,
        passes: MAX_REDUCE_PASSES,
    })
}
