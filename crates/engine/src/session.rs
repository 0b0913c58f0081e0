use bulletin_core::{split_chunks, ModelLimits, Tokenizer};
use bulletin_llm::{CompletionBackend, Message};
use tracing::{info, warn};

use crate::context::assemble_context;
use crate::dispatch::{Dispatcher, SYSTEM_INSTRUCTION};
use crate::error::{EngineError, Result};
use crate::fanout::{dispatch_all, FanoutMode};
use crate::reduce::reduce;

const DEFAULT_HISTORY_BUDGET: usize = 3000;
const DEFAULT_WORKERS: usize = 8;

/// One conversation. Owns its append-only history; there is no ambient
/// session state anywhere else. History is only appended after a turn
/// fully succeeds, so dropping a turn mid-flight leaves it untouched.
#[derive(Debug, Clone)]
pub struct Session {
    history: Vec<Message>,
    limits: ModelLimits,
    history_budget: usize,
    chunk_budget_cap: Option<usize>,
    workers: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ModelLimits::default())
    }
}

impl Session {
    pub fn new(limits: ModelLimits) -> Self {
        Self {
            history: Vec::new(),
            limits,
            history_budget: DEFAULT_HISTORY_BUDGET,
            chunk_budget_cap: None,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_history_budget(mut self, budget: usize) -> Self {
        self.history_budget = budget;
        self
    }

    pub fn with_chunk_budget_cap(mut self, cap: usize) -> Self {
        self.chunk_budget_cap = Some(cap);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Answer one turn: chunk the prompt against the derived budget, then
    /// either dispatch the single chunk directly or fan out and reduce.
    /// The prompt doubles as the carried instructions for chunks beyond
    /// the first and for the reduction passes.
    pub async fn answer(
        &mut self,
        backend: &dyn CompletionBackend,
        tokenizer: &Tokenizer,
        user_prompt: &str,
        retrieved_excerpt: Option<&str>,
    ) -> Result<String> {
        let dispatcher = Dispatcher::new(backend, tokenizer, self.limits);
        let mut chunk_budget = self
            .limits
            .chunk_budget(tokenizer.count(SYSTEM_INSTRUCTION))?;
        if let Some(cap) = self.chunk_budget_cap {
            chunk_budget = chunk_budget.min(cap.max(1));
        }
        let prior_turns = assemble_context(
            &self.history,
            retrieved_excerpt,
            self.history_budget,
            tokenizer,
        )?;
        let chunks = split_chunks(user_prompt, chunk_budget, tokenizer)?;
        let reply = match chunks.len() {
            0 => return Err(EngineError::EmptyPrompt),
            1 => {
                dispatcher
                    .dispatch(&chunks[0], user_prompt, &prior_turns)
                    .await?
            }
            n => {
                info!(chunks = n, chunk_budget, "prompt split for parallel dispatch");
                let results = dispatch_all(
                    &dispatcher,
                    &chunks,
                    user_prompt,
                    FanoutMode::Document {
                        prior_turns: &prior_turns,
                    },
                    self.workers,
                )
                .await;
                let total = results.len();
                let mut partials = Vec::with_capacity(total);
                let mut first_failure: Option<EngineError> = None;
                for result in results {
                    match result {
                        Ok(partial) => partials.push(partial.text),
                        Err(err) => {
                            warn!(%err, "chunk dispatch failed, continuing with siblings");
                            first_failure.get_or_insert(err);
                        }
                    }
                }
                if partials.is_empty() {
                    let first = first_failure
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "no chunks produced".to_string());
                    return Err(EngineError::AllChunksFailed { total, first });
                }
                let reduction = reduce(
                    &dispatcher,
                    partials,
                    user_prompt,
                    chunk_budget,
                    tokenizer,
                    self.workers,
                )
                .await?;
                if !reduction.converged {
                    warn!(
                        passes = reduction.passes,
                        "returning best-effort reduction for this turn"
                    );
                }
                reduction.text
            }
        };
        self.history.push(Message::user(user_prompt));
        self.history.push(Message::assistant(reply.clone()));
        Ok(reply)
    }
}
