use std::fs;
use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use async_trait::async_trait;
use bulletin_engine::{EngineError, Retriever};
use tokio::runtime::Runtime;

use crate::config::BulletinConfig;
use crate::logging;

/// Retriever over a single attached document: the whole text stands in for
/// the top-k excerpt, and the context assembler trims it to budget. A
/// ranking model can be swapped in behind the same trait.
struct AttachedDocument {
    text: String,
}

#[async_trait]
impl Retriever for AttachedDocument {
    async fn top_k_relevant(&self, _query: &str, _k: usize) -> Result<String, EngineError> {
        Ok(self.text.clone())
    }
}

pub fn run(attach: Option<String>) -> Result<()> {
    let config = BulletinConfig::from_env()?;
    let tokenizer = config.tokenizer.build()?;
    let retriever = match attach {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read attached file {path}"))?;
            logging::stage("chat", format!("attached {path} ({} bytes)", text.len()));
            Some(AttachedDocument { text })
        }
        None => None,
    };
    let client = config.client();
    let mut session = config.session();
    let runtime = Runtime::new().context("failed to start tokio runtime")?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if matches!(prompt, "exit" | "quit") {
            break;
        }
        logging::verbose(format!("turn prompt: {} chars", prompt.len()));
        let turn = runtime.block_on(async {
            let excerpt = match &retriever {
                Some(retriever) => Some(retriever.top_k_relevant(prompt, 1).await?),
                None => None,
            };
            session
                .answer(&client, &tokenizer, prompt, excerpt.as_deref())
                .await
        });
        match turn {
            Ok(reply) => println!("{reply}\n"),
            Err(err) => logging::info(format!("turn failed: {err}")),
        }
    }
    Ok(())
}
