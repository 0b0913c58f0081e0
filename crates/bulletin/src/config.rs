use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};
use bulletin_core::{ModelLimits, TokenizerKind};
use bulletin_llm::HttpCompletionClient;

#[derive(Debug, Clone)]
pub struct BulletinConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub tokenizer: TokenizerKind,
    pub limits: ModelLimits,
    pub chunk_budget_cap: Option<usize>,
    pub history_budget: usize,
    pub workers: usize,
    pub timeout: Duration,
}

impl BulletinConfig {
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("BULLETIN_BASE_URL")
            .map_err(|_| anyhow!("BULLETIN_BASE_URL is not set"))?;
        let api_key =
            env::var("BULLETIN_API_KEY").map_err(|_| anyhow!("BULLETIN_API_KEY is not set"))?;
        let model =
            env::var("BULLETIN_MODEL").unwrap_or_else(|_| "llama-3-8b-instruct".to_string());
        let tokenizer = match env::var("BULLETIN_TOKENIZER") {
            Ok(name) => TokenizerKind::from_name(&name)
                .ok_or_else(|| anyhow!(format!("unknown tokenizer {name}")))?,
            Err(_) => TokenizerKind::default(),
        };
        let defaults = ModelLimits::default();
        let limits = ModelLimits {
            context_window: env_usize("BULLETIN_CONTEXT_WINDOW", defaults.context_window),
            max_output_tokens: env_usize("BULLETIN_MAX_OUTPUT_TOKENS", defaults.max_output_tokens),
            safety_buffer: env_usize("BULLETIN_SAFETY_BUFFER", defaults.safety_buffer),
        };
        let chunk_budget_cap = env::var("BULLETIN_CHUNK_BUDGET")
            .ok()
            .and_then(|v| v.parse().ok());
        let history_budget = env_usize("BULLETIN_HISTORY_BUDGET", 3000);
        let workers = env_usize("BULLETIN_WORKERS", 8);
        let timeout = Duration::from_secs(env_usize("BULLETIN_TIMEOUT_SECS", 120) as u64);
        Ok(Self {
            base_url,
            api_key,
            model,
            tokenizer,
            limits,
            chunk_budget_cap,
            history_budget,
            workers,
            timeout,
        })
    }

    pub fn client(&self) -> HttpCompletionClient {
        HttpCompletionClient::new(&self.base_url, &self.api_key, &self.model)
            .with_timeout(self.timeout)
    }

    pub fn session(&self) -> bulletin_engine::Session {
        let mut session = bulletin_engine::Session::new(self.limits)
            .with_history_budget(self.history_budget)
            .with_workers(self.workers);
        if let Some(cap) = self.chunk_budget_cap {
            session = session.with_chunk_budget_cap(cap);
        }
        session
    }
}

fn env_usize(var: &str, default: usize) -> usize {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
