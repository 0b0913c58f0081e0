use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("invalid token budget: {0}")]
    Budget(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
