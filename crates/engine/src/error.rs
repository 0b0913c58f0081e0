use bulletin_core::CoreError;
use bulletin_llm::ServiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("chunk {index} dispatch failed: {source}")]
    Dispatch {
        index: usize,
        #[source]
        source: ServiceError,
    },
    #[error("all {total} chunk dispatches failed, first: {first}")]
    AllChunksFailed { total: usize, first: String },
    #[error("nothing to answer: the prompt is empty")]
    EmptyPrompt,
    #[error("retrieval failed: {0}")]
    Retrieval(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
