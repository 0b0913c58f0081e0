use async_trait::async_trait;

use crate::error::Result;

/// External retrieval capability: given a query, return the most relevant
/// excerpt of an attached corpus. The engine only consumes the returned
/// text (it becomes the assembler's system excerpt); ranking internals
/// live behind this seam.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn top_k_relevant(&self, query: &str, k: usize) -> Result<String>;
}
