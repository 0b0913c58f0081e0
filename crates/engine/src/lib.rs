mod context;
mod dispatch;
mod error;
mod fanout;
mod reduce;
mod retrieve;
mod session;

pub use context::assemble_context;
pub use dispatch::{Dispatcher, EXTRACT_INSTRUCTION, SYSTEM_INSTRUCTION};
pub use error::{EngineError, Result};
pub use fanout::{dispatch_all, FanoutMode, PartialResponse};
pub use reduce::{reduce, Reduction, MAX_REDUCE_PASSES};
pub use retrieve::Retriever;
pub use session::Session;
