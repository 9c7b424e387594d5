//! Embedding and completion providers, and question answering on top of them

pub mod context;
pub mod error;
pub mod openai;
pub mod provider;
pub mod retry;

pub use context::{save_response, Answer, ContextAssembler};
pub use openai::OpenAiClient;
