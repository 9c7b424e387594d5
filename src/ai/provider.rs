//! Provider seams
//!
//! The indexer and the context assembler only see these traits, so tests
//! can swap the HTTP client for an in-process fake.

use serde::{Deserialize, Serialize};

use super::error::ProviderError;

/// Message role in a chat completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role-tagged message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Turns text into a fixed-length vector
#[allow(async_fn_in_trait)]
pub trait EmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Generates a reply for an ordered list of messages
#[allow(async_fn_in_trait)]
pub trait CompletionProvider {
    async fn complete(&self, messages: &[Message]) -> Result<String, ProviderError>;
}

#[cfg(test)]
pub mod fake {
    //! In-process providers for tests

    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    use super::*;

    /// Embeds by looking the text up in a table; unknown text is rejected
    /// as an invalid request.
    #[derive(Default)]
    pub struct FakeEmbedder {
        pub vectors: HashMap<String, Vec<f32>>,
        /// Errors handed out before any lookups, in order
        pub queued_errors: RefCell<VecDeque<ProviderError>>,
        pub calls: RefCell<Vec<String>>,
    }

    impl FakeEmbedder {
        pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.vectors.insert(text.to_string(), vector);
            self
        }

        pub fn fail_next(self, error: ProviderError) -> Self {
            self.queued_errors.borrow_mut().push_back(error);
            self
        }
    }

    impl EmbeddingProvider for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            self.calls.borrow_mut().push(text.to_string());
            if let Some(err) = self.queued_errors.borrow_mut().pop_front() {
                return Err(err);
            }
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| ProviderError::RequestInvalid {
                    status: 400,
                    message: format!("no fake vector for {text:?}"),
                })
        }
    }

    /// Replies with a canned answer and records what it was sent
    pub struct FakeCompleter {
        pub reply: String,
        pub received: RefCell<Vec<Message>>,
    }

    impl FakeCompleter {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                received: RefCell::new(Vec::new()),
            }
        }
    }

    impl CompletionProvider for FakeCompleter {
        async fn complete(&self, messages: &[Message]) -> Result<String, ProviderError> {
            self.received.borrow_mut().extend_from_slice(messages);
            Ok(self.reply.clone())
        }
    }
}
