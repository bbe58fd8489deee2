//! Upstream chat-completion provider.
//!
//! - [`azure`]: Azure OpenAI streaming client
//! - [`sse`]: Server-Sent Events parser used by the client
//!
//! A [`Provider`] hands out one [`ProviderSession`] per generation. The
//! session owns the connection to the hosted model and must be closed
//! exactly once when the generation is over.

pub mod azure;
pub mod sse;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Missing provider configuration: {0}")]
    MissingConfig(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed stream event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Session already closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
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

/// A single streamed chat-completion call. The model is fixed by the
/// session, so only the conversation travels here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

/// Events emitted by a provider stream, in the order received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental output text. `None` for role-only or empty chunks.
    TextDelta(Option<String>),
    /// The provider finished the choice.
    Finished { reason: String },
}

pub type EventStream = BoxStream<'static, Result<StreamEvent, ProviderError>>;

/// Opens provider sessions.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ProviderSession>, ProviderError>;
}

/// A live connection to the provider, owned by one generation.
#[async_trait]
pub trait ProviderSession: Send {
    /// Submit `request` in streaming mode. Fails if the upstream call
    /// cannot be started; later failures arrive as stream items.
    async fn stream_chat(&mut self, request: ChatRequest) -> Result<EventStream, ProviderError>;

    /// Release the connection.
    fn close(&mut self);
}
