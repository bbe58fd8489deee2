//! Azure OpenAI chat-completions client.
//!
//! Each session builds its own `reqwest::Client` and drops it on close.
//! Requests go to
//! `{endpoint}/openai/deployments/{model}/chat/completions?api-version={version}`
//! with `stream: true`; the SSE body carries `chat.completion.chunk`
//! objects terminated by `data: [DONE]`.

use async_trait::async_trait;
use futures::future;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::provider::sse::SseStreamExt;
use crate::provider::{
    ChatMessage, ChatRequest, EventStream, Provider, ProviderError, ProviderSession, StreamEvent,
};

/// Provider backed by an Azure OpenAI deployment.
pub struct AzureOpenAiProvider {
    config: ProviderConfig,
}

impl AzureOpenAiProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Provider for AzureOpenAiProvider {
    async fn connect(&self) -> Result<Box<dyn ProviderSession>, ProviderError> {
        let endpoint = required(&self.config.endpoint, "endpoint")?;
        let api_key = required(&self.config.api_key, "api_key")?;
        let model = required(&self.config.model, "model")?;
        let api_version = required(&self.config.api_version, "api_version")?;

        let client = reqwest::Client::builder().build()?;
        let url = format!(
            "{}/openai/deployments/{}/chat/completions",
            endpoint.trim_end_matches('/'),
            model
        );

        debug!(url, "Opened provider session");
        Ok(Box::new(AzureSession {
            client: Some(client),
            url,
            api_key: api_key.to_string(),
            api_version: api_version.to_string(),
        }))
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ProviderError> {
    value.as_deref().ok_or(ProviderError::MissingConfig(name))
}

/// One open connection to the deployment.
pub struct AzureSession {
    client: Option<reqwest::Client>,
    url: String,
    api_key: String,
    api_version: String,
}

// ─── Wire Types ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CompletionRequestBody<'a> {
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Flatten one chunk into events. Azure opens with a chunk carrying no
/// choices (content-filter results); that yields nothing.
fn chunk_events(chunk: ChatCompletionChunk) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for choice in chunk.choices {
        match choice.finish_reason {
            Some(reason) => {
                if choice.delta.content.is_some() {
                    events.push(StreamEvent::TextDelta(choice.delta.content));
                }
                events.push(StreamEvent::Finished { reason });
            }
            None => events.push(StreamEvent::TextDelta(choice.delta.content)),
        }
    }
    events
}

#[async_trait]
impl ProviderSession for AzureSession {
    async fn stream_chat(&mut self, request: ChatRequest) -> Result<EventStream, ProviderError> {
        let client = self.client.as_ref().ok_or(ProviderError::Closed)?;

        let response = client
            .post(&self.url)
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
            .json(&CompletionRequestBody {
                messages: &request.messages,
                stream: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let events = Box::pin(response.bytes_stream())
            .sse_events()
            .take_while(|item| future::ready(!matches!(item, Ok(event) if event.is_done())))
            .map(|item| {
                item.and_then(|event| {
                    serde_json::from_str::<ChatCompletionChunk>(&event.data)
                        .map_err(ProviderError::from)
                })
            })
            .flat_map(|item| {
                let batch: Vec<Result<StreamEvent, ProviderError>> = match item {
                    Ok(chunk) => chunk_events(chunk).into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                };
                stream::iter(batch)
            });

        Ok(events.boxed())
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            debug!(url = self.url, "Closed provider session");
        }
    }
}
