//! Response generator: relays one provider stream as a sequence of fragments.
//!
//! `generate` does the fallible setup inline (open the session, start the
//! upstream request) and then hands the event stream to a spawned fetch
//! task. The task forwards text deltas through a capacity-1 channel, so the
//! consumer's read pace is the only backpressure. The session is wrapped in
//! a [`SessionGuard`] and closed exactly once, on whichever path the
//! generation ends: completion, provider failure, or the consumer dropping
//! the stream.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::Stream;
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::generator::agent::Agent;
use crate::provider::{EventStream, Provider, ProviderError, ProviderSession, StreamEvent};

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Failed to open provider session: {0}")]
    Connect(#[source] ProviderError),

    #[error("Failed to start generation: {0}")]
    Start(#[source] ProviderError),

    #[error("Generation failed mid-stream: {0}")]
    Stream(#[source] ProviderError),
}

/// One incremental piece of generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub delta: Option<String>,
}

impl Fragment {
    pub fn new(delta: impl Into<String>) -> Self {
        Self {
            delta: Some(delta.into()),
        }
    }

    /// The delta, if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.delta.as_deref().filter(|d| !d.is_empty())
    }

    pub fn into_text(self) -> Option<String> {
        self.delta.filter(|d| !d.is_empty())
    }
}

/// Closes the wrapped session when dropped.
struct SessionGuard {
    session: Box<dyn ProviderSession>,
}

impl SessionGuard {
    fn new(session: Box<dyn ProviderSession>) -> Self {
        Self { session }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
    }
}

/// Lazy, finite, non-restartable sequence of fragments for one generation.
///
/// A provider failure after the stream started arrives as a final `Err`.
/// Dropping the stream cancels the generation and releases the session.
pub struct FragmentStream {
    inner: ReceiverStream<Result<Fragment, GenerateError>>,
}

impl FragmentStream {
    fn new(rx: mpsc::Receiver<Result<Fragment, GenerateError>>) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
        }
    }

    /// Drain the stream, concatenating non-empty deltas in order.
    pub async fn collect_text(mut self) -> Result<String, GenerateError> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            if let Some(delta) = fragment?.text() {
                text.push_str(delta);
            }
        }
        Ok(text)
    }
}

impl Stream for FragmentStream {
    type Item = Result<Fragment, GenerateError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Generates responses through a single stateless agent.
pub struct ResponseGenerator {
    provider: Arc<dyn Provider>,
    agent: Agent,
}

impl ResponseGenerator {
    pub fn new(provider: Arc<dyn Provider>, agent: Agent) -> Self {
        Self { provider, agent }
    }

    /// Start a generation for `input`.
    ///
    /// Opens one provider session and submits the input in streaming mode.
    /// Errors returned here happen before any fragment exists; the session,
    /// if it was opened, is already closed.
    pub async fn generate(&self, input: &str) -> Result<FragmentStream, GenerateError> {
        let session = self
            .provider
            .connect()
            .await
            .map_err(GenerateError::Connect)?;
        let mut guard = SessionGuard::new(session);

        let request = self.agent.request_for(input);
        let events = guard
            .session
            .stream_chat(request)
            .await
            .map_err(GenerateError::Start)?;

        debug!(agent = self.agent.name(), chars = input.len(), "Generation started");

        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(relay(guard, events, tx));

        Ok(FragmentStream::new(rx))
    }
}

/// Fetch task: forward provider events until the stream ends, fails, or the
/// consumer goes away.
async fn relay(
    guard: SessionGuard,
    mut events: EventStream,
    tx: mpsc::Sender<Result<Fragment, GenerateError>>,
) {
    let mut fragments = 0usize;

    loop {
        let next = tokio::select! {
            next = events.next() => next,
            _ = tx.closed() => {
                debug!(fragments, "Consumer dropped, cancelling generation");
                break;
            }
        };

        match next {
            Some(Ok(StreamEvent::TextDelta(delta))) => {
                fragments += 1;
                if tx.send(Ok(Fragment { delta })).await.is_err() {
                    debug!(fragments, "Consumer dropped, cancelling generation");
                    break;
                }
            }
            Some(Ok(StreamEvent::Finished { reason })) => {
                debug!(reason, "Provider finished choice");
            }
            Some(Err(e)) => {
                warn!(error = %e, fragments, "Provider stream failed");
                let _ = tx.send(Err(GenerateError::Stream(e))).await;
                break;
            }
            None => break,
        }
    }

    drop(events);
    drop(guard);
    debug!(fragments, "Generation complete");
}
