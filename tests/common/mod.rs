//! Shared test doubles.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use chat_relay::config::AgentConfig;
use chat_relay::generator::agent::Agent;
use chat_relay::generator::engine::ResponseGenerator;
use chat_relay::provider::{
    ChatRequest, EventStream, Provider, ProviderError, ProviderSession, StreamEvent,
};
use chat_relay::server::chat_api::{build_router, AppState};

/// One scripted provider event.
#[derive(Debug, Clone)]
pub enum Step {
    Delta(Option<&'static str>),
    Finish,
    Fail,
}

/// Provider replaying a fixed script and counting session lifecycle calls.
#[derive(Default)]
pub struct ScriptedProvider {
    pub steps: Vec<Step>,
    pub fail_connect: bool,
    pub fail_start: bool,
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            ..Default::default()
        }
    }

    pub fn deltas(deltas: &[Option<&'static str>]) -> Self {
        Self::new(deltas.iter().copied().map(Step::Delta).collect())
    }
}

struct ScriptedSession {
    steps: Vec<Step>,
    fail_start: bool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn connect(&self) -> Result<Box<dyn ProviderSession>, ProviderError> {
        if self.fail_connect {
            return Err(ProviderError::MissingConfig("endpoint"));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            steps: self.steps.clone(),
            fail_start: self.fail_start,
            closes: self.closes.clone(),
        }))
    }
}

#[async_trait]
impl ProviderSession for ScriptedSession {
    async fn stream_chat(&mut self, _request: ChatRequest) -> Result<EventStream, ProviderError> {
        if self.fail_start {
            return Err(ProviderError::Status {
                status: 401,
                message: "Access denied due to invalid subscription key".to_string(),
            });
        }
        let items: Vec<Result<StreamEvent, ProviderError>> = self
            .steps
            .iter()
            .map(|step| match step {
                Step::Delta(d) => Ok(StreamEvent::TextDelta(d.map(str::to_string))),
                Step::Finish => Ok(StreamEvent::Finished {
                    reason: "stop".to_string(),
                }),
                Step::Fail => Err(ProviderError::Stream("connection reset".to_string())),
            })
            .collect();
        Ok(stream::iter(items).boxed())
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn router_with(provider: impl Provider + 'static) -> axum::Router {
    let generator = ResponseGenerator::new(Arc::new(provider), Agent::new(&AgentConfig::default()));
    build_router(Arc::new(AppState::new(generator)))
}

/// Wait until `counter` reaches `expected`; the fetch task may still be
/// winding down when the response has been read.
pub async fn wait_for(counter: &AtomicUsize, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while counter.load(Ordering::SeqCst) < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("counter did not reach expected value");
}
