//! The single stateless conversational agent.

use crate::config::AgentConfig;
use crate::provider::{ChatMessage, ChatRequest};

/// A named persona with fixed instructions and no callable tools.
///
/// Agents carry no conversation state: every call to [`Agent::request_for`]
/// produces a fresh two-message conversation.
#[derive(Debug, Clone)]
pub struct Agent {
    name: String,
    instructions: String,
}

impl Agent {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            name: config.name.clone(),
            instructions: config.instructions.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build the provider request for one user turn.
    pub fn request_for(&self, input: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![
                ChatMessage::system(self.instructions.as_str()),
                ChatMessage::user(input),
            ],
        }
    }
}
