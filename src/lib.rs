//! chat-relay: minimal chat backend for a hosted LLM.
//!
//! Forwards user text to an Azure OpenAI chat deployment through a single
//! stateless agent and relays the answer either in one piece or as a stream
//! of text deltas.

pub mod config;
pub mod generator;
pub mod provider;
pub mod server;
