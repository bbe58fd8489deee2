//! HTTP server for the chat API.
//!
//! - [`chat_api`]: Request/response types and route handlers
//! - [`streaming`]: Chunked body streaming for incremental responses

pub mod chat_api;
pub mod streaming;
