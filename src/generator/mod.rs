//! Response generation.
//!
//! - [`agent`]: The stateless agent that shapes provider requests
//! - [`engine`]: Session lifecycle and fragment relay

pub mod agent;
pub mod engine;
