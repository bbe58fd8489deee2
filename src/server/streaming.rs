//! Chunked body streaming for `/api/message_stream`.
//!
//! The body is the raw concatenation of non-empty deltas, one HTTP chunk per
//! fragment. Status and headers are committed before the first chunk, so a
//! provider failure mid-stream is logged and the body simply ends.

use std::convert::Infallible;

use bytes::Bytes;
use futures::stream::Stream;
use tokio_stream::StreamExt;
use tracing::error;

use crate::generator::engine::FragmentStream;

/// Media type of the streamed response.
pub const STREAM_CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";

/// Convert a fragment stream into body chunks.
pub fn fragments_to_body_stream(
    fragments: FragmentStream,
    request_id: String,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    fragments
        .map_while(move |item| match item {
            Ok(fragment) => Some(fragment),
            Err(e) => {
                error!(request_id = %request_id, error = %e, "Error processing message, truncating stream");
                None
            }
        })
        .filter_map(|fragment| fragment.into_text().map(|text| Ok(Bytes::from(text))))
}
