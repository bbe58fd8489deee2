//! Server-Sent Events parsing over a raw byte stream.
//!
//! The provider answers streaming requests with `text/event-stream`; events
//! are separated by a blank line and may be split arbitrarily across HTTP
//! chunks (including in the middle of a UTF-8 sequence). Lines may end in
//! `\r\n`, `\r` or `\n`; all three are folded to `\n` as bytes arrive.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use memchr::memmem;

use crate::provider::ProviderError;

/// Upper bound on buffered bytes for a single unterminated event.
const MAX_BUFFER_BYTES: usize = 1_000_000;

/// One parsed SSE event. Only the fields the provider uses are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
}

impl SseEvent {
    /// The provider's end-of-stream sentinel.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Stream adapter turning byte chunks into [`SseEvent`]s.
pub struct SseStream<S> {
    inner: S,
    buffer: Vec<u8>,
    events: VecDeque<SseEvent>,
    finished: bool,
    /// Last byte appended was a `\r`, so a leading `\n` in the next chunk
    /// belongs to the same line ending.
    after_cr: bool,
    /// Terminal error, yielded after any events parsed before it.
    error: Option<ProviderError>,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            events: VecDeque::new(),
            finished: false,
            after_cr: false,
            error: None,
        }
    }

    fn fail(&mut self, e: ProviderError) {
        self.buffer.clear();
        self.finished = true;
        self.error = Some(e);
    }

    /// Append `chunk`, normalising line endings to `\n`.
    fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.reserve(chunk.len());
        for &byte in chunk {
            match byte {
                b'\r' => {
                    self.buffer.push(b'\n');
                    self.after_cr = true;
                }
                b'\n' if self.after_cr => self.after_cr = false,
                _ => {
                    self.buffer.push(byte);
                    self.after_cr = false;
                }
            }
        }
    }

    /// Move every complete event out of the buffer.
    fn drain_complete(&mut self) -> Result<(), ProviderError> {
        let finder = memmem::Finder::new(b"\n\n");
        let mut start = 0;

        while let Some(pos) = finder.find(&self.buffer[start..]) {
            let end = start + pos;
            let text = decode(&self.buffer[start..end])?;
            if let Some(event) = parse_event(text) {
                self.events.push_back(event);
            }
            start = end + 2;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        Ok(())
    }
}

fn decode(bytes: &[u8]) -> Result<&str, ProviderError> {
    std::str::from_utf8(bytes)
        .map_err(|e| ProviderError::Stream(format!("invalid UTF-8 in SSE event: {e}")))
}

fn parse_event(text: &str) -> Option<SseEvent> {
    let mut event_type = None;
    let mut data = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event_type = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event_type,
        data: data.join("\n"),
    })
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<SseEvent, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if let Some(e) = self.error.take() {
                return Poll::Ready(Some(Err(e)));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    self.push_chunk(&chunk);
                    if let Err(e) = self.drain_complete() {
                        self.fail(e);
                    } else if self.buffer.len() > MAX_BUFFER_BYTES {
                        // Only the unterminated remainder counts against the cap.
                        self.fail(ProviderError::Stream(
                            "SSE buffer exceeded maximum size".to_string(),
                        ));
                    }
                }
                Some(Err(e)) => self.fail(ProviderError::Stream(e.to_string())),
                None => {
                    // Trailing event without the final blank line.
                    self.finished = true;
                    let rest = std::mem::take(&mut self.buffer);
                    match decode(&rest) {
                        Ok(text) => {
                            if let Some(event) = parse_event(text.trim()) {
                                self.events.push_back(event);
                            }
                        }
                        Err(e) => self.error = Some(e),
                    }
                }
            }
        }
    }
}

/// Adds `.sse_events()` to byte streams.
pub trait SseStreamExt: Stream + Sized {
    fn sse_events(self) -> SseStream<Self> {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}
