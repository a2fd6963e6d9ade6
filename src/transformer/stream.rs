//! Streaming response relay.
//!
//! The upstream delivers an event-stream as arbitrary byte chunks. A chunk
//! may end mid-line or even mid-codepoint, so the relay keeps raw bytes until
//! a newline arrives, and only then decodes and inspects the line:
//!
//! ```text
//! chunk → [buffer] → complete line → "data: " payload → StreamEvent
//!                                         ├─ "[DONE]"         → Done
//!                                         ├─ {"error": ..}    → Error
//!                                         ├─ delta.content    → Content
//!                                         └─ anything else    → skipped
//! ```
//!
//! Once a terminal event (`Done` or `Error`) has been produced the relay
//! ignores all further input.

use super::response::extract_error_message;
use serde_json::{json, Value};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Message used when a stream fails without a usable description.
pub const STREAM_FAILED_MESSAGE: &str = "Stream interrupted";

/// Simplified event emitted to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Content(String),
    Error(String),
    Done,
}

impl StreamEvent {
    /// Wire form of this event, including the blank-line terminator.
    pub fn to_sse(&self) -> String {
        match self {
            StreamEvent::Content(text) => format!("data: {}\n\n", json!({ "content": text })),
            StreamEvent::Error(message) => format!("data: {}\n\n", json!({ "error": message })),
            StreamEvent::Done => format!("data: {}\n\n", DONE_SENTINEL),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Content(_))
    }
}

/// Relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Waiting for a complete line.
    AwaitingLine,
    /// Draining buffered complete lines.
    Emit,
    /// A terminal event has been produced.
    Done,
}

/// Reassembles upstream lines and maps them onto [`StreamEvent`]s.
#[derive(Debug)]
pub struct StreamRelay {
    buffer: Vec<u8>,
    state: RelayState,
    fragments: usize,
}

impl StreamRelay {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            state: RelayState::AwaitingLine,
            fragments: 0,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == RelayState::Done
    }

    /// Number of content fragments emitted so far.
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Feed one upstream chunk; returns the events completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.is_done() {
            return Vec::new();
        }

        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            self.state = RelayState::Emit;
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(event) = self.process_line(&line[..line.len() - 1]) {
                events.push(event);
            }
            if self.is_done() {
                self.buffer.clear();
                return events;
            }
        }

        self.state = RelayState::AwaitingLine;
        events
    }

    /// Upstream reached end of body. Flushes any unterminated final line and
    /// guarantees a terminal event.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.is_done() {
            return Vec::new();
        }

        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            self.state = RelayState::Emit;
            let line = std::mem::take(&mut self.buffer);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        if !self.is_done() {
            self.state = RelayState::Done;
            events.push(StreamEvent::Done);
        }
        events
    }

    /// The upstream read failed. Produces a single error event unless the
    /// stream has already terminated.
    pub fn fail(&mut self, message: impl Into<String>) -> Option<StreamEvent> {
        if self.is_done() {
            return None;
        }
        self.buffer.clear();
        self.state = RelayState::Done;
        Some(StreamEvent::Error(message.into()))
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<StreamEvent> {
        let decoded = String::from_utf8_lossy(raw);
        let line = decoded.strip_suffix('\r').unwrap_or(&decoded);

        let payload = line.strip_prefix(DATA_PREFIX)?;
        let payload = payload.strip_prefix(' ').unwrap_or(payload).trim();

        if payload == DONE_SENTINEL {
            self.state = RelayState::Done;
            return Some(StreamEvent::Done);
        }

        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed stream frame");
                return None;
            }
        };

        if value.get("error").is_some_and(|e| !e.is_null()) {
            let message =
                extract_error_message(&value).unwrap_or_else(|| STREAM_FAILED_MESSAGE.to_string());
            tracing::warn!(error = %message, "Upstream reported an in-band stream error");
            self.state = RelayState::Done;
            return Some(StreamEvent::Error(message));
        }

        let fragment = value
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("delta"))
            .and_then(|delta| delta.get("content"))
            .and_then(|content| content.as_str())
            .filter(|content| !content.is_empty())?;

        self.fragments += 1;
        Some(StreamEvent::Content(fragment.to_string()))
    }
}

impl Default for StreamRelay {
    fn default() -> Self {
        Self::new()
    }
}
