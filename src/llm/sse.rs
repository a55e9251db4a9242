//! Incremental server-sent-events frame decoder.
//!
//! The wire format groups lines into events separated by a blank line;
//! each event carries zero or more `data:` lines and an optional
//! `event:` line. Decoding is modeled as a small explicit state machine
//! over a byte buffer so partial-frame handling and truncation detection
//! are testable without any networking.

use crate::core::errors::ApiError;

/// One complete wire event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    /// `data:` line values concatenated in source order. Token text is
    /// reconstructed by plain concatenation; no separator is inserted.
    pub data: String,
}

enum DecoderState {
    AwaitingFrame,
    InFrame,
}

/// Feeds on raw bytes, yields only frames closed by their blank-line
/// delimiter. Bytes may arrive split at arbitrary boundaries, including
/// inside a multi-byte character; incomplete lines stay buffered.
pub struct SseDecoder {
    buf: Vec<u8>,
    state: DecoderState,
    event: Option<String>,
    data: String,
    has_data: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            state: DecoderState::AwaitingFrame,
            event: None,
            data: String::new(),
            has_data: false,
        }
    }

    /// Consume a read's worth of bytes, returning every frame completed
    /// by it.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line_bytes: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return match self.state {
                DecoderState::InFrame => {
                    self.state = DecoderState::AwaitingFrame;
                    Some(self.take_frame())
                }
                // Stray blank lines between frames are ignored.
                DecoderState::AwaitingFrame => None,
            };
        }

        // Comment lines never open a frame.
        if line.starts_with(':') {
            return None;
        }

        self.state = DecoderState::InFrame;
        if let Some(value) = field_value(line, "data") {
            self.data.push_str(value);
            self.has_data = true;
        } else if let Some(value) = field_value(line, "event") {
            self.event = Some(value.to_string());
        }
        // Other fields (id:, retry:) are accepted and ignored.
        None
    }

    fn take_frame(&mut self) -> SseFrame {
        self.has_data = false;
        SseFrame {
            event: self.event.take(),
            data: std::mem::take(&mut self.data),
        }
    }

    /// Handle connection close. A leftover partial frame is flushed only
    /// if it is a well-formed (if truncated) data frame; anything else is
    /// discarded and reported as truncation.
    pub fn finish(mut self) -> Result<Option<SseFrame>, ApiError> {
        if !self.buf.is_empty() {
            let line_bytes = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(value) = field_value(line, "data") {
                self.data.push_str(value);
                self.has_data = true;
            } else {
                return Err(ApiError::StreamTruncated);
            }
        }

        if self.event.is_some() {
            // An unterminated non-data frame; nothing safe to flush.
            return Err(ApiError::StreamTruncated);
        }
        if self.has_data {
            return Ok(Some(self.take_frame()));
        }
        Ok(None)
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// `"data: value"` and `"data:value"` are equivalent; at most one leading
/// space after the colon is stripped.
fn field_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}
