// src/services/decoder.rs
//! Incremental decoder for the upstream chatbot stream.
//!
//! The upstream writes JSON objects separated by newlines, but chunk
//! boundaries fall anywhere: inside a UTF-8 character, inside a string, or
//! between two objects sharing a line. [`EventDecoder`] accepts raw chunks,
//! parses every complete value it can, and keeps only an unfinished trailing
//! value buffered. Content that can never become a valid event is dropped up
//! to the end of its line and reported as [`RelayEvent::ParseError`].

use serde::Deserialize;
use serde_json::Deserializer;
use tracing::debug;

use super::advisor::{Advisor, is_unknown_sentinel};

/// One JSON object as written by the upstream.
#[derive(Debug, Deserialize)]
struct UpstreamEvent {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// The upstream routed the conversation to another advisor. `name` is the raw upstream value.
    Handoff { advisor: Advisor, name: String },
    Message(String),
    ParseError(ParseFailure),
}

impl RelayEvent {
    /// Text to send downstream, if this event produces any.
    pub fn into_token(self) -> Option<String> {
        match self {
            RelayEvent::Handoff { name, .. } => Some(name),
            RelayEvent::Message(text) => Some(text),
            RelayEvent::ParseError(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// A line that is not a valid event object.
    Malformed { discarded: usize, reason: String },
    /// An unfinished value grew past the buffer bound.
    Overflow { discarded: usize },
    /// The stream ended in the middle of a value.
    Truncated { discarded: usize },
}

#[derive(Debug)]
pub struct EventDecoder {
    utf8: Utf8Carry,
    buffer: String,
    skipping_line: bool,
    previous_message: Option<String>,
    max_buffer_bytes: usize,
}

impl EventDecoder {
    pub fn new(max_buffer_bytes: usize) -> Self {
        Self {
            utf8: Utf8Carry::default(),
            buffer: String::new(),
            skipping_line: false,
            previous_message: None,
            max_buffer_bytes,
        }
    }

    /// Feed one raw upstream chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RelayEvent> {
        let text = self.utf8.decode(chunk);
        let mut events = Vec::new();
        self.push_text(&text, &mut events);
        events
    }

    /// Flush whatever is left once the upstream is exhausted.
    pub fn finish(&mut self) -> Vec<RelayEvent> {
        let mut events = Vec::new();
        let tail = self.utf8.finish();
        if !tail.is_empty() {
            self.push_text(&tail, &mut events);
        }

        let leftover = self.buffer.trim().len();
        if leftover > 0 {
            events.push(RelayEvent::ParseError(ParseFailure::Truncated { discarded: leftover }));
        }
        self.buffer.clear();
        self.skipping_line = false;
        events
    }

    fn push_text(&mut self, mut text: &str, events: &mut Vec<RelayEvent>) {
        if self.skipping_line {
            match text.find('\n') {
                Some(newline) => {
                    self.skipping_line = false;
                    text = &text[newline + 1..];
                }
                None => return,
            }
        }
        self.buffer.push_str(text);
        self.drain(events);
    }

    fn drain(&mut self, events: &mut Vec<RelayEvent>) {
        loop {
            let mut parsed = Vec::new();
            let mut consumed = 0;
            let failure = {
                let mut values = Deserializer::from_str(&self.buffer).into_iter::<UpstreamEvent>();
                loop {
                    match values.next() {
                        Some(Ok(event)) => {
                            parsed.push(event);
                            consumed = values.byte_offset();
                        }
                        // unfinished value, wait for more bytes
                        Some(Err(err)) if err.is_eof() => break None,
                        Some(Err(err)) => break Some(err.to_string()),
                        None => {
                            consumed = self.buffer.len();
                            break None;
                        }
                    }
                }
            };

            self.buffer.drain(..consumed);
            for event in parsed {
                self.apply(event, events);
            }

            match failure {
                Some(reason) => self.discard_line(reason, events),
                None => break,
            }
        }

        if self.buffer.len() > self.max_buffer_bytes {
            let discarded = self.buffer.len();
            // only the unread rest of a line still belongs to the dropped value
            let mid_line = !self
                .buffer
                .trim_end_matches([' ', '\t', '\r'])
                .ends_with('\n');
            self.buffer.clear();
            self.skipping_line = mid_line;
            events.push(RelayEvent::ParseError(ParseFailure::Overflow { discarded }));
        }
    }

    /// Drop the value at the head of the buffer through the end of its line.
    fn discard_line(&mut self, reason: String, events: &mut Vec<RelayEvent>) {
        let start = self.buffer.len() - self.buffer.trim_start().len();
        let discarded = match self.buffer[start..].find('\n') {
            Some(newline) => {
                self.buffer.drain(..start + newline + 1);
                newline
            }
            None => {
                let discarded = self.buffer.len() - start;
                self.buffer.clear();
                self.skipping_line = true;
                discarded
            }
        };
        events.push(RelayEvent::ParseError(ParseFailure::Malformed { discarded, reason }));
    }

    fn apply(&mut self, event: UpstreamEvent, events: &mut Vec<RelayEvent>) {
        let message = event
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());

        if let (Some(name), None) = (event.next.as_deref(), message) {
            match Advisor::parse(name) {
                Some(advisor) => events.push(RelayEvent::Handoff {
                    advisor,
                    name: name.to_string(),
                }),
                None => debug!(next = name, "ignoring handoff to unknown advisor"),
            }
            return;
        }

        let Some(message) = message else { return };
        if is_unknown_sentinel(message) || self.previous_message.as_deref() == Some(message) {
            return;
        }
        self.previous_message = Some(message.to_string());
        events.push(RelayEvent::Message(message.to_string()));
    }
}

/// Carries an incomplete UTF-8 sequence from one chunk to the next.
#[derive(Debug, Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(events: Vec<RelayEvent>) -> Vec<String> {
        events.into_iter().filter_map(RelayEvent::into_token).collect()
    }

    #[test]
    fn utf8_split_across_chunks() {
        let mut carry = Utf8Carry::default();
        let bytes = "é".as_bytes();
        assert_eq!(carry.decode(&bytes[..1]), "");
        assert_eq!(carry.decode(&bytes[1..]), "é");
        assert_eq!(carry.decode(b"\xffok"), "\u{FFFD}ok");
    }

    #[test]
    fn braces_inside_strings() {
        let mut decoder = EventDecoder::new(1024);
        let events = decoder.push(br#"{"message":"use {curly} braces"}"#);
        assert_eq!(tokens(events), vec!["use {curly} braces"]);
    }

    #[test]
    fn pretty_printed_object() {
        let mut decoder = EventDecoder::new(1024);
        let mut events = decoder.push(b"{\n  \"message\":");
        events.extend(decoder.push(b" \"Hi\"\n}\n"));
        assert_eq!(tokens(events), vec!["Hi"]);
    }

    #[test]
    fn skipped_line_spans_chunks() {
        let mut decoder = EventDecoder::new(1024);
        let mut events = decoder.push(b"not json at");
        events.extend(decoder.push(b" all\n{\"message\":\"after\"}\n"));
        assert!(matches!(events[0], RelayEvent::ParseError(ParseFailure::Malformed { .. })));
        assert_eq!(tokens(events), vec!["after"]);
    }

    #[test]
    fn blank_message_with_next_is_a_handoff() {
        let mut decoder = EventDecoder::new(1024);
        let events = decoder.push(br#"{"next":"admission_advisor","message":"  "}"#);
        assert_eq!(
            events,
            vec![RelayEvent::Handoff {
                advisor: Advisor::Admission,
                name: "admission_advisor".to_string(),
            }]
        );
    }
}
