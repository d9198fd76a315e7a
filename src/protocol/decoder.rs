// src/protocol/decoder.rs

//! Line decoder for `##<marker>[name key='value' ...]` service messages.
//!
//! Decoding is total: text that does not form a complete event is skipped and
//! scanning resumes right after the marker that started it. A line with no
//! complete events decodes to an empty list and is treated as plain output.

use regex::Regex;
use tracing::trace;

use crate::errors::{BuildtraceError, Result};
use crate::protocol::escape::unescape;
use crate::protocol::message::ServiceMessage;

/// Decodes service messages for one marker.
#[derive(Debug, Clone)]
pub struct ServiceMessageDecoder {
    marker: String,
    start: Regex,
}

impl ServiceMessageDecoder {
    pub fn new(marker: &str) -> Result<Self> {
        let start = Regex::new(&format!(r"##{}\[", regex::escape(marker))).map_err(|e| {
            BuildtraceError::ConfigError(format!("invalid protocol marker '{marker}': {e}"))
        })?;
        Ok(Self {
            marker: marker.to_string(),
            start,
        })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Decode every complete event on `line`, in order of appearance.
    pub fn decode(&self, line: &str) -> Vec<ServiceMessage> {
        let mut messages = Vec::new();
        let mut from = 0;

        while let Some(m) = self.start.find_at(line, from) {
            match parse_body(line, m.end()) {
                Some((message, end)) => {
                    messages.push(message);
                    from = end;
                }
                None => {
                    trace!(offset = m.start(), "skipping malformed service message");
                    from = m.end();
                }
            }
        }

        messages
    }
}

/// Byte-position cursor over one line.
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &src[start..self.pos]
    }

    /// Read a `'...'` value (the opening quote already consumed) and unescape it.
    fn quoted_value(&mut self) -> Option<String> {
        let start = self.pos;
        loop {
            match self.bump()? {
                '|' => {
                    self.bump()?;
                }
                '\'' => break,
                _ => {}
            }
        }
        let raw = &self.src[start..self.pos - 1];
        unescape(raw)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

/// Parse the body after `##marker[`, returning the message and the byte
/// offset just past the closing `]`.
fn parse_body(line: &str, pos: usize) -> Option<(ServiceMessage, usize)> {
    let mut cur = Cursor { src: line, pos };

    cur.skip_whitespace();
    let name = cur.take_while(is_ident_char);
    if name.is_empty() {
        return None;
    }
    let mut message = ServiceMessage::new(name);

    // Name must be followed by whitespace or the closing bracket.
    match cur.peek()? {
        ']' => {
            cur.bump();
            return Some((message, cur.pos));
        }
        c if c.is_whitespace() => cur.skip_whitespace(),
        _ => return None,
    }

    // Single-value form: ##marker[name 'value']
    if cur.eat('\'') {
        message = message.with_value(cur.quoted_value()?);
        cur.skip_whitespace();
        return cur.eat(']').then_some((message, cur.pos));
    }

    loop {
        cur.skip_whitespace();
        if cur.eat(']') {
            return Some((message, cur.pos));
        }

        let key = cur.take_while(is_ident_char);
        if key.is_empty() {
            return None;
        }
        cur.skip_whitespace();
        if !cur.eat('=') {
            return None;
        }
        cur.skip_whitespace();
        if !cur.eat('\'') {
            return None;
        }
        let value = cur.quoted_value()?;
        message = message.with_attribute(key, value);
    }
}
