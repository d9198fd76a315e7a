#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use buildtrace::config::DEFAULT_MARKER;

/// Builder for one `##marker[name key='value' ...]` line.
pub struct MessageLineBuilder {
    marker: String,
    name: String,
    value: Option<String>,
    attributes: Vec<(String, String)>,
}

impl MessageLineBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            name: name.to_string(),
            value: None,
            attributes: Vec::new(),
        }
    }

    pub fn marker(mut self, marker: &str) -> Self {
        self.marker = marker.to_string();
        self
    }

    /// Single-value form: `##marker[name 'value']`.
    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> String {
        let mut line = format!("##{}[{}", self.marker, self.name);
        if let Some(value) = &self.value {
            line.push_str(&format!(" '{}'", escape(value)));
        }
        for (k, v) in &self.attributes {
            line.push_str(&format!(" {}='{}'", k, escape(v)));
        }
        line.push(']');
        line
    }
}

/// `##teamcity[testFinished ...]` style shortcuts with the default marker.
pub fn test_event(name: &str, suite: &str, test: &str) -> MessageLineBuilder {
    MessageLineBuilder::new(name).attr("suiteName", suite).attr("name", test)
}

pub fn message(text: &str, status: &str) -> String {
    MessageLineBuilder::new("message")
        .attr("text", text)
        .attr("status", status)
        .build()
}

pub fn source_reference(source: &str) -> String {
    MessageLineBuilder::new("importData").attr("source", source).build()
}

/// Escape a value the way a writer of service messages would.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\'' => out.push_str("|'"),
            '|' => out.push_str("||"),
            '\n' => out.push_str("|n"),
            '\r' => out.push_str("|r"),
            '[' => out.push_str("|["),
            ']' => out.push_str("|]"),
            '\u{0085}' => out.push_str("|x"),
            '\u{2028}' => out.push_str("|l"),
            '\u{2029}' => out.push_str("|p"),
            other => out.push(other),
        }
    }
    out
}

/// Writes a side-channel index/log pair named `source` into a directory.
pub struct SideChannelBuilder {
    dir: PathBuf,
    source: String,
    offsets: Vec<u64>,
    log: Vec<u8>,
    trailing_index_bytes: Vec<u8>,
}

impl SideChannelBuilder {
    pub fn new(dir: &Path, source: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            source: source.to_string(),
            offsets: Vec::new(),
            log: Vec::new(),
            trailing_index_bytes: Vec::new(),
        }
    }

    /// Append one protocol line and its end offset.
    pub fn line(mut self, line: &str) -> Self {
        self.log.extend_from_slice(line.as_bytes());
        self.offsets.push(self.log.len() as u64);
        self
    }

    /// Append a raw offset without log content.
    pub fn raw_offset(mut self, offset: u64) -> Self {
        self.offsets.push(offset);
        self
    }

    /// Append raw bytes to the log without an offset.
    pub fn raw_log(mut self, bytes: &[u8]) -> Self {
        self.log.extend_from_slice(bytes);
        self
    }

    /// Append a partial index entry.
    pub fn trailing_index_bytes(mut self, bytes: &[u8]) -> Self {
        self.trailing_index_bytes.extend_from_slice(bytes);
        self
    }

    /// Write both files; returns the index path.
    pub fn write(self) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let index_path = self.dir.join(&self.source);

        let mut index = Vec::with_capacity(self.offsets.len() * 8);
        for offset in &self.offsets {
            index.extend_from_slice(&offset.to_be_bytes());
        }
        index.extend_from_slice(&self.trailing_index_bytes);

        fs::write(&index_path, index)?;
        fs::write(buildtrace::recovery::message_log_path(&index_path), &self.log)?;
        Ok(index_path)
    }
}

/// Encode offsets as an index file body.
pub fn index_bytes(offsets: &[u64]) -> Vec<u8> {
    offsets.iter().flat_map(|o| o.to_be_bytes()).collect()
}
