// src/protocol/message.rs

use std::fmt;

/// Known service-message names, decoded once from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Message,
    BuildProblem,
    TestStdOut,
    TestStdErr,
    TestFinished,
    TestIgnored,
    TestFailed,
    /// Any other name, kept verbatim.
    Other(String),
}

impl MessageKind {
    /// Classify an event name (ASCII case-insensitive).
    pub fn from_name(name: &str) -> Self {
        const KNOWN: [(&str, MessageKind); 7] = [
            ("message", MessageKind::Message),
            ("buildProblem", MessageKind::BuildProblem),
            ("testStdOut", MessageKind::TestStdOut),
            ("testStdErr", MessageKind::TestStdErr),
            ("testFinished", MessageKind::TestFinished),
            ("testIgnored", MessageKind::TestIgnored),
            ("testFailed", MessageKind::TestFailed),
        ];

        KNOWN
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(name))
            .map(|(_, kind)| kind.clone())
            .unwrap_or_else(|| MessageKind::Other(name.to_string()))
    }
}

/// One decoded protocol event: a name plus ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceMessage {
    name: String,
    kind: MessageKind,
    attributes: Vec<(String, String)>,
    /// Value of the single-value form `##marker[name 'value']`.
    value: Option<String>,
}

impl ServiceMessage {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let kind = MessageKind::from_name(&name);
        Self {
            name,
            kind,
            attributes: Vec::new(),
            value: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    /// Attribute value by exact key. The first occurrence wins.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value, treating blank values as absent.
    pub fn non_blank(&self, key: &str) -> Option<&str> {
        self.attribute(key).filter(|v| !v.trim().is_empty())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl fmt::Display for ServiceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(value) = &self.value {
            write!(f, " '{value}'")?;
        }
        for (k, v) in &self.attributes {
            write!(f, " {k}='{v}'")?;
        }
        Ok(())
    }
}
