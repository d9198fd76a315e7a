// src/build/message.rs

use std::fmt;

use crate::exec::Output;
use crate::protocol::ServiceMessage;

/// Classification of a [`BuildMessage`]. Exactly one per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMessageState {
    StdOut,
    StdError,
    Warning,
    Failure,
    BuildProblem,
    ServiceMessage,
    TestResult,
}

impl BuildMessageState {
    /// States that belong in the errors aggregate.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            BuildMessageState::StdError
                | BuildMessageState::Failure
                | BuildMessageState::BuildProblem
        )
    }

    pub fn is_warning(self) -> bool {
        matches!(self, BuildMessageState::Warning)
    }

    /// Map a `message` event's `status` attribute (case-insensitive).
    pub fn from_status(status: Option<&str>) -> Self {
        match status.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
            Some("WARNING") => BuildMessageState::Warning,
            Some("FAILURE") => BuildMessageState::Failure,
            Some("ERROR") => BuildMessageState::StdError,
            _ => BuildMessageState::StdOut,
        }
    }
}

/// Importance attached to a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Importance {
    High,
    Normal,
    Low,
}

impl Importance {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Some(Importance::High),
            "normal" => Some(Importance::Normal),
            "low" => Some(Importance::Low),
            _ => None,
        }
    }
}

/// Source range a diagnostic points at. Absent numbers stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceRange {
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub end_line: Option<u32>,
    pub end_column: Option<u32>,
}

/// A classified record derived from an output line and/or a service message.
#[derive(Debug, Clone)]
pub struct BuildMessage {
    pub state: BuildMessageState,
    pub text: String,
    pub error_details: Option<String>,
    pub code: Option<String>,
    pub file: Option<String>,
    pub subcategory: Option<String>,
    pub project_file: Option<String>,
    pub sender: Option<String>,
    pub range: SourceRange,
    pub importance: Option<Importance>,
    pub output: Option<Output>,
    pub message: Option<ServiceMessage>,
}

impl BuildMessage {
    pub fn new(state: BuildMessageState, text: impl Into<String>) -> Self {
        Self {
            state,
            text: text.into(),
            error_details: None,
            code: None,
            file: None,
            subcategory: None,
            project_file: None,
            sender: None,
            range: SourceRange::default(),
            importance: None,
            output: None,
            message: None,
        }
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_message(mut self, message: ServiceMessage) -> Self {
        self.message = Some(message);
        self
    }

    /// Fill every diagnostic field the `message` event carries.
    pub fn with_diagnostics(mut self, message: &ServiceMessage) -> Self {
        let owned = |key: &str| message.non_blank(key).map(str::to_string);
        let number = |key: &str| message.attribute(key).and_then(|v| v.trim().parse::<u32>().ok());

        self.error_details = owned("errorDetails");
        self.code = owned("code");
        self.file = owned("file");
        self.subcategory = owned("subcategory");
        self.project_file = owned("projectFile");
        self.sender = owned("senderName");
        self.range = SourceRange {
            line: number("lineNumber"),
            column: number("columnNumber"),
            end_line: number("endLineNumber"),
            end_column: number("endColumnNumber"),
        };
        self.importance = message.attribute("importance").and_then(Importance::parse);
        self
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl fmt::Display for BuildMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{file}")?;
            if let Some(line) = self.range.line {
                write!(f, "({line}")?;
                if let Some(col) = self.range.column {
                    write!(f, ",{col}")?;
                }
                write!(f, ")")?;
            }
            write!(f, ": ")?;
        }
        if let Some(code) = &self.code {
            write!(f, "{code}: ")?;
        }
        write!(f, "{}", self.text)?;
        if let Some(details) = &self.error_details {
            write!(f, "\n{details}")?;
        }
        Ok(())
    }
}
