// src/protocol/mod.rs

//! Service-message wire protocol.
//!
//! - [`decoder`] finds and parses `##<marker>[...]` events in one output line.
//! - [`escape`] decodes `|`-escaped attribute values.
//! - [`message`] holds the decoded [`ServiceMessage`] and its [`MessageKind`].
//!
//! Nothing here interprets what an event means; that is the build context's job.

pub mod decoder;
pub mod escape;
pub mod message;

pub use decoder::ServiceMessageDecoder;
pub use message::{MessageKind, ServiceMessage};
