//! Processing sink
//!
//! The dispatch stage hands every unpacked member of one record to a
//! [`Sink`] in a single call. Implementations only report what happened on
//! the wire; deciding which status codes count as a rejection is left to the
//! caller.

pub mod http;

use thiserror::Error;

pub use http::HttpSink;

/// One multipart file part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFile {
    /// Form field name, unique within one request
    pub field: String,
    /// File name announced in the part's content disposition
    pub file_name: String,
    pub contents: Vec<u8>,
}

/// What the sink answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReply {
    pub status: u16,
    pub body: String,
}

impl SinkReply {
    pub fn is_rejection(&self) -> bool {
        self.status >= 400
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    /// The request could not be completed at all
    #[error("transport failure: {0}")]
    Transport(String),

    /// A status arrived but the body could not be read
    #[error("unreadable response body: {0}")]
    ResponseBody(String),
}

/// Destination of dispatched payloads
pub trait Sink {
    fn post(&self, files: Vec<FormFile>) -> Result<SinkReply, SinkError>;
}
