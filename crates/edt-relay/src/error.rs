//! Error types of the transfer pipeline
//!
//! Two levels exist:
//!
//! - [`RecordError`]: why a single Transfer Record failed. It is attached to
//!   the record and never aborts processing of its siblings.
//! - [`PipelineError`]: a failure that ends the whole run. Only remote
//!   connection or listing failures and a transport failure towards the
//!   processing sink are fatal.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::remote::RemoteError;

/// Reason carried by a failed Transfer Record
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("cannot rename {path} to {claimed}: {source}")]
    Claim {
        path: String,
        claimed: String,
        source: RemoteError,
    },

    #[error("cannot remove fence {path}: {source}")]
    Fence { path: String, source: RemoteError },

    #[error("record was never claimed")]
    Unclaimed,

    #[error("cannot open remote {path}: {source}")]
    Open { path: String, source: RemoteError },

    #[error("cannot create destination file {}: {source}", .path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("cannot copy {from} to {}: {source}", .to.display())]
    Copy {
        from: String,
        to: PathBuf,
        source: io::Error,
    },

    #[error("local file {} already belongs to another record of this run", .path.display())]
    LocalCollision { path: PathBuf },

    #[error("invalid extension {}", .0.display())]
    InvalidExtension(PathBuf),

    #[error("cannot unzip {}: {source}", .path.display())]
    Archive { path: PathBuf, source: ArchiveError },

    #[error("empty archive {}", .0.display())]
    EmptyArchive(PathBuf),

    #[error("cannot read payload {}: {source}", .path.display())]
    Payload { path: PathBuf, source: io::Error },

    #[error("processing sink unreachable: {0}")]
    Transport(String),

    #[error("cannot read processing sink response: {0}")]
    ResponseBody(String),

    #[error("processing sink rejected the payload with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("cannot write acknowledgment {path}: {source}")]
    Acknowledge { path: String, source: RemoteError },

    #[error("cannot remove {path}: {reason}")]
    Compensation { path: String, reason: String },
}

impl RecordError {
    /// Whether this failure must stop the remaining records of the batch
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecordError::Transport(_))
    }
}

/// Failure that aborts a run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot connect to {target}: {message}")]
    Connect { target: String, message: String },

    #[error("cannot scan {path}: {source}")]
    Scan { path: String, source: RemoteError },

    #[error("dispatch aborted at {path}: {message}")]
    Dispatch { path: String, message: String },
}
