//! Remote file store
//!
//! The pipeline only ever talks to the remote side through [`RemoteStore`],
//! a small capability interface keyed by `/`-separated path strings:
//!
//! - **ftp**: [`FtpRemote`], the production store over an authenticated FTP session
//! - **memory**: [`MemoryRemote`], an in-process namespace with fault injection

pub mod ftp;
pub mod memory;

use std::io::{Read, Write};
use thiserror::Error;

pub use ftp::FtpRemote;
pub use memory::{MemoryRemote, RemoteOp};

/// Result type for remote store operations
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Errors raised by a remote store
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("FTP error: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote operation failed: {0}")]
    Failed(String),
}

/// One entry produced by a walk or a stat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Full remote path
    pub path: String,
    /// Last path segment
    pub name: String,
    pub is_dir: bool,
    /// Size in bytes, when the server reports it
    pub size: Option<u64>,
}

impl RemoteEntry {
    pub fn file(path: impl Into<String>, size: Option<u64>) -> Self {
        let path = path.into();
        Self {
            name: base_name(&path).to_string(),
            path,
            is_dir: false,
            size,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: base_name(&path).to_string(),
            path,
            is_dir: true,
            size: None,
        }
    }
}

/// Writable handle returned by [`RemoteStore::create`]
///
/// Bytes are only guaranteed to be durable once `close` returns `Ok`.
pub trait RemoteWriter: Write {
    fn close(self: Box<Self>) -> RemoteResult<()>;
}

/// Capability interface over a hierarchical remote namespace
pub trait RemoteStore {
    /// Every entry below `root`, recursively. Visitation order is unspecified.
    fn walk(&mut self, root: &str) -> RemoteResult<Vec<RemoteEntry>>;

    fn stat(&mut self, path: &str) -> RemoteResult<RemoteEntry>;

    /// Atomic rename within the store
    fn rename(&mut self, from: &str, to: &str) -> RemoteResult<()>;

    fn open(&mut self, path: &str) -> RemoteResult<Box<dyn Read + '_>>;

    fn create(&mut self, path: &str) -> RemoteResult<Box<dyn RemoteWriter + '_>>;

    fn remove(&mut self, path: &str) -> RemoteResult<()>;
}

/// Last segment of a remote path
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Directory part of a remote path; `"/"` for top-level entries and `""`
/// for bare names
pub fn parent(path: &str) -> &str {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) => "/",
        Some((dir, _)) => dir,
        None => "",
    }
}

/// Join a remote directory and a name with exactly one separator
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}
