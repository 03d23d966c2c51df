//! Shared fixtures for the integration tests

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use edt_relay::config::{FileMask, TransferSettings};
use edt_relay::local::{FsLocal, LocalStore};
use edt_relay::sink::{FormFile, Sink, SinkError, SinkReply};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("edt_relay=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Fixed acknowledgment clock: 2024-01-01 12:00:00
pub fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

/// ZIP archive bytes holding `members` in order
pub fn zip_bytes(members: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in members {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub fn settings(destination: &Path) -> TransferSettings {
    TransferSettings::new("/in", destination, FileMask::new("*.zip").unwrap())
}

/// Sorted names of the files left in a local directory
pub fn local_files(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Sink answering from a script, 200 once the script runs out
#[derive(Default)]
pub struct ScriptedSink {
    replies: RefCell<VecDeque<Result<SinkReply, SinkError>>>,
    pub requests: RefCell<Vec<Vec<FormFile>>>,
}

impl ScriptedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_status(self, status: u16) -> Self {
        self.replies.borrow_mut().push_back(Ok(SinkReply {
            status,
            body: format!("status {}", status),
        }));
        self
    }

    pub fn then_unreachable(self) -> Self {
        self.replies
            .borrow_mut()
            .push_back(Err(SinkError::Transport("connection refused".into())));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Sink for ScriptedSink {
    fn post(&self, files: Vec<FormFile>) -> Result<SinkReply, SinkError> {
        self.requests.borrow_mut().push(files);
        self.replies.borrow_mut().pop_front().unwrap_or(Ok(SinkReply {
            status: 200,
            body: "accepted".into(),
        }))
    }
}

/// Local store that cannot delete the listed paths
pub struct UndeletableLocal {
    pub refuse: Vec<PathBuf>,
}

impl LocalStore for UndeletableLocal {
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        FsLocal.create(path)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        FsLocal.open(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if self.refuse.iter().any(|p| p == path) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "file is locked"));
        }
        FsLocal.remove(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        FsLocal.remove_dir(path)
    }
}
