//! In-process remote store
//!
//! [`MemoryRemote`] keeps a flat map of file paths to bytes plus a set of
//! directories. Clones share the same namespace, so a test can hand one clone
//! to the pipeline and inspect the other afterwards.
//!
//! Faults are injected per operation and path with [`MemoryRemote::fail`];
//! a matching call returns [`RemoteError::Failed`] instead of touching state.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{parent, RemoteEntry, RemoteError, RemoteResult, RemoteStore, RemoteWriter};

/// Operation kinds that can be observed or failed on a [`MemoryRemote`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Walk,
    Stat,
    Rename,
    Open,
    Create,
    Write,
    Close,
    Remove,
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    faults: HashSet<(RemoteOp, String)>,
    calls: Vec<(RemoteOp, String)>,
}

impl State {
    fn enter(&mut self, op: RemoteOp, path: &str) -> RemoteResult<()> {
        self.calls.push((op, path.to_string()));
        if self.faults.contains(&(op, path.to_string())) {
            return Err(RemoteError::Failed(format!("injected {:?} fault on {}", op, path)));
        }
        Ok(())
    }

    fn add_parents(&mut self, path: &str) {
        let mut dir = parent(path);
        while !dir.is_empty() && dir != "/" {
            self.dirs.insert(dir.to_string());
            dir = parent(dir);
        }
    }
}

/// Shared in-memory remote namespace
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<State>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // a panicking test must not hide the namespace from later assertions
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Builder-style [`put`](Self::put)
    pub fn with_file(self, path: &str, contents: &[u8]) -> Self {
        self.put(path, contents);
        self
    }

    /// Create or replace a file, creating its parent directories
    pub fn put(&self, path: &str, contents: &[u8]) {
        let mut state = self.state();
        state.add_parents(path);
        state.files.insert(path.to_string(), contents.to_vec());
    }

    pub fn mkdir(&self, path: &str) {
        let mut state = self.state();
        state.add_parents(path);
        state.dirs.insert(path.trim_end_matches('/').to_string());
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state().files.contains_key(path)
    }

    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.get(path).cloned()
    }

    /// Every file path currently stored, sorted
    pub fn paths(&self) -> Vec<String> {
        self.state().files.keys().cloned().collect()
    }

    /// Make every future `op` on `path` fail
    pub fn fail(&self, op: RemoteOp, path: &str) {
        self.state().faults.insert((op, path.to_string()));
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<(RemoteOp, String)> {
        self.state().calls.clone()
    }

    /// Number of calls of kind `op` made so far
    pub fn count(&self, op: RemoteOp) -> usize {
        self.state().calls.iter().filter(|(o, _)| *o == op).count()
    }
}

impl RemoteStore for MemoryRemote {
    fn walk(&mut self, root: &str) -> RemoteResult<Vec<RemoteEntry>> {
        let mut state = self.state();
        state.enter(RemoteOp::Walk, root)?;

        let root = root.trim_end_matches('/');
        let prefix = format!("{}/", root);
        if !root.is_empty() && !state.dirs.contains(root) {
            return Err(RemoteError::NotFound(root.to_string()));
        }

        let dirs = state
            .dirs
            .iter()
            .filter(|d| d.starts_with(&prefix))
            .map(|d| RemoteEntry::dir(d.as_str()));
        let files = state
            .files
            .iter()
            .filter(|(p, _)| p.starts_with(&prefix))
            .map(|(p, data)| RemoteEntry::file(p.as_str(), Some(data.len() as u64)));

        Ok(dirs.chain(files).collect())
    }

    fn stat(&mut self, path: &str) -> RemoteResult<RemoteEntry> {
        let mut state = self.state();
        state.enter(RemoteOp::Stat, path)?;
        if let Some(data) = state.files.get(path) {
            Ok(RemoteEntry::file(path, Some(data.len() as u64)))
        } else if state.dirs.contains(path) {
            Ok(RemoteEntry::dir(path))
        } else {
            Err(RemoteError::NotFound(path.to_string()))
        }
    }

    fn rename(&mut self, from: &str, to: &str) -> RemoteResult<()> {
        let mut state = self.state();
        state.enter(RemoteOp::Rename, from)?;
        let data = state
            .files
            .remove(from)
            .ok_or_else(|| RemoteError::NotFound(from.to_string()))?;
        state.files.insert(to.to_string(), data);
        Ok(())
    }

    fn open(&mut self, path: &str) -> RemoteResult<Box<dyn Read + '_>> {
        let mut state = self.state();
        state.enter(RemoteOp::Open, path)?;
        let data = state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn create(&mut self, path: &str) -> RemoteResult<Box<dyn RemoteWriter + '_>> {
        let mut state = self.state();
        state.enter(RemoteOp::Create, path)?;
        let dir = parent(path);
        if !dir.is_empty() && dir != "/" && !state.dirs.contains(dir) {
            return Err(RemoteError::NotFound(dir.to_string()));
        }
        // the file is visible as soon as it is created, like a real STOR
        state.files.insert(path.to_string(), Vec::new());
        drop(state);

        Ok(Box::new(MemoryWriter {
            remote: self.clone(),
            path: path.to_string(),
            buffer: Vec::new(),
        }))
    }

    fn remove(&mut self, path: &str) -> RemoteResult<()> {
        let mut state = self.state();
        state.enter(RemoteOp::Remove, path)?;
        state
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }
}

struct MemoryWriter {
    remote: MemoryRemote,
    path: String,
    buffer: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.remote
            .state()
            .enter(RemoteOp::Write, &self.path)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl RemoteWriter for MemoryWriter {
    fn close(self: Box<Self>) -> RemoteResult<()> {
        let MemoryWriter {
            remote,
            path,
            buffer,
        } = *self;
        let mut state = remote.state();
        state.enter(RemoteOp::Close, &path)?;
        state.files.insert(path, buffer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_lists_nested_entries() {
        let mut remote = MemoryRemote::new()
            .with_file("/in/A.zip", b"a")
            .with_file("/in/COBA/B.zip", b"bb")
            .with_file("/other/C.zip", b"c");

        let entries = remote.walk("/in").unwrap();
        let mut paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        paths.sort();
        assert_eq!(paths, vec!["/in/A.zip", "/in/COBA", "/in/COBA/B.zip"]);
        assert!(entries.iter().any(|e| e.path == "/in/COBA" && e.is_dir));
    }

    #[test]
    fn test_walk_missing_root() {
        let mut remote = MemoryRemote::new();
        assert!(matches!(remote.walk("/in"), Err(RemoteError::NotFound(_))));
    }

    #[test]
    fn test_rename_moves_contents() {
        let mut remote = MemoryRemote::new().with_file("/in/A.zip", b"payload");
        remote.rename("/in/A.zip", "/in/A.zip.edt").unwrap();
        assert!(!remote.exists("/in/A.zip"));
        assert_eq!(remote.read("/in/A.zip.edt").unwrap(), b"payload");
    }

    #[test]
    fn test_writer_commits_on_close() {
        let mut remote = MemoryRemote::new();
        remote.mkdir("/in");
        let observer = remote.clone();

        let mut writer = remote.create("/in/A.zip.response").unwrap();
        writer.write_all(b"A.zip;20240101T120000").unwrap();
        assert_eq!(observer.read("/in/A.zip.response").unwrap(), b"");
        writer.close().unwrap();

        assert_eq!(
            observer.read("/in/A.zip.response").unwrap(),
            b"A.zip;20240101T120000"
        );
    }

    #[test]
    fn test_injected_fault() {
        let mut remote = MemoryRemote::new().with_file("/in/A.zip", b"a");
        remote.fail(RemoteOp::Rename, "/in/A.zip");

        assert!(remote.rename("/in/A.zip", "/in/A.zip.edt").is_err());
        assert!(remote.exists("/in/A.zip"));
        assert_eq!(remote.count(RemoteOp::Rename), 1);
    }
}
