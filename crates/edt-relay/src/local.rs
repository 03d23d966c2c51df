//! Local file store

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// The subset of local filesystem access the pipeline needs
pub trait LocalStore {
    /// Create or truncate a file for writing
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write>>;

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

/// [`LocalStore`] over `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLocal;

impl LocalStore for FsLocal {
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        Ok(Box::new(File::create(path)?))
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(File::open(path)?))
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }
}

/// Local files owned by the records of one run
///
/// Download and Unpack reserve every path before writing it. A path can be
/// held by a single record only, so records never read, overwrite or delete
/// each other's files.
#[derive(Debug, Default)]
pub struct LocalClaims {
    paths: HashSet<PathBuf>,
}

impl LocalClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `path`. Returns false if another record of the run holds it.
    pub fn reserve(&mut self, path: &Path) -> bool {
        self.paths.insert(path.to_path_buf())
    }

    /// Give up a path whose file was never written or is gone again
    pub fn release(&mut self, path: &Path) {
        self.paths.remove(path);
    }
}
