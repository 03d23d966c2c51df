//! ZIP expansion
//!
//! [`expand`] writes every file member of one archive below a destination
//! directory and returns the written paths in archive order, together with
//! the directories it had to create. Directory entries only create
//! directories.
//!
//! Member paths are reserved in the run's [`LocalClaims`] before they are
//! written, so a member that another record already owns is refused rather
//! than overwritten.
//!
//! Either the whole archive is expanded or nothing is left behind: when a
//! member fails, the files and directories created by the same call are
//! removed before the error is returned.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::local::LocalClaims;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid archive: {0}")]
    Zip(#[from] ZipError),

    #[error("Archive entry escapes the destination directory: {0}")]
    UnsafeEntry(String),

    #[error("Archive entry {} is already taken by another file of this run", .0.display())]
    Collision(PathBuf),
}

/// Output of one [`expand`] call
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Expansion {
    /// File members, in archive order
    pub files: Vec<PathBuf>,
    /// Directories that did not exist before, parents first
    pub directories: Vec<PathBuf>,
}

/// Expand `archive` into `destination`
pub fn expand(
    archive: &Path,
    destination: &Path,
    claims: &mut LocalClaims,
) -> Result<Expansion, ArchiveError> {
    let mut expansion = Expansion::default();
    match expand_into(archive, destination, claims, &mut expansion) {
        Ok(()) => Ok(expansion),
        Err(e) => {
            rollback(&expansion, claims);
            Err(e)
        }
    }
}

fn expand_into(
    archive: &Path,
    destination: &Path,
    claims: &mut LocalClaims,
    expansion: &mut Expansion,
) -> Result<(), ArchiveError> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;

    for i in 0..zip.len() {
        let mut member = zip.by_index(i)?;
        let relative = member
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafeEntry(member.name().to_string()))?;
        let target = destination.join(relative);

        if member.is_dir() {
            create_dirs(&target, destination, &mut expansion.directories)?;
            continue;
        }

        if let Some(dir) = target.parent() {
            create_dirs(dir, destination, &mut expansion.directories)?;
        }
        if !claims.reserve(&target) {
            return Err(ArchiveError::Collision(target));
        }
        let mut out = match File::create(&target) {
            Ok(out) => out,
            Err(e) => {
                claims.release(&target);
                return Err(e.into());
            }
        };
        expansion.files.push(target.clone());
        let bytes = io::copy(&mut member, &mut out)?;
        debug!("Extracted {} ({} bytes)", target.display(), bytes);
    }

    Ok(())
}

/// Create `dir` and its missing parents below `destination`, recording the
/// ones created here
fn create_dirs(dir: &Path, destination: &Path, created: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut missing = Vec::new();
    let mut current = dir;
    while current != destination && !current.exists() {
        missing.push(current.to_path_buf());
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    fs::create_dir_all(dir)?;
    created.extend(missing.into_iter().rev());
    Ok(())
}

fn rollback(expansion: &Expansion, claims: &mut LocalClaims) {
    for path in &expansion.files {
        match fs::remove_file(path) {
            Ok(()) => claims.release(path),
            Err(e) => warn!("Cannot remove partial output {}: {}", path.display(), e),
        }
    }
    for dir in expansion.directories.iter().rev() {
        if let Err(e) = fs::remove_dir(dir) {
            warn!("Cannot remove partial output {}: {}", dir.display(), e);
        }
    }
}
