//! Unpack stage: expand each downloaded archive next to it
//!
//! All archives of a batch share the destination directory. A member whose
//! path another record already owns fails this record with
//! [`RecordError::LocalCollision`]; the other record's file is left alone.

use std::path::Path;
use tracing::info;

use super::Step;
use crate::archive::{self, ArchiveError};
use crate::constants::ARCHIVE_EXTENSION;
use crate::error::RecordError;
use crate::local::LocalClaims;
use crate::record::{Stage, TransferRecord};

pub struct Unpack<'a> {
    destination: &'a Path,
    claims: &'a mut LocalClaims,
}

impl<'a> Unpack<'a> {
    pub fn new(destination: &'a Path, claims: &'a mut LocalClaims) -> Self {
        Self {
            destination,
            claims,
        }
    }
}

impl Step for Unpack<'_> {
    const STAGE: Stage = Stage::Unpack;

    fn apply(&mut self, record: &mut TransferRecord) -> Result<(), RecordError> {
        let archive_path = record
            .destination_path
            .clone()
            .ok_or(RecordError::Unclaimed)?;

        let is_archive = archive_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION));
        if !is_archive {
            return Err(RecordError::InvalidExtension(archive_path));
        }

        let expansion = archive::expand(&archive_path, self.destination, self.claims)
            .map_err(|e| match e {
                ArchiveError::Collision(path) => RecordError::LocalCollision { path },
                e => RecordError::Archive {
                    path: archive_path.clone(),
                    source: e,
                },
            })?;
        record.directories = expansion.directories;
        let members = expansion.files;
        if members.is_empty() {
            return Err(RecordError::EmptyArchive(archive_path));
        }

        let names: Vec<_> = members
            .iter()
            .filter_map(|m| m.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        info!(
            source = %record.source_path_original,
            members = ?names,
            "unpacked"
        );

        record.unpacked = members;
        Ok(())
    }
}
