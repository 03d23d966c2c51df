//! Download stage: copy each claimed source to the local destination
//! directory under its original base name
//!
//! Two sources with the same base name in different remote directories map
//! to the same local file. The first one in the batch gets it; the other
//! fails with [`RecordError::LocalCollision`] and keeps its claimed source.

use std::io;
use std::path::Path;
use tracing::info;

use super::Step;
use crate::error::RecordError;
use crate::local::{LocalClaims, LocalStore};
use crate::record::{Stage, TransferRecord};
use crate::remote::{base_name, RemoteStore};

pub struct Download<'a> {
    remote: &'a mut dyn RemoteStore,
    local: &'a dyn LocalStore,
    destination: &'a Path,
    claims: &'a mut LocalClaims,
}

impl<'a> Download<'a> {
    pub fn new(
        remote: &'a mut dyn RemoteStore,
        local: &'a dyn LocalStore,
        destination: &'a Path,
        claims: &'a mut LocalClaims,
    ) -> Self {
        Self {
            remote,
            local,
            destination,
            claims,
        }
    }

    fn fetch(
        &mut self,
        record: &mut TransferRecord,
        source: &str,
        target: &Path,
    ) -> Result<u64, RecordError> {
        let mut reader = self.remote.open(source).map_err(|e| RecordError::Open {
            path: source.to_string(),
            source: e,
        })?;
        let mut writer = self.local.create(target).map_err(|e| RecordError::Create {
            path: target.to_path_buf(),
            source: e,
        })?;
        record.destination_path = Some(target.to_path_buf());

        io::copy(&mut reader, &mut writer)
            .and_then(|bytes| writer.flush().map(|()| bytes))
            .map_err(|e| RecordError::Copy {
                from: source.to_string(),
                to: target.to_path_buf(),
                source: e,
            })
    }
}

impl Step for Download<'_> {
    const STAGE: Stage = Stage::Download;

    fn apply(&mut self, record: &mut TransferRecord) -> Result<(), RecordError> {
        let source = record.source_path.clone().ok_or(RecordError::Unclaimed)?;
        let target = self
            .destination
            .join(base_name(&record.source_path_original));

        if !self.claims.reserve(&target) {
            return Err(RecordError::LocalCollision { path: target });
        }

        let fetched = self.fetch(record, &source, &target);
        if record.destination_path.is_none() {
            self.claims.release(&target);
        }
        let copied = fetched?;

        info!(
            source = %record.source_path_original,
            destination = %target.display(),
            bytes = copied,
            "copied"
        );
        Ok(())
    }
}
