//! Clean stage: reconcile local and remote state for every record
//!
//! 1. Remove the local archive copy, then its unpacked members. The first
//!    local failure stops local cleanup for that record.
//! 2. A failed record keeps its claimed source for manual retry, and an
//!    acknowledgment written earlier in the run is withdrawn.
//! 3. A successful record has its claimed source removed, which ends its
//!    lifecycle.
//!
//! Failures here overwrite the record's error.
//!
//! Once every record is reconciled, the directories unpacking created are
//! removed, deepest first. Records may share such a directory, so this runs
//! over the whole batch. A directory that cannot be removed, typically
//! because a failed record's files are still inside, is only logged.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::error::RecordError;
use crate::local::LocalStore;
use crate::record::{Stage, TransferRecord};
use crate::remote::RemoteStore;

/// Run the compensation protocol over the whole batch
pub fn clean(
    batch: &mut [TransferRecord],
    remote: &mut dyn RemoteStore,
    local: &dyn LocalStore,
) {
    for record in batch.iter_mut() {
        clean_record(record, remote, local);
    }
    remove_directories(batch, local);
}

fn clean_record(
    record: &mut TransferRecord,
    remote: &mut dyn RemoteStore,
    local: &dyn LocalStore,
) {
    if let Err(reason) = remove_local(record, local) {
        fail(record, reason);
    }

    if record.is_failed() {
        if let Some(response) = record.response_path.clone() {
            match remote.remove(&response) {
                Ok(()) => {
                    info!(source = %record.source_path_original, path = %response, "clean");
                    record.response_path = None;
                }
                Err(e) => fail(
                    record,
                    RecordError::Compensation {
                        path: response,
                        reason: e.to_string(),
                    },
                ),
            }
        }
        return;
    }

    let Some(source) = record.source_path.clone() else {
        fail(record, RecordError::Unclaimed);
        return;
    };
    match remote.remove(&source) {
        Ok(()) => {
            info!(source = %record.source_path_original, path = %source, "clean");
            record.advance(Stage::Clean);
        }
        Err(e) => fail(
            record,
            RecordError::Compensation {
                path: source,
                reason: e.to_string(),
            },
        ),
    }
}

fn remove_local(record: &TransferRecord, local: &dyn LocalStore) -> Result<(), RecordError> {
    let Some(destination) = record.destination_path.as_deref() else {
        return Ok(());
    };
    remove_file(record, local, destination)?;
    for member in &record.unpacked {
        remove_file(record, local, member)?;
    }
    Ok(())
}

fn remove_file(
    record: &TransferRecord,
    local: &dyn LocalStore,
    path: &Path,
) -> Result<(), RecordError> {
    local.remove(path).map_err(|e| RecordError::Compensation {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    info!(source = %record.source_path_original, path = %path.display(), "clean");
    Ok(())
}

fn remove_directories(batch: &[TransferRecord], local: &dyn LocalStore) {
    let mut directories: Vec<&PathBuf> = batch.iter().flat_map(|r| &r.directories).collect();
    directories.sort_by_key(|dir| Reverse(dir.components().count()));

    for dir in directories {
        match local.remove_dir(dir) {
            Ok(()) => info!(path = %dir.display(), "clean"),
            Err(e) => warn!(path = %dir.display(), error = %e, "directory left in place"),
        }
    }
}

fn fail(record: &mut TransferRecord, reason: RecordError) {
    error!(
        source = %record.source_path_original,
        stage = %Stage::Clean,
        error = %reason,
        "cleanup failed"
    );
    record.fail(Stage::Clean, reason);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::FsLocal;
    use crate::remote::{MemoryRemote, RemoteOp};
    use std::cell::RefCell;
    use std::io::{self, Read, Write};
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// [`FsLocal`] that refuses to remove the listed paths
    #[derive(Default)]
    struct Stubborn {
        refuse: Vec<PathBuf>,
        removed: RefCell<Vec<PathBuf>>,
    }

    impl LocalStore for Stubborn {
        fn create(&self, path: &Path) -> io::Result<Box<dyn Write>> {
            FsLocal.create(path)
        }

        fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
            FsLocal.open(path)
        }

        fn remove(&self, path: &Path) -> io::Result<()> {
            if self.refuse.iter().any(|p| p == path) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "refused"));
            }
            self.removed.borrow_mut().push(path.to_path_buf());
            FsLocal.remove(path)
        }

        fn remove_dir(&self, path: &Path) -> io::Result<()> {
            FsLocal.remove_dir(path)
        }
    }

    struct Fixture {
        dir: TempDir,
        remote: MemoryRemote,
        record: TransferRecord,
    }

    /// A record that went through Acknowledge successfully
    fn acknowledged() -> Fixture {
        let dir = TempDir::new().unwrap();
        let remote = MemoryRemote::new()
            .with_file("/in/A.zip.edt", b"zip")
            .with_file("/in/A.zip.response", b"A.zip;20240101T120000");

        let mut record = TransferRecord::claimed("/in/A.zip", "/in/A.zip.edt");
        let archive = dir.path().join("A.zip");
        std::fs::write(&archive, b"zip").unwrap();
        record.destination_path = Some(archive);
        for name in ["x.xml", "y.xml"] {
            let member = dir.path().join(name);
            std::fs::write(&member, name).unwrap();
            record.unpacked.push(member);
        }
        record.response_path = Some("/in/A.zip.response".into());
        record.advance(Stage::Acknowledge);

        Fixture {
            dir,
            remote,
            record,
        }
    }

    fn local_files(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_success_removes_everything_but_the_response() {
        let Fixture {
            dir,
            mut remote,
            record,
        } = acknowledged();
        let mut batch = vec![record];

        clean(&mut batch, &mut remote, &FsLocal);

        assert!(batch[0].is_done());
        assert!(local_files(&dir).is_empty());
        assert_eq!(remote.paths(), vec!["/in/A.zip.response"]);
    }

    #[test]
    fn test_failure_withdraws_response_and_keeps_claimed_source() {
        let Fixture {
            dir,
            mut remote,
            mut record,
        } = acknowledged();
        record.fail(Stage::Dispatch, RecordError::ResponseBody("reset".into()));
        let mut batch = vec![record];

        clean(&mut batch, &mut remote, &FsLocal);

        assert!(batch[0].is_failed());
        assert_eq!(batch[0].failed_stage(), Some(Stage::Dispatch));
        assert!(batch[0].response_path.is_none());
        assert!(local_files(&dir).is_empty());
        assert_eq!(remote.paths(), vec!["/in/A.zip.edt"]);
    }

    #[test]
    fn test_failure_without_response_touches_no_remote_file() {
        let Fixture {
            mut remote,
            mut record,
            dir: _dir,
        } = acknowledged();
        record.response_path = None;
        record.fail(Stage::Unpack, RecordError::EmptyArchive(PathBuf::from("A.zip")));
        let mut batch = vec![record];

        clean(&mut batch, &mut remote, &FsLocal);

        assert_eq!(remote.count(RemoteOp::Remove), 0);
        assert!(remote.exists("/in/A.zip.edt"));
    }

    #[test]
    fn test_archive_removal_failure_skips_members_and_keeps_source() {
        let Fixture {
            dir,
            mut remote,
            record,
        } = acknowledged();
        let local = Stubborn {
            refuse: vec![dir.path().join("A.zip")],
            ..Default::default()
        };
        let mut batch = vec![record];

        clean(&mut batch, &mut remote, &local);

        assert!(local.removed.borrow().is_empty());
        assert_eq!(local_files(&dir), vec!["A.zip", "x.xml", "y.xml"]);
        assert!(matches!(
            batch[0].error(),
            Some(RecordError::Compensation { .. })
        ));
        // the acknowledgment written earlier is withdrawn
        assert_eq!(remote.paths(), vec!["/in/A.zip.edt"]);
    }

    #[test]
    fn test_member_removal_stops_at_first_failure() {
        let Fixture {
            dir,
            mut remote,
            record,
        } = acknowledged();
        let local = Stubborn {
            refuse: vec![dir.path().join("x.xml")],
            ..Default::default()
        };
        let mut batch = vec![record];

        clean(&mut batch, &mut remote, &local);

        assert_eq!(*local.removed.borrow(), vec![dir.path().join("A.zip")]);
        assert_eq!(local_files(&dir), vec!["x.xml", "y.xml"]);
        assert!(batch[0].is_failed());
    }

    #[test]
    fn test_source_removal_failure_overwrites_error() {
        let Fixture {
            mut remote,
            record,
            dir: _dir,
        } = acknowledged();
        remote.fail(RemoteOp::Remove, "/in/A.zip.edt");
        let mut batch = vec![record];

        clean(&mut batch, &mut remote, &FsLocal);

        assert_eq!(batch[0].failed_stage(), Some(Stage::Clean));
        assert!(remote.exists("/in/A.zip.edt"));
        // the response was written before Clean decided the record failed
        assert!(remote.exists("/in/A.zip.response"));
    }

    #[test]
    fn test_created_directories_are_removed_deepest_first() {
        let Fixture {
            dir,
            mut remote,
            mut record,
        } = acknowledged();
        let outer = dir.path().join("a");
        let inner = outer.join("b");
        std::fs::create_dir_all(&inner).unwrap();
        let member = inner.join("z.xml");
        std::fs::write(&member, "<z/>").unwrap();
        record.unpacked.push(member);
        record.directories = vec![outer.clone(), inner];
        let mut batch = vec![record];

        clean(&mut batch, &mut remote, &FsLocal);

        assert!(batch[0].is_done());
        assert!(!outer.exists());
        assert!(local_files(&dir).is_empty());
    }

    #[test]
    fn test_directory_shared_with_a_failed_record_stays() {
        let Fixture {
            dir,
            mut remote,
            mut record,
        } = acknowledged();
        let shared = dir.path().join("shared");
        std::fs::create_dir(&shared).unwrap();
        record.directories = vec![shared.clone()];

        let leftover = shared.join("w.xml");
        std::fs::write(&leftover, "<w/>").unwrap();
        remote.put("/in/B.zip.edt", b"zip");
        let mut sibling = TransferRecord::claimed("/in/B.zip", "/in/B.zip.edt");
        let archive = dir.path().join("B.zip");
        std::fs::write(&archive, b"zip").unwrap();
        sibling.destination_path = Some(archive);
        sibling.unpacked.push(leftover.clone());
        sibling.fail(Stage::Dispatch, RecordError::ResponseBody("reset".into()));
        let local = Stubborn {
            refuse: vec![leftover.clone()],
            ..Default::default()
        };
        let mut batch = vec![record, sibling];

        clean(&mut batch, &mut remote, &local);

        // the directory is not a reason to fail the successful record
        assert!(batch[0].is_done());
        assert!(batch[1].is_failed());
        assert!(leftover.exists());
        assert_eq!(local_files(&dir), vec!["shared"]);
        assert!(remote.exists("/in/B.zip.edt"));
    }

    #[test]
    fn test_unclaimed_record_is_left_alone() {
        let mut remote = MemoryRemote::new().with_file("/in/A.zip", b"zip");
        let mut batch = vec![TransferRecord::unclaimed("/in/A.zip", RecordError::Unclaimed)];

        clean(&mut batch, &mut remote, &FsLocal);

        assert_eq!(remote.count(RemoteOp::Remove), 0);
        assert_eq!(batch[0].failed_stage(), Some(Stage::Claim));
    }
}
