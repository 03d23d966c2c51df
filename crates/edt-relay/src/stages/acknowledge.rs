//! Acknowledge stage: write `<name>.response` beside each claimed source

use chrono::NaiveDateTime;
use std::io::Write;
use tracing::info;

use super::Step;
use crate::acknowledgment::{local_now, Acknowledgment};
use crate::error::RecordError;
use crate::record::{Stage, TransferRecord};
use crate::remote::{join, parent, RemoteError, RemoteStore};

pub struct Acknowledge<'a> {
    remote: &'a mut dyn RemoteStore,
    clock: fn() -> NaiveDateTime,
}

impl<'a> Acknowledge<'a> {
    pub fn new(remote: &'a mut dyn RemoteStore) -> Self {
        Self {
            remote,
            clock: local_now,
        }
    }

    /// Stamp acknowledgments with `clock` instead of the local wall clock
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    fn write(&mut self, path: &str, ack: &Acknowledgment) -> Result<(), RemoteError> {
        let mut writer = self.remote.create(path)?;
        writer.write_all(ack.as_bytes())?;
        writer.close()
    }
}

impl Step for Acknowledge<'_> {
    const STAGE: Stage = Stage::Acknowledge;

    fn apply(&mut self, record: &mut TransferRecord) -> Result<(), RecordError> {
        let source = record.source_path.as_deref().ok_or(RecordError::Unclaimed)?;
        let ack = Acknowledgment::for_file(&record.source_path_original, (self.clock)());
        let path = join(parent(source), &ack.name);

        self.write(&path, &ack).map_err(|e| RecordError::Acknowledge {
            path: path.clone(),
            source: e,
        })?;

        info!(source = %record.source_path_original, response = %path, "response");
        record.response_path = Some(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, RemoteOp};
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn claimed_remote() -> MemoryRemote {
        MemoryRemote::new().with_file("/in/BRCLS/A.zip.edt", b"zip")
    }

    #[test]
    fn test_writes_response_beside_claimed_source() {
        let mut remote = claimed_remote();
        let observer = remote.clone();
        let mut record = TransferRecord::claimed("/in/BRCLS/A.zip", "/in/BRCLS/A.zip.edt");

        Acknowledge::new(&mut remote)
            .with_clock(noon)
            .apply(&mut record)
            .unwrap();

        assert_eq!(record.response_path.as_deref(), Some("/in/BRCLS/A.zip.response"));
        assert_eq!(
            observer.read("/in/BRCLS/A.zip.response").unwrap(),
            b"A.zip;20240101T120000"
        );
    }

    #[test]
    fn test_existing_response_is_overwritten() {
        let mut remote =
            claimed_remote().with_file("/in/BRCLS/A.zip.response", b"A.zip;20200101T000000");
        let observer = remote.clone();
        let mut record = TransferRecord::claimed("/in/BRCLS/A.zip", "/in/BRCLS/A.zip.edt");

        Acknowledge::new(&mut remote)
            .with_clock(noon)
            .apply(&mut record)
            .unwrap();

        assert_eq!(
            observer.read("/in/BRCLS/A.zip.response").unwrap(),
            b"A.zip;20240101T120000"
        );
    }

    #[test]
    fn test_failures_leave_response_path_unset() {
        for op in [RemoteOp::Create, RemoteOp::Write, RemoteOp::Close] {
            let mut remote = claimed_remote();
            remote.fail(op, "/in/BRCLS/A.zip.response");
            let mut record = TransferRecord::claimed("/in/BRCLS/A.zip", "/in/BRCLS/A.zip.edt");

            let err = Acknowledge::new(&mut remote)
                .with_clock(noon)
                .apply(&mut record)
                .unwrap_err();

            assert!(matches!(err, RecordError::Acknowledge { .. }), "{:?}", op);
            assert!(record.response_path.is_none(), "{:?}", op);
        }
    }
}
