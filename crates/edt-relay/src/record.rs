//! Transfer Record: the per-file state threaded through every stage

use std::fmt;
use std::path::PathBuf;

use crate::error::RecordError;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Claim,
    Download,
    Unpack,
    Dispatch,
    Acknowledge,
    Clean,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Claim => "claim",
            Stage::Download => "download",
            Stage::Unpack => "unpack",
            Stage::Dispatch => "dispatch",
            Stage::Acknowledge => "acknowledge",
            Stage::Clean => "clean",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a record so far
#[derive(Debug)]
pub enum RecordStatus {
    /// Every stage up to and including this one succeeded
    Ok(Stage),
    /// `stage` failed; later stages only clean up
    Failed { stage: Stage, reason: RecordError },
}

/// One source file discovered in a run
#[derive(Debug)]
pub struct TransferRecord {
    /// Remote path as first observed
    pub source_path_original: String,
    /// Remote path after the claim rename
    pub source_path: Option<String>,
    /// Local copy of the archive
    pub destination_path: Option<PathBuf>,
    /// Local member files, in archive order
    pub unpacked: Vec<PathBuf>,
    /// Local directories created while unpacking, parents first
    pub directories: Vec<PathBuf>,
    /// Remote acknowledgment, once fully written
    pub response_path: Option<String>,
    status: RecordStatus,
}

impl TransferRecord {
    /// Record whose source was renamed to `claimed`
    pub fn claimed(original: impl Into<String>, claimed: impl Into<String>) -> Self {
        Self {
            source_path_original: original.into(),
            source_path: Some(claimed.into()),
            destination_path: None,
            unpacked: Vec::new(),
            directories: Vec::new(),
            response_path: None,
            status: RecordStatus::Ok(Stage::Claim),
        }
    }

    /// Record whose claim failed
    pub fn unclaimed(original: impl Into<String>, reason: RecordError) -> Self {
        Self {
            source_path_original: original.into(),
            source_path: None,
            destination_path: None,
            unpacked: Vec::new(),
            directories: Vec::new(),
            response_path: None,
            status: RecordStatus::Failed {
                stage: Stage::Claim,
                reason,
            },
        }
    }

    pub fn status(&self) -> &RecordStatus {
        &self.status
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RecordStatus::Failed { .. })
    }

    pub fn error(&self) -> Option<&RecordError> {
        match &self.status {
            RecordStatus::Ok(_) => None,
            RecordStatus::Failed { reason, .. } => Some(reason),
        }
    }

    /// Stage that set the current error
    pub fn failed_stage(&self) -> Option<Stage> {
        match self.status {
            RecordStatus::Ok(_) => None,
            RecordStatus::Failed { stage, .. } => Some(stage),
        }
    }

    /// True once Clean removed the claimed source of a successful record
    pub fn is_done(&self) -> bool {
        matches!(self.status, RecordStatus::Ok(Stage::Clean))
    }

    /// Mark `stage` as completed. Has no effect on a failed record.
    pub fn advance(&mut self, stage: Stage) {
        if let RecordStatus::Ok(_) = self.status {
            self.status = RecordStatus::Ok(stage);
        }
    }

    /// Set or overwrite the error. A failed record never becomes Ok again.
    pub fn fail(&mut self, stage: Stage, reason: RecordError) {
        self.status = RecordStatus::Failed { stage, reason };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claimed_record_advances() {
        let mut record = TransferRecord::claimed("/in/A.zip", "/in/A.zip.edt");
        assert!(!record.is_failed());

        record.advance(Stage::Download);
        record.advance(Stage::Clean);
        assert!(record.is_done());
        assert!(record.error().is_none());
    }

    #[test]
    fn test_error_is_sticky() {
        let mut record = TransferRecord::claimed("/in/A.zip", "/in/A.zip.edt");
        record.fail(Stage::Unpack, RecordError::EmptyArchive(PathBuf::from("A.zip")));

        record.advance(Stage::Dispatch);
        record.advance(Stage::Clean);

        assert!(record.is_failed());
        assert!(!record.is_done());
        assert_eq!(record.failed_stage(), Some(Stage::Unpack));
    }

    #[test]
    fn test_fail_overwrites_reason() {
        let mut record = TransferRecord::claimed("/in/A.zip", "/in/A.zip.edt");
        record.fail(Stage::Unpack, RecordError::EmptyArchive(PathBuf::from("A.zip")));
        record.fail(
            Stage::Clean,
            RecordError::Compensation {
                path: "/in/A.zip.response".into(),
                reason: "permission denied".into(),
            },
        );

        assert_eq!(record.failed_stage(), Some(Stage::Clean));
        assert!(matches!(
            record.error(),
            Some(RecordError::Compensation { .. })
        ));
    }

    #[test]
    fn test_unclaimed_record_has_no_source_path() {
        let record = TransferRecord::unclaimed("/in/A.zip", RecordError::Unclaimed);
        assert!(record.source_path.is_none());
        assert_eq!(record.failed_stage(), Some(Stage::Claim));
    }
}
