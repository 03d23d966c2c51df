//! Run orchestration
//!
//! One run scans and claims a batch, then drives it through Download,
//! Unpack, Dispatch, Acknowledge and Clean. Each stage finishes the whole
//! batch before the next one starts. A fatal dispatch failure ends the run
//! right away: nothing is acknowledged or cleaned, so every claimed source
//! stays on the remote side for the next investigation.

use chrono::NaiveDateTime;
use edt_common::exit_code;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::acknowledgment::local_now;
use crate::config::TransferSettings;
use crate::error::PipelineError;
use crate::local::{LocalClaims, LocalStore};
use crate::record::TransferRecord;
use crate::remote::RemoteStore;
use crate::scanner;
use crate::sink::Sink;
use crate::stages::{self, run_stage, Acknowledge, Dispatch, Download, Unpack};

/// Result of one run
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    /// Every record of the batch, in scan order
    pub records: Vec<TransferRecord>,
    /// Set when the run was aborted as a whole
    pub error: Option<PipelineError>,
}

impl RunOutcome {
    /// Outcome of a run that never got to scan
    pub fn aborted(run_id: Uuid, error: PipelineError) -> Self {
        Self {
            run_id,
            records: Vec::new(),
            error: Some(error),
        }
    }

    pub fn claimed(&self) -> usize {
        self.records.len()
    }

    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.is_done()).count()
    }

    pub fn failed(&self) -> usize {
        self.records.iter().filter(|r| r.is_failed()).count()
    }

    /// Per-record failures are reported in logs only; the process fails
    /// when the run itself was aborted.
    pub fn exit_code(&self) -> u8 {
        match self.error {
            Some(_) => exit_code::CONNECTION,
            None => exit_code::OK,
        }
    }

    pub fn log_summary(&self) {
        match &self.error {
            Some(e) => error!(
                claimed = self.claimed(),
                succeeded = self.succeeded(),
                failed = self.failed(),
                error = %e,
                "run aborted"
            ),
            None if self.failed() > 0 => warn!(
                claimed = self.claimed(),
                succeeded = self.succeeded(),
                failed = self.failed(),
                "run finished with failures"
            ),
            None => info!(
                claimed = self.claimed(),
                succeeded = self.succeeded(),
                "run finished"
            ),
        }
    }
}

/// The pipeline wired to its collaborators for a single run
pub struct Pipeline<'a> {
    settings: &'a TransferSettings,
    remote: &'a mut dyn RemoteStore,
    local: &'a dyn LocalStore,
    sink: &'a dyn Sink,
    clock: fn() -> NaiveDateTime,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a TransferSettings,
        remote: &'a mut dyn RemoteStore,
        local: &'a dyn LocalStore,
        sink: &'a dyn Sink,
    ) -> Self {
        Self {
            settings,
            remote,
            local,
            sink,
            clock: local_now,
        }
    }

    /// Clock used for acknowledgment timestamps
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn run(mut self, run_id: Uuid) -> RunOutcome {
        let mut batch = match scanner::scan(self.settings, &mut *self.remote) {
            Ok(batch) => batch,
            Err(source) => {
                return RunOutcome::aborted(
                    run_id,
                    PipelineError::Scan {
                        path: self.settings.source_path.clone(),
                        source,
                    },
                )
            }
        };

        if batch.is_empty() {
            info!(source = %self.settings.source_path, "nothing to transfer");
            return RunOutcome {
                run_id,
                records: batch,
                error: None,
            };
        }

        let error = self.process(&mut batch).err();
        RunOutcome {
            run_id,
            records: batch,
            error,
        }
    }

    fn process(mut self, batch: &mut [TransferRecord]) -> Result<(), PipelineError> {
        let destination = self.settings.destination_path.as_path();
        let mut claims = LocalClaims::new();

        run_stage(
            &mut Download::new(&mut *self.remote, self.local, destination, &mut claims),
            batch,
        )?;
        run_stage(&mut Unpack::new(destination, &mut claims), batch)?;
        run_stage(&mut Dispatch::new(self.sink, self.local), batch)?;
        run_stage(
            &mut Acknowledge::new(&mut *self.remote).with_clock(self.clock),
            batch,
        )?;
        stages::clean(batch, self.remote, self.local);

        Ok(())
    }
}
