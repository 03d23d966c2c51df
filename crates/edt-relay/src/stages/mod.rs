//! Pipeline stages
//!
//! Download, Unpack, Dispatch and Acknowledge implement [`Step`]: a
//! per-record action that either succeeds or explains why it failed.
//! [`run_stage`] maps a step over the batch and owns the sticky-error rule,
//! so no step ever sees a record that already failed.
//!
//! Clean is different: it visits every record, failed or not, and is run with
//! [`clean::clean`].

pub mod acknowledge;
pub mod clean;
pub mod dispatch;
pub mod download;
pub mod unpack;

use tracing::{debug, error};

use crate::error::{PipelineError, RecordError};
use crate::record::{Stage, TransferRecord};

pub use acknowledge::Acknowledge;
pub use clean::clean;
pub use dispatch::Dispatch;
pub use download::Download;
pub use unpack::Unpack;

/// One stage's action on one record
pub trait Step {
    const STAGE: Stage;

    fn apply(&mut self, record: &mut TransferRecord) -> Result<(), RecordError>;
}

/// Apply `step` to every record that has not failed yet
///
/// A failing record is marked and the loop moves on to its siblings, unless
/// the failure is fatal: then the remaining records are left untouched and
/// the run is aborted.
pub fn run_stage<S: Step>(
    step: &mut S,
    batch: &mut [TransferRecord],
) -> Result<(), PipelineError> {
    for record in batch.iter_mut() {
        if record.is_failed() {
            debug!(
                source = %record.source_path_original,
                stage = %S::STAGE,
                "skipping failed record"
            );
            continue;
        }

        match step.apply(record) {
            Ok(()) => record.advance(S::STAGE),
            Err(reason) => {
                error!(
                    source = %record.source_path_original,
                    stage = %S::STAGE,
                    error = %reason,
                    "stage failed"
                );
                let fatal = reason.is_fatal().then(|| reason.to_string());
                record.fail(S::STAGE, reason);
                if let Some(message) = fatal {
                    return Err(PipelineError::Dispatch {
                        path: record.source_path_original.clone(),
                        message,
                    });
                }
            }
        }
    }
    Ok(())
}
