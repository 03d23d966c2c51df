//! Remote scanner and claimer
//!
//! A candidate is a non-directory entry below the source directory whose
//! name matches the file mask. It is only taken once its producer has
//! written the zero-length fence `<name><fence suffix>` next to it. Taking a
//! candidate means renaming it to `<name>.edt`, after which it no longer
//! matches the mask and no other run can pick it up again. The fence is
//! removed once the rename has succeeded.

use tracing::{debug, error, info};

use crate::config::TransferSettings;
use crate::constants::CLAIM_EXTENSION;
use crate::error::RecordError;
use crate::record::{Stage, TransferRecord};
use crate::remote::{RemoteResult, RemoteStore};

/// Walk the source directory and claim every fenced candidate
///
/// Returns one record per candidate whose fence was present, whether or not
/// its claim succeeded, in walk order. Only a failing walk is an error.
pub fn scan(
    settings: &TransferSettings,
    remote: &mut dyn RemoteStore,
) -> RemoteResult<Vec<TransferRecord>> {
    let entries = remote.walk(&settings.source_path)?;
    let mut batch = Vec::new();

    for entry in entries {
        if entry.is_dir || !settings.file_mask.matches(&entry.name) {
            continue;
        }

        let fence = format!("{}{}", entry.path, settings.fence_suffix);
        if remote.stat(&fence).is_err() {
            debug!(source = %entry.path, "fence not present yet, skipping");
            continue;
        }

        batch.push(claim(remote, &entry.path, &fence));
    }

    Ok(batch)
}

fn claim(remote: &mut dyn RemoteStore, path: &str, fence: &str) -> TransferRecord {
    let claimed = format!("{}{}", path, CLAIM_EXTENSION);

    if let Err(source) = remote.rename(path, &claimed) {
        let reason = RecordError::Claim {
            path: path.to_string(),
            claimed,
            source,
        };
        error!(source = %path, error = %reason, "claim failed");
        return TransferRecord::unclaimed(path, reason);
    }
    info!(source = %path, claimed = %claimed, "claimed");

    let mut record = TransferRecord::claimed(path, claimed);
    if let Err(source) = remote.remove(fence) {
        let reason = RecordError::Fence {
            path: fence.to_string(),
            source,
        };
        error!(source = %path, error = %reason, "fence removal failed");
        record.fail(Stage::Claim, reason);
    }
    record
}
