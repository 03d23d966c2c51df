//! Dispatch stage: post every unpacked member of a record to the processing
//! sink in one multipart request
//!
//! A transport failure is returned as [`RecordError::Transport`], which is
//! fatal and stops the batch. A rejected or unreadable response only fails
//! the record at hand.

use std::io::Read;
use tracing::{info, warn};

use super::Step;
use crate::constants::FORM_FIELD_PREFIX;
use crate::error::RecordError;
use crate::local::LocalStore;
use crate::record::{Stage, TransferRecord};
use crate::remote::base_name;
use crate::sink::{FormFile, Sink, SinkError};

pub struct Dispatch<'a> {
    sink: &'a dyn Sink,
    local: &'a dyn LocalStore,
}

impl<'a> Dispatch<'a> {
    pub fn new(sink: &'a dyn Sink, local: &'a dyn LocalStore) -> Self {
        Self { sink, local }
    }

    fn payload(&self, record: &TransferRecord) -> Result<Vec<FormFile>, RecordError> {
        record
            .unpacked
            .iter()
            .enumerate()
            .map(|(index, path)| -> Result<FormFile, RecordError> {
                let mut contents = Vec::new();
                self.local
                    .open(path)
                    .and_then(|mut file| file.read_to_end(&mut contents))
                    .map_err(|e| RecordError::Payload {
                        path: path.clone(),
                        source: e,
                    })?;
                Ok(FormFile {
                    field: format!("{}{}", FORM_FIELD_PREFIX, index),
                    file_name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    contents,
                })
            })
            .collect()
    }
}

impl Step for Dispatch<'_> {
    const STAGE: Stage = Stage::Dispatch;

    fn apply(&mut self, record: &mut TransferRecord) -> Result<(), RecordError> {
        let files = self.payload(record)?;
        let count = files.len();

        let reply = self.sink.post(files).map_err(|e| match e {
            SinkError::Transport(message) => RecordError::Transport(message),
            SinkError::ResponseBody(message) => RecordError::ResponseBody(message),
        })?;

        if reply.is_rejection() {
            warn!(
                source = %record.source_path_original,
                status = reply.status,
                body = %reply.body,
                "processing sink rejected payload"
            );
            return Err(RecordError::Rejected {
                status: reply.status,
                body: reply.body,
            });
        }

        info!(
            source = %record.source_path_original,
            files = count,
            status = reply.status,
            "sent files from {}",
            base_name(&record.source_path_original)
        );
        Ok(())
    }
}
