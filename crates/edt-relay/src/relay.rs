//! Production wiring of one run: FTP remote, local filesystem, HTTP sink

use std::sync::Arc;
use tracing::{info, info_span};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::PipelineError;
use crate::local::FsLocal;
use crate::pipeline::{Pipeline, RunOutcome};
use crate::remote::FtpRemote;
use crate::sink::HttpSink;

/// Runs the pipeline against the configured endpoints
#[derive(Clone)]
pub struct Relay {
    config: Arc<RelayConfig>,
}

impl Relay {
    pub fn new(config: Arc<RelayConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Execute one complete run. Blocks; call from a blocking thread when
    /// running under tokio.
    pub fn run_once(&self) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        let _enter = span.enter();

        info!("downloading started...");
        let outcome = self.execute(run_id);
        outcome.log_summary();
        outcome
    }

    fn execute(&self, run_id: Uuid) -> RunOutcome {
        let config = &*self.config;

        let sink = match HttpSink::new(&config.sink) {
            Ok(sink) => sink,
            Err(e) => {
                return RunOutcome::aborted(
                    run_id,
                    PipelineError::Connect {
                        target: config.sink.url.to_string(),
                        message: e.to_string(),
                    },
                )
            }
        };

        let mut remote = match FtpRemote::connect(&config.remote) {
            Ok(remote) => remote,
            Err(e) => {
                return RunOutcome::aborted(
                    run_id,
                    PipelineError::Connect {
                        target: config.remote.address(),
                        message: e.to_string(),
                    },
                )
            }
        };

        Pipeline::new(&config.transfer, &mut remote, &FsLocal, &sink).run(run_id)
    }
}
