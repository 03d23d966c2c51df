//! EDT Relay Library
//!
//! Polls a remote directory for completed batch archives and forwards their
//! contents to a processing endpoint.
//!
//! # Run lifecycle
//!
//! 1. **Scan**: claim every fenced candidate by renaming it to `<name>.edt`
//! 2. **Download**: copy each claimed archive to the local destination
//! 3. **Unpack**: expand the archive next to it
//! 4. **Dispatch**: post all members as one multipart request
//! 5. **Acknowledge**: write `<name>.response` beside the claimed source
//! 6. **Clean**: remove local artifacts, then either the claimed source
//!    (success) or the acknowledgment (failure)
//!
//! A failure in one record never stops its siblings, except for a
//! processing sink that cannot be reached at all.
//!
//! # Example
//!
//! ```no_run
//! use edt_relay::config::RelayConfig;
//! use edt_relay::relay::Relay;
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let relay = Relay::new(Arc::new(RelayConfig::load()?));
//!     let outcome = relay.run_once();
//!     println!("{} claimed, {} failed", outcome.claimed(), outcome.failed());
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod acknowledgment;
pub mod archive;
pub mod config;
pub mod constants;
pub mod error;
pub mod local;
pub mod pipeline;
pub mod record;
pub mod relay;
pub mod remote;
pub mod scanner;
pub mod scheduler;
pub mod sink;
pub mod stages;

pub use error::{PipelineError, RecordError};
pub use pipeline::{Pipeline, RunOutcome};
pub use record::{Stage, TransferRecord};
