//! EDT Common Library
//!
//! Error types, exit codes and the logging bootstrap shared by the EDT
//! workspace members.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

pub use error::{exit_code, EdtError, Result};
