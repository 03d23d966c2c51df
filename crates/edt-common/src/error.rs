//! Error types shared by EDT components

use thiserror::Error;

/// Result type alias for configuration and bootstrap operations
pub type Result<T> = std::result::Result<T, EdtError>;

/// Errors raised while preparing a process to run
#[derive(Error, Debug)]
pub enum EdtError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),

    #[error("Invalid value for {setting}: {message}")]
    InvalidSetting { setting: String, message: String },
}

impl EdtError {
    pub fn invalid(setting: impl Into<String>, message: impl std::fmt::Display) -> Self {
        EdtError::InvalidSetting {
            setting: setting.into(),
            message: message.to_string(),
        }
    }
}

/// Process exit codes shared by the EDT binaries
pub mod exit_code {
    pub const OK: u8 = 0;
    /// The remote endpoint could not be reached, or a run aborted as a whole
    pub const CONNECTION: u8 = 1;
    pub const CONFIGURATION: u8 = 2;
}
