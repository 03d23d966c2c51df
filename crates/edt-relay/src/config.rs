//! Relay configuration
//!
//! Everything is read from the environment, optionally seeded from a `.env`
//! file. Values are validated once at startup so a running scheduler never
//! meets a malformed mask, URL or schedule.

use cron::Schedule;
use edt_common::{EdtError, Result};
use globset::{GlobBuilder, GlobMatcher};
use reqwest::Url;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Default FTP control port.
pub const DEFAULT_FTP_PORT: u16 = 21;

/// Default FTP connect timeout in seconds.
pub const DEFAULT_FTP_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default case-insensitive mask for candidate files.
pub const DEFAULT_FILE_MASK: &str = "*.zip";

/// Default completion fence suffix.
pub const DEFAULT_FENCE_SUFFIX: &str = "_0";

/// Default per-dispatch request timeout in seconds.
pub const DEFAULT_SINK_TIMEOUT_SECS: u64 = 20;

/// Default schedule: every minute, on the minute.
pub const DEFAULT_SCHEDULE: &str = "0 */1 * * * *";

/// Default heartbeat file, relative to the working directory.
pub const DEFAULT_HEARTBEAT_FILE: &str = "alive.txt";

/// A credential that never shows up in `Debug` output
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Remote file source
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret,
    pub connect_timeout: Duration,
}

impl RemoteSettings {
    /// `host:port`, for logs and errors
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Case-insensitive glob over base file names
#[derive(Debug, Clone)]
pub struct FileMask {
    pattern: String,
    matcher: GlobMatcher,
}

impl FileMask {
    pub fn new(pattern: &str) -> std::result::Result<Self, globset::Error> {
        let matcher = GlobBuilder::new(&pattern.to_lowercase())
            .case_insensitive(true)
            .literal_separator(true)
            .build()?
            .compile_matcher();
        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.matcher.is_match(name.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// What to pick up and where to put it
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Remote directory walked for candidates
    pub source_path: String,
    /// Local directory receiving archives and their members
    pub destination_path: PathBuf,
    pub file_mask: FileMask,
    pub fence_suffix: String,
}

impl TransferSettings {
    pub fn new(
        source_path: impl Into<String>,
        destination_path: impl Into<PathBuf>,
        file_mask: FileMask,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            destination_path: destination_path.into(),
            file_mask,
            fence_suffix: DEFAULT_FENCE_SUFFIX.to_string(),
        }
    }

    pub fn with_fence_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.fence_suffix = suffix.into();
        self
    }
}

/// Processing sink endpoint
#[derive(Debug, Clone)]
pub struct SinkSettings {
    pub url: Url,
    pub timeout: Duration,
}

/// Complete, validated relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub remote: RemoteSettings,
    pub transfer: TransferSettings,
    pub sink: SinkSettings,
    pub schedule: Schedule,
    pub heartbeat_file: PathBuf,
}

impl RelayConfig {
    /// Load `.env` if present, read the environment and prepare the local
    /// destination directory
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_env()?;
        std::fs::create_dir_all(&config.transfer.destination_path)?;

        Ok(config)
    }

    /// Read and validate the `EDT_*` environment variables
    pub fn from_env() -> Result<Self> {
        let remote = RemoteSettings {
            host: required("EDT_FTP_HOST")?,
            port: parsed("EDT_FTP_PORT", DEFAULT_FTP_PORT)?,
            user: required("EDT_FTP_USER")?,
            password: password()?,
            connect_timeout: Duration::from_secs(DEFAULT_FTP_CONNECT_TIMEOUT_SECS),
        };

        let mask = optional("EDT_FILE_MASK").unwrap_or_else(|| DEFAULT_FILE_MASK.to_string());
        let file_mask =
            FileMask::new(&mask).map_err(|e| EdtError::invalid("EDT_FILE_MASK", e))?;

        let mut transfer = TransferSettings::new(
            required("EDT_SOURCE_PATH")?,
            required("EDT_DESTINATION_PATH")?,
            file_mask,
        );
        if let Some(suffix) = optional("EDT_FENCE_SUFFIX") {
            transfer = transfer.with_fence_suffix(suffix);
        }

        let sink = SinkSettings {
            url: sink_url(&required("EDT_SINK_URL")?)?,
            timeout: Duration::from_secs(parsed(
                "EDT_SINK_TIMEOUT_SECS",
                DEFAULT_SINK_TIMEOUT_SECS,
            )?),
        };

        let expression = optional("EDT_SCHEDULE").unwrap_or_else(|| DEFAULT_SCHEDULE.to_string());
        let schedule =
            Schedule::from_str(&expression).map_err(|e| EdtError::invalid("EDT_SCHEDULE", e))?;

        let config = Self {
            remote,
            transfer,
            sink,
            schedule,
            heartbeat_file: optional("EDT_HEARTBEAT_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HEARTBEAT_FILE)),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.remote.port == 0 {
            return Err(EdtError::invalid("EDT_FTP_PORT", "port must be greater than 0"));
        }
        if self.sink.timeout.is_zero() {
            return Err(EdtError::invalid(
                "EDT_SINK_TIMEOUT_SECS",
                "timeout must be greater than 0",
            ));
        }
        if self.transfer.fence_suffix.is_empty() {
            return Err(EdtError::invalid("EDT_FENCE_SUFFIX", "suffix cannot be empty"));
        }
        if self.transfer.destination_path.is_file() {
            return Err(EdtError::invalid(
                "EDT_DESTINATION_PATH",
                format!("{} is a file", self.transfer.destination_path.display()),
            ));
        }
        Ok(())
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &str) -> Result<String> {
    optional(name).ok_or_else(|| EdtError::MissingSetting(name.to_string()))
}

fn parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match optional(name) {
        Some(raw) => raw.trim().parse().map_err(|e| EdtError::invalid(name, e)),
        None => Ok(default),
    }
}

/// `EDT_FTP_PASSWORD` wins over `EDT_FTP_PASSWORD_FILE`
fn password() -> Result<Secret> {
    if let Some(password) = std::env::var("EDT_FTP_PASSWORD").ok().filter(|p| !p.is_empty()) {
        return Ok(Secret::new(password));
    }
    let file = required("EDT_FTP_PASSWORD_FILE").map_err(|_| {
        EdtError::MissingSetting("EDT_FTP_PASSWORD or EDT_FTP_PASSWORD_FILE".into())
    })?;
    read_password_file(Path::new(&file))
}

fn read_password_file(path: &Path) -> Result<Secret> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        EdtError::invalid("EDT_FTP_PASSWORD_FILE", format!("{}: {}", path.display(), e))
    })?;
    let password = contents.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(EdtError::invalid(
            "EDT_FTP_PASSWORD_FILE",
            format!("{} is empty", path.display()),
        ));
    }
    Ok(Secret::new(password))
}

fn sink_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| EdtError::invalid("EDT_SINK_URL", e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(EdtError::invalid(
            "EDT_SINK_URL",
            format!("unsupported scheme '{}'", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_is_case_insensitive() {
        let mask = FileMask::new("*.ZIP").unwrap();
        assert!(mask.matches("KV1212_T_EDT_Bonds180808.zip"));
        assert!(mask.matches("A.Zip"));
        assert!(!mask.matches("A.zip_0"));
        assert!(!mask.matches("A.zip.edt"));
        assert!(!mask.matches("A.zip.response"));
    }

    #[test]
    fn test_invalid_mask() {
        assert!(FileMask::new("[*.zip").is_err());
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{:?}", secret), "Secret(***)");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_sink_url_scheme() {
        assert!(sink_url("http://localhost:8080/upload").is_ok());
        assert!(sink_url("https://gateway.example.com/edt").is_ok());
        assert!(sink_url("ftp://gateway.example.com/edt").is_err());
        assert!(sink_url("not a url").is_err());
    }

    #[test]
    fn test_default_schedule_parses() {
        assert!(Schedule::from_str(DEFAULT_SCHEDULE).is_ok());
    }

    #[test]
    fn test_password_file_strips_trailing_newline() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("password");
        std::fs::write(&path, "s3cret\n").unwrap();

        assert_eq!(read_password_file(&path).unwrap().expose(), "s3cret");
    }

    #[test]
    fn test_empty_password_file_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("password");
        std::fs::write(&path, "\n").unwrap();

        assert!(read_password_file(&path).is_err());
    }
}
