//! Acknowledgment artifacts written back beside a claimed source

use chrono::{Local, NaiveDateTime};

use crate::constants::{ACK_TIMESTAMP_FORMAT, RESPONSE_SUFFIX};
use crate::remote::base_name;

/// Name and content of one acknowledgment file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    /// `<base name><RESPONSE_SUFFIX>`
    pub name: String,
    /// `<base name>;<yyyyMMdd>T<HHmmss>`
    pub content: String,
}

impl Acknowledgment {
    /// Acknowledgment for `source` stamped with `at`. Only the base name of
    /// `source` is used.
    pub fn for_file(source: &str, at: NaiveDateTime) -> Self {
        let file_name = base_name(source);
        Self {
            name: format!("{}{}", file_name, RESPONSE_SUFFIX),
            content: format!("{};{}", file_name, at.format(ACK_TIMESTAMP_FORMAT)),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }
}

/// Current wall-clock time without an offset
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}
