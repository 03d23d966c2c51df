//! Naming conventions shared with the producers and consumers of the remote
//! directory

/// Appended to a source file name when a run claims it
pub const CLAIM_EXTENSION: &str = ".edt";

/// Appended to a source file name to form its acknowledgment
pub const RESPONSE_SUFFIX: &str = ".response";

/// Extension (without dot, compared case-insensitively) the unpack stage accepts
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Multipart field names are this prefix followed by the member's ordinal
pub const FORM_FIELD_PREFIX: &str = "file_field";

/// `chrono` format of the acknowledgment timestamp, e.g. `20240101T120000`
pub const ACK_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Content of the heartbeat file written on every scheduler tick
pub const HEARTBEAT_CONTENT: &str = "alive\n";
