//! FTP-backed remote store
//!
//! One [`FtpRemote`] wraps one authenticated control connection for the
//! duration of a run. Every operation is a blocking round trip; callers that
//! live on an async runtime should move the whole run onto a blocking thread.
//!
//! | capability | FTP command |
//! |---|---|
//! | walk | recursive `LIST` |
//! | stat | `SIZE` |
//! | rename | `RNFR` / `RNTO` |
//! | open | `RETR` |
//! | create | `STOR` (on close) |
//! | remove | `DELE` |

use std::io::{Cursor, Read, Write};
use std::net::ToSocketAddrs;
use suppaftp::types::FileType;
use suppaftp::{FtpStream, Mode};
use tracing::{debug, warn};

use super::{join, RemoteEntry, RemoteError, RemoteResult, RemoteStore, RemoteWriter};
use crate::config::RemoteSettings;

/// Remote store over a single FTP session
pub struct FtpRemote {
    stream: FtpStream,
}

impl FtpRemote {
    /// Connect, log in and switch to binary transfers
    pub fn connect(settings: &RemoteSettings) -> RemoteResult<Self> {
        let address = (settings.host.as_str(), settings.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                RemoteError::Failed(format!("cannot resolve {}:{}", settings.host, settings.port))
            })?;

        debug!("Connecting to FTP server: {}", address);
        let mut stream = FtpStream::connect_timeout(address, settings.connect_timeout)?;

        // Extended passive mode survives NAT between the relay and the server
        stream.set_mode(Mode::ExtendedPassive);

        debug!("Logging in as: {}", settings.user);
        stream.login(settings.user.as_str(), settings.password.expose())?;
        stream.transfer_type(FileType::Binary)?;

        Ok(Self { stream })
    }
}

impl Drop for FtpRemote {
    fn drop(&mut self) {
        if let Err(e) = self.stream.quit() {
            debug!("FTP session not closed gracefully: {}", e);
        }
    }
}

impl RemoteStore for FtpRemote {
    fn walk(&mut self, root: &str) -> RemoteResult<Vec<RemoteEntry>> {
        let root = if root.len() > 1 { root.trim_end_matches('/') } else { root };
        let mut entries = Vec::new();
        let mut pending = vec![root.to_string()];

        while let Some(dir) = pending.pop() {
            let lines = self.stream.list(Some(dir.as_str()))?;
            for line in &lines {
                let Some(item) = ListLine::parse(line) else {
                    warn!("Ignoring unparseable LIST line in {}: {}", dir, line);
                    continue;
                };
                if item.name == "." || item.name == ".." {
                    continue;
                }
                let path = join(&dir, &item.name);
                if item.is_dir {
                    pending.push(path.clone());
                    entries.push(RemoteEntry::dir(path));
                } else {
                    entries.push(RemoteEntry::file(path, item.size));
                }
            }
        }

        Ok(entries)
    }

    fn stat(&mut self, path: &str) -> RemoteResult<RemoteEntry> {
        let size = self.stream.size(path)?;
        Ok(RemoteEntry::file(path, Some(size as u64)))
    }

    fn rename(&mut self, from: &str, to: &str) -> RemoteResult<()> {
        self.stream.rename(from, to)?;
        Ok(())
    }

    fn open(&mut self, path: &str) -> RemoteResult<Box<dyn Read + '_>> {
        let buffer = self.stream.retr_as_buffer(path)?;
        Ok(Box::new(buffer))
    }

    fn create(&mut self, path: &str) -> RemoteResult<Box<dyn RemoteWriter + '_>> {
        Ok(Box::new(FtpUpload {
            stream: &mut self.stream,
            path: path.to_string(),
            buffer: Vec::new(),
        }))
    }

    fn remove(&mut self, path: &str) -> RemoteResult<()> {
        self.stream.rm(path)?;
        Ok(())
    }
}

/// Pending `STOR`: bytes are buffered and uploaded when the writer closes
struct FtpUpload<'a> {
    stream: &'a mut FtpStream,
    path: String,
    buffer: Vec<u8>,
}

impl Write for FtpUpload<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl RemoteWriter for FtpUpload<'_> {
    fn close(self: Box<Self>) -> RemoteResult<()> {
        let FtpUpload {
            stream,
            path,
            buffer,
        } = *self;
        let written = stream.put_file(&path, &mut Cursor::new(buffer))?;
        debug!("Stored {} ({} bytes)", path, written);
        Ok(())
    }
}

/// A parsed `LIST` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListLine {
    pub name: String,
    pub is_dir: bool,
    pub size: Option<u64>,
}

impl ListLine {
    /// Parse one `LIST` line in Unix (`ls -l`) or DOS/IIS layout
    ///
    /// `-rw-r--r--   1 ftp ftp  1234 Jan 15 12:00 A file.zip`
    /// `01-15-24  12:00PM       <DIR>          archive`
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end();
        let first = line.split_whitespace().next()?;
        if first.starts_with(|c: char| c.is_ascii_digit()) {
            Self::parse_dos(line)
        } else {
            Self::parse_unix(line)
        }
    }

    fn parse_unix(line: &str) -> Option<Self> {
        let (fields, name) = split_fields(line, 8)?;
        let kind = fields[0].chars().next()?;
        // symlinks are listed as "name -> target"
        let name = if kind == 'l' {
            name.split(" -> ").next().unwrap_or(name)
        } else {
            name
        };
        Some(Self {
            name: name.to_string(),
            is_dir: kind == 'd',
            size: fields[4].parse().ok(),
        })
    }

    fn parse_dos(line: &str) -> Option<Self> {
        let (fields, name) = split_fields(line, 3)?;
        let is_dir = fields[2].eq_ignore_ascii_case("<DIR>");
        Some(Self {
            name: name.to_string(),
            is_dir,
            size: if is_dir { None } else { fields[2].parse().ok() },
        })
    }
}

/// Split off `count` whitespace-separated fields and return them together
/// with the untouched remainder, so names may contain spaces.
fn split_fields(line: &str, count: usize) -> Option<(Vec<&str>, &str)> {
    let mut rest = line;
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace)?;
        fields.push(&rest[..end]);
        rest = &rest[end..];
    }
    let name = rest.trim_start();
    if name.is_empty() {
        None
    } else {
        Some((fields, name))
    }
}
