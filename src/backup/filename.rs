//! Remote backup file names.
//!
//! `bookmarks_YYYYMMDD_HHMMSS_<replica>_<count>_v<revision>.json[.gz]`, with
//! the timestamp in UTC. Everything a listing needs to know about a backup is
//! carried in its name, so status and window checks never download a file.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::{SyncError, SyncResult};

pub const FILE_PREFIX: &str = "bookmarks_";
const COMPRESSED_SUFFIX: &str = ".json.gz";
const PLAIN_SUFFIX: &str = ".json";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Metadata encoded in a backup file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFileRecord {
    pub timestamp: DateTime<Utc>,
    /// Sanitized replica label, `[A-Za-z0-9-]+`.
    pub replica_label: String,
    pub bookmark_count: usize,
    /// Starts at 1 and grows each time the file is replaced within the window.
    pub revision: u32,
    pub compressed: bool,
}

impl BackupFileRecord {
    pub fn new(timestamp: DateTime<Utc>, replica_label: &str, bookmark_count: usize, compressed: bool) -> Self {
        Self {
            timestamp: timestamp.with_nanosecond(0).unwrap_or(timestamp),
            replica_label: sanitize_label(replica_label),
            bookmark_count,
            revision: 1,
            compressed,
        }
    }

    /// Parses a file name. Names that would not be generated verbatim by
    /// [`BackupFileRecord::file_name`] are rejected.
    pub fn parse(name: &str) -> SyncResult<Self> {
        let invalid = || SyncError::InvalidFileName(name.to_string());

        let body = name.strip_prefix(FILE_PREFIX).ok_or_else(invalid)?;
        let (body, compressed) = if let Some(body) = body.strip_suffix(COMPRESSED_SUFFIX) {
            (body, true)
        } else if let Some(body) = body.strip_suffix(PLAIN_SUFFIX) {
            (body, false)
        } else {
            return Err(invalid());
        };

        let parts: Vec<&str> = body.split('_').collect();
        if parts.len() < 5 {
            return Err(invalid());
        }

        let stamp = format!("{}_{}", parts[0], parts[1]);
        let timestamp = NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT)
            .map_err(|_| invalid())?
            .and_utc();

        let last = parts.len() - 1;
        let replica_label = parts[2..last - 1].join("_");
        if replica_label.is_empty() || sanitize_label(&replica_label) != replica_label {
            return Err(invalid());
        }
        let bookmark_count = parts[last - 1].parse::<usize>().map_err(|_| invalid())?;
        let revision = parts[last]
            .strip_prefix('v')
            .and_then(|rev| rev.parse::<u32>().ok())
            .filter(|rev| *rev > 0)
            .ok_or_else(invalid)?;

        let record = Self {
            timestamp,
            replica_label,
            bookmark_count,
            revision,
            compressed,
        };
        if record.file_name() != name {
            return Err(invalid());
        }
        Ok(record)
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}{}_{}_{}_v{}{}",
            FILE_PREFIX,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.replica_label,
            self.bookmark_count,
            self.revision,
            if self.compressed { COMPRESSED_SUFFIX } else { PLAIN_SUFFIX }
        )
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Successor written when this file is replaced within the backup window.
    pub fn next_revision(&self, timestamp: DateTime<Utc>, bookmark_count: usize, compressed: bool) -> Self {
        Self {
            revision: self.revision + 1,
            ..Self::new(timestamp, &self.replica_label, bookmark_count, compressed)
        }
    }
}

impl FromStr for BackupFileRecord {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BackupFileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Maps a free-form replica name onto `[A-Za-z0-9-]+`.
pub fn sanitize_label(label: &str) -> String {
    let sanitized: String = label
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}
