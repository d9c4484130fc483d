//! The durable `File` entity and its status state machine.
//!
//! Grounded on `lega/utils/db.py` (the `local_ega.files` row shape) from the
//! original source this pipeline replaces, and styled after the plain
//! config/record structs in `vector-buffers::variants::disk_v2::record`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of a `File` row in its lifecycle.
///
/// Transitions are one-directional except into [`Status::Error`], which is
/// reachable from any non-terminal state. [`Status::Disabled`] is set only by
/// administrative action and is never assigned by the pipeline itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Received,
    InIngestion,
    Archived,
    Completed,
    Ready,
    Error,
    Disabled,
}

impl Status {
    /// The Postgres `enum` / `varchar` spelling used by `local_ega.files.status`.
    pub fn as_db_str(self) -> &'static str {
        match self {
            Status::Received => "RECEIVED",
            Status::InIngestion => "IN_INGESTION",
            Status::Archived => "ARCHIVED",
            Status::Completed => "COMPLETED",
            Status::Ready => "READY",
            Status::Error => "ERROR",
            Status::Disabled => "DISABLED",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// A digest algorithm name as carried on the wire (`encrypted_checksums` /
/// `decrypted_checksums` entries). Only `sha256` is acted on; any other value
/// is accepted on the wire but ignored by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Sha256,
    Md5,
    #[serde(other)]
    Other,
}

impl ChecksumAlgorithm {
    pub fn is_sha256(self) -> bool {
        matches!(self, ChecksumAlgorithm::Sha256)
    }
}

/// In-memory projection of a `local_ega.files` row, as read back by
/// `get_info`. Workers never hold this for longer than one message handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: i64,
    pub submitter: String,
    pub inbox_path: String,
    pub status: Status,
    pub header: Option<String>,
    pub inbox_file_checksum: Option<String>,
    pub inbox_file_checksum_type: Option<String>,
    pub archive_path: Option<String>,
    pub archive_filesize: Option<i64>,
    pub archive_file_checksum: Option<String>,
    pub archive_file_checksum_type: Option<String>,
    pub stable_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
