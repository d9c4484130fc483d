//! An in-memory [`Database`] used by handler tests in place of a real
//! Postgres instance — exercises the same `local_ega.files` row semantics
//! (`status` transitions, the DISABLED exclusion in `set_stable_id`, the
//! session-key ledger) without a connection.

use crate::database::Database;
use crate::error::{DbError, NotFoundSnafu};
use async_trait::async_trait;
use ingest_core::model::{FileInfo, Status};
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct FakeRow {
    pub id: i64,
    pub submitter: String,
    pub inbox_path: String,
    pub status: Status,
    pub header: Option<String>,
    pub inbox_file_checksum: Option<String>,
    pub archive_path: Option<String>,
    pub archive_filesize: Option<i64>,
    pub archive_file_checksum: Option<String>,
    pub stable_id: Option<String>,
}

impl FakeRow {
    /// A row seeded directly into a fixture, bypassing `insert_file`, for
    /// tests that start mid-lifecycle (e.g. a COMPLETED row finalize acts on).
    pub fn new(id: i64, submitter: impl Into<String>, inbox_path: impl Into<String>, status: Status) -> Self {
        Self {
            id,
            submitter: submitter.into(),
            inbox_path: inbox_path.into(),
            status,
            header: None,
            inbox_file_checksum: None,
            archive_path: None,
            archive_filesize: None,
            archive_file_checksum: None,
            stable_id: None,
        }
    }

    pub fn with_archive_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.archive_file_checksum = Some(checksum.into());
        self
    }
}

#[derive(Default)]
pub struct FakeDatabase {
    rows: Mutex<Vec<FakeRow>>,
    session_key_checksums: Mutex<HashSet<String>>,
    next_id: Mutex<i64>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            session_key_checksums: Mutex::new(HashSet::new()),
            next_id: Mutex::new(1),
        }
    }

    pub fn seed(&self, row: FakeRow) {
        self.rows.lock().unwrap().push(row);
    }

    pub fn row(&self, file_id: i64) -> Option<FakeRow> {
        self.rows.lock().unwrap().iter().find(|r| r.id == file_id).cloned()
    }

    pub fn seed_session_key_checksum(&self, checksum: impl Into<String>) {
        self.session_key_checksums.lock().unwrap().insert(checksum.into());
    }

    fn with_row(&self, file_id: i64, f: impl FnOnce(&mut FakeRow)) -> Result<(), DbError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.id == file_id)
            .ok_or_else(|| NotFoundSnafu { file_id }.build())?;
        f(row);
        Ok(())
    }
}

#[async_trait]
impl Database for FakeDatabase {
    async fn insert_file(&self, filepath: &str, submitter: &str) -> Result<i64, DbError> {
        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        self.rows
            .lock()
            .unwrap()
            .push(FakeRow::new(id, submitter, filepath, Status::Received));
        Ok(id)
    }

    async fn mark_in_progress(&self, file_id: i64) -> Result<(), DbError> {
        self.with_row(file_id, |r| r.status = Status::InIngestion)
    }

    async fn set_file_encrypted_checksum(
        &self,
        file_id: i64,
        checksum: &str,
        _checksum_type: &str,
    ) -> Result<(), DbError> {
        self.with_row(file_id, |r| r.inbox_file_checksum = Some(checksum.to_string()))
    }

    async fn store_header(&self, file_id: i64, header: &str) -> Result<(), DbError> {
        self.with_row(file_id, |r| r.header = Some(header.to_string()))
    }

    async fn set_archived(&self, file_id: i64, archive_path: &str, archive_filesize: i64) -> Result<(), DbError> {
        self.with_row(file_id, |r| {
            r.status = Status::Archived;
            r.archive_path = Some(archive_path.to_string());
            r.archive_filesize = Some(archive_filesize);
        })
    }

    async fn check_session_keys_checksums(&self, checksums: &[String]) -> Result<bool, DbError> {
        let seen = self.session_key_checksums.lock().unwrap();
        Ok(checksums.iter().any(|c| seen.contains(c)))
    }

    async fn mark_completed(
        &self,
        file_id: i64,
        session_key_checksums: &[String],
        digest_sha256: &str,
    ) -> Result<(), DbError> {
        self.with_row(file_id, |r| {
            r.status = Status::Completed;
            r.archive_file_checksum = Some(digest_sha256.to_string());
        })?;
        let mut seen = self.session_key_checksums.lock().unwrap();
        for checksum in session_key_checksums {
            seen.insert(checksum.clone());
        }
        Ok(())
    }

    async fn set_stable_id(
        &self,
        filepath: &str,
        user: &str,
        decrypted_checksum: &str,
        stable_id: &str,
    ) -> Result<u64, DbError> {
        let mut rows = self.rows.lock().unwrap();
        let matched = rows.iter_mut().find(|r| {
            r.submitter == user
                && r.inbox_path == filepath
                && r.archive_file_checksum.as_deref() == Some(decrypted_checksum)
                && r.status != Status::Disabled
        });
        match matched {
            Some(row) => {
                row.status = Status::Ready;
                row.stable_id = Some(stable_id.to_string());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn get_header(&self, file_id: i64) -> Result<Option<String>, DbError> {
        Ok(self.row(file_id).and_then(|r| r.header))
    }

    async fn get_info(&self, file_id: i64) -> Result<FileInfo, DbError> {
        let row = self.row(file_id).ok_or_else(|| NotFoundSnafu { file_id }.build())?;
        let now = chrono::Utc::now();
        Ok(FileInfo {
            id: row.id,
            submitter: row.submitter,
            inbox_path: row.inbox_path,
            status: row.status,
            header: row.header,
            inbox_file_checksum: row.inbox_file_checksum,
            inbox_file_checksum_type: None,
            archive_path: row.archive_path,
            archive_filesize: row.archive_filesize,
            archive_file_checksum: row.archive_file_checksum,
            archive_file_checksum_type: None,
            stable_id: row.stable_id,
            created_at: now,
            updated_at: now,
        })
    }

    async fn set_error(&self, file_id: i64, _class_name: &str, _message: &str, _from_user: bool) -> Result<(), DbError> {
        self.with_row(file_id, |r| r.status = Status::Error)
    }
}
