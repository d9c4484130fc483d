//! The database capability every handler actually depends on, pulled out
//! into a trait so tests can swap `DbGateway`'s real `sqlx::PgPool` for an
//! in-memory stand-in — the same seam `ingest-storage::StorageBackend` gives
//! the two storage implementations.

use crate::error::DbError;
use crate::pool::DbGateway;
use async_trait::async_trait;
use ingest_core::model::FileInfo;

#[async_trait]
pub trait Database: Send + Sync {
    async fn insert_file(&self, filepath: &str, submitter: &str) -> Result<i64, DbError>;
    async fn mark_in_progress(&self, file_id: i64) -> Result<(), DbError>;
    async fn set_file_encrypted_checksum(
        &self,
        file_id: i64,
        checksum: &str,
        checksum_type: &str,
    ) -> Result<(), DbError>;
    async fn store_header(&self, file_id: i64, header: &str) -> Result<(), DbError>;
    async fn set_archived(&self, file_id: i64, archive_path: &str, archive_filesize: i64) -> Result<(), DbError>;
    async fn check_session_keys_checksums(&self, checksums: &[String]) -> Result<bool, DbError>;
    async fn mark_completed(
        &self,
        file_id: i64,
        session_key_checksums: &[String],
        digest_sha256: &str,
    ) -> Result<(), DbError>;
    async fn set_stable_id(
        &self,
        filepath: &str,
        user: &str,
        decrypted_checksum: &str,
        stable_id: &str,
    ) -> Result<u64, DbError>;
    async fn get_header(&self, file_id: i64) -> Result<Option<String>, DbError>;
    async fn get_info(&self, file_id: i64) -> Result<FileInfo, DbError>;
    async fn set_error(&self, file_id: i64, class_name: &str, message: &str, from_user: bool) -> Result<(), DbError>;
}

#[async_trait]
impl Database for DbGateway {
    async fn insert_file(&self, filepath: &str, submitter: &str) -> Result<i64, DbError> {
        DbGateway::insert_file(self, filepath, submitter).await
    }

    async fn mark_in_progress(&self, file_id: i64) -> Result<(), DbError> {
        DbGateway::mark_in_progress(self, file_id).await
    }

    async fn set_file_encrypted_checksum(
        &self,
        file_id: i64,
        checksum: &str,
        checksum_type: &str,
    ) -> Result<(), DbError> {
        DbGateway::set_file_encrypted_checksum(self, file_id, checksum, checksum_type).await
    }

    async fn store_header(&self, file_id: i64, header: &str) -> Result<(), DbError> {
        DbGateway::store_header(self, file_id, header).await
    }

    async fn set_archived(&self, file_id: i64, archive_path: &str, archive_filesize: i64) -> Result<(), DbError> {
        DbGateway::set_archived(self, file_id, archive_path, archive_filesize).await
    }

    async fn check_session_keys_checksums(&self, checksums: &[String]) -> Result<bool, DbError> {
        DbGateway::check_session_keys_checksums(self, checksums).await
    }

    async fn mark_completed(
        &self,
        file_id: i64,
        session_key_checksums: &[String],
        digest_sha256: &str,
    ) -> Result<(), DbError> {
        DbGateway::mark_completed(self, file_id, session_key_checksums, digest_sha256).await
    }

    async fn set_stable_id(
        &self,
        filepath: &str,
        user: &str,
        decrypted_checksum: &str,
        stable_id: &str,
    ) -> Result<u64, DbError> {
        DbGateway::set_stable_id(self, filepath, user, decrypted_checksum, stable_id).await
    }

    async fn get_header(&self, file_id: i64) -> Result<Option<String>, DbError> {
        DbGateway::get_header(self, file_id).await
    }

    async fn get_info(&self, file_id: i64) -> Result<FileInfo, DbError> {
        DbGateway::get_info(self, file_id).await
    }

    async fn set_error(&self, file_id: i64, class_name: &str, message: &str, from_user: bool) -> Result<(), DbError> {
        DbGateway::set_error(self, file_id, class_name, message, from_user).await
    }
}
