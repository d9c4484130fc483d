//! The `local_ega.files` data access layer, one function per original
//! `lega/utils/db.py` entry point. Each statement is issued directly against
//! the gateway's pool; sqlx checks out and returns connections per call.

use crate::error::{DbError, NoIdReturnedSnafu, NotFoundSnafu};
use crate::pool::DbGateway;
use ingest_core::model::{FileInfo, Status};
use sqlx::Row;

impl DbGateway {
    /// Calls the `local_ega.insert_file` stored procedure, returning the
    /// assigned row id.
    pub async fn insert_file(&self, filepath: &str, submitter: &str) -> Result<i64, DbError> {
        let row = sqlx::query("SELECT local_ega.insert_file($1, $2) AS id")
            .bind(filepath)
            .bind(submitter)
            .fetch_one(self.pool())
            .await?;
        let id: Option<i64> = row.try_get("id")?;
        id.ok_or_else(|| {
            NoIdReturnedSnafu {
                filepath: filepath.to_string(),
            }
            .build()
        })
    }

    pub async fn mark_in_progress(&self, file_id: i64) -> Result<(), DbError> {
        sqlx::query("UPDATE local_ega.files SET status = $1, updated_at = now() WHERE id = $2")
            .bind(Status::InIngestion.as_db_str())
            .bind(file_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn set_file_encrypted_checksum(
        &self,
        file_id: i64,
        checksum: &str,
        checksum_type: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE local_ega.files \
             SET inbox_file_checksum = $1, inbox_file_checksum_type = $2, updated_at = now() \
             WHERE id = $3",
        )
        .bind(checksum)
        .bind(checksum_type.to_uppercase())
        .bind(file_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn store_header(&self, file_id: i64, header: &str) -> Result<(), DbError> {
        sqlx::query("UPDATE local_ega.files SET header = $1, updated_at = now() WHERE id = $2")
            .bind(header)
            .bind(file_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn set_archived(&self, file_id: i64, archive_path: &str, archive_filesize: i64) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE local_ega.files \
             SET status = $1, archive_path = $2, archive_filesize = $3, updated_at = now() \
             WHERE id = $4",
        )
        .bind(Status::Archived.as_db_str())
        .bind(archive_path)
        .bind(archive_filesize)
        .bind(file_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Returns whether any of the given session-key digests has been seen
    /// before, across any file not currently in `ERROR` (invariant 6, §8).
    pub async fn check_session_keys_checksums(&self, checksums: &[String]) -> Result<bool, DbError> {
        let row = sqlx::query("SELECT local_ega.check_session_keys_checksums_sha256($1) AS found")
            .bind(checksums)
            .fetch_one(self.pool())
            .await?;
        let found: Option<bool> = row.try_get("found")?;
        Ok(found.unwrap_or(false))
    }

    pub async fn mark_completed(
        &self,
        file_id: i64,
        session_key_checksums: &[String],
        digest_sha256: &str,
    ) -> Result<(), DbError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "UPDATE local_ega.files \
             SET status = $1, archive_file_checksum = $2, archive_file_checksum_type = $3, updated_at = now() \
             WHERE id = $4",
        )
        .bind(Status::Completed.as_db_str())
        .bind(digest_sha256)
        .bind("SHA256")
        .bind(file_id)
        .execute(&mut *tx)
        .await?;

        for checksum in session_key_checksums {
            sqlx::query(
                "INSERT INTO local_ega.session_key_checksums_sha256 (file_id, session_key_checksum) \
                 VALUES ($1, $2)",
            )
            .bind(file_id)
            .bind(checksum)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Assigns the stable id, gated on `elixir_id`, `inbox_path`, and the
    /// decrypted checksum all matching and the row not being `DISABLED`
    /// (§4.7) — a no-op `UPDATE` (zero rows) if any predicate fails.
    pub async fn set_stable_id(
        &self,
        filepath: &str,
        user: &str,
        decrypted_checksum: &str,
        stable_id: &str,
    ) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE local_ega.files \
             SET status = $1, stable_id = $2, updated_at = now() \
             WHERE submitter = $3 AND inbox_path = $4 \
               AND archive_file_checksum = $5 AND status != $6",
        )
        .bind(Status::Ready.as_db_str())
        .bind(stable_id)
        .bind(user)
        .bind(filepath)
        .bind(decrypted_checksum)
        .bind(Status::Disabled.as_db_str())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_header(&self, file_id: i64) -> Result<Option<String>, DbError> {
        let row = sqlx::query("SELECT header FROM local_ega.files WHERE id = $1")
            .bind(file_id)
            .fetch_optional(self.pool())
            .await?;
        match row {
            Some(row) => Ok(row.try_get("header")?),
            None => Err(NotFoundSnafu { file_id }.build()),
        }
    }

    pub async fn get_info(&self, file_id: i64) -> Result<FileInfo, DbError> {
        let row = sqlx::query(
            "SELECT id, submitter, inbox_path, status, header, \
                    inbox_file_checksum, inbox_file_checksum_type, \
                    archive_path, archive_filesize, archive_file_checksum, archive_file_checksum_type, \
                    stable_id, created_at, updated_at \
             FROM local_ega.files WHERE id = $1",
        )
        .bind(file_id)
        .fetch_optional(self.pool())
        .await?;

        let row = row.ok_or_else(|| NotFoundSnafu { file_id }.build())?;
        let status_str: String = row.try_get("status")?;

        Ok(FileInfo {
            id: row.try_get("id")?,
            submitter: row.try_get("submitter")?,
            inbox_path: row.try_get("inbox_path")?,
            status: parse_status(&status_str),
            header: row.try_get("header")?,
            inbox_file_checksum: row.try_get("inbox_file_checksum")?,
            inbox_file_checksum_type: row.try_get("inbox_file_checksum_type")?,
            archive_path: row.try_get("archive_path")?,
            archive_filesize: row.try_get("archive_filesize")?,
            archive_file_checksum: row.try_get("archive_file_checksum")?,
            archive_file_checksum_type: row.try_get("archive_file_checksum_type")?,
            stable_id: row.try_get("stable_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Records an error against `file_id`, grounded on `insert_error`'s
    /// (hostname, class name, message, from_user) shape.
    pub async fn set_error(&self, file_id: i64, class_name: &str, message: &str, from_user: bool) -> Result<(), DbError> {
        let hostname = hostname();
        sqlx::query("SELECT local_ega.insert_error($1, $2, $3, $4, $5)")
            .bind(file_id)
            .bind(&hostname)
            .bind(class_name)
            .bind(message)
            .bind(from_user)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

fn parse_status(raw: &str) -> Status {
    match raw {
        "RECEIVED" => Status::Received,
        "IN_INGESTION" => Status::InIngestion,
        "ARCHIVED" => Status::Archived,
        "COMPLETED" => Status::Completed,
        "READY" => Status::Ready,
        "ERROR" => Status::Error,
        "DISABLED" => Status::Disabled,
        other => {
            tracing::warn!(status = other, "unrecognized status value, treating as ERROR");
            Status::Error
        }
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_round_trips_every_db_spelling() {
        for status in [
            Status::Received,
            Status::InIngestion,
            Status::Archived,
            Status::Completed,
            Status::Ready,
            Status::Error,
            Status::Disabled,
        ] {
            assert_eq!(parse_status(status.as_db_str()), status);
        }
    }

    #[test]
    fn parse_status_defaults_unrecognized_values_to_error() {
        assert_eq!(parse_status("SOMETHING_NEW"), Status::Error);
    }
}
