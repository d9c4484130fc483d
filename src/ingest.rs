//! The ingest worker's handler body (§4.5): insert a row, pull the object
//! out of the inbox, split off its header, archive the remainder, and
//! record both.
//!
//! The payload is mutated in place as each step completes (`file_id` lands
//! in it the moment the row exists), the same way `lega/ingest.py`'s `work`
//! augments its `data` dict as it goes — so the error wrapper can still
//! find `file_id` in the payload even when a later step fails.

use crate::sync_bridge::SyncBridgeReader;
use ingest_core::digest::Sha256Sink;
use ingest_core::envelope::HeaderSplitter;
use ingest_core::message::{ChecksumEntry, Message};
use ingest_core::{UserError, WorkerError};
use ingest_db::Database;
use ingest_storage::StorageBackend;
use serde_json::Value;
use std::io::SeekFrom;

const CHUNK: i64 = 64 * 1024;

pub async fn handle(
    db: &dyn Database,
    inbox: &dyn StorageBackend,
    archive: &dyn StorageBackend,
    header_splitter: &dyn HeaderSplitter,
    payload: Value,
) -> (Message, Result<(), WorkerError>) {
    let mut message = match Message::from_value(payload) {
        Ok(m) => m,
        Err(e) => return (Message::default(), Err(WorkerError::system(e.to_string()))),
    };

    let org_msg = message.clone().into_value();
    message.insert("org_msg", org_msg);

    match run(db, inbox, archive, header_splitter, &mut message).await {
        Ok(()) => (message, Ok(())),
        Err(e) => (message, Err(e)),
    }
}

async fn run(
    db: &dyn Database,
    inbox: &dyn StorageBackend,
    archive: &dyn StorageBackend,
    header_splitter: &dyn HeaderSplitter,
    message: &mut Message,
) -> Result<(), WorkerError> {
    let filepath = message
        .require_str("filepath")
        .map_err(|e| WorkerError::system(e.to_string()))?
        .to_string();
    let raw_user = message
        .require_str("user")
        .map_err(|e| WorkerError::system(e.to_string()))?
        .to_string();
    let encrypted_checksums: Vec<ChecksumEntry> = message
        .parse_field("encrypted_checksums")
        .map_err(|e| WorkerError::system(e.to_string()))?
        .unwrap_or_default();

    let user = sanitize_submitter(&raw_user);
    let file_id = db
        .insert_file(&filepath, &user)
        .await
        .map_err(|e| WorkerError::from_source("failed to insert file row", e))?;
    message.insert("file_id", file_id);

    // Scoped fresh per message, mirroring `lega/ingest.py:74`'s
    // `inbox = inbox_fs(user_id)` — two submitters using the same relative
    // `filepath` resolve into disjoint subtrees, never each other's files.
    let inbox = inbox.scoped(&user);

    if !inbox
        .exists(&filepath)
        .await
        .map_err(|e| WorkerError::from_source("inbox exists check failed", e))?
    {
        return Err(UserError::NotFoundInInbox { filepath }.into());
    }

    db.mark_in_progress(file_id)
        .await
        .map_err(|e| WorkerError::from_source("failed to mark in progress", e))?;

    let mut reader = inbox
        .open(&filepath)
        .await
        .map_err(|e| WorkerError::from_source("failed to open inbox object", e))?;

    let supplied_sha256 = encrypted_checksums
        .iter()
        .find(|c| c.algorithm.is_sha256())
        .map(|c| c.value.clone());

    let file_checksum = match supplied_sha256 {
        Some(checksum) => checksum,
        None => {
            let mut sink = Sha256Sink::new();
            loop {
                let chunk = reader
                    .read(CHUNK)
                    .await
                    .map_err(|e| WorkerError::from_source("failed reading inbox object", e))?;
                if chunk.is_empty() {
                    break;
                }
                sink.update(&chunk);
            }
            reader
                .seek(SeekFrom::Start(0))
                .await
                .map_err(|e| WorkerError::from_source("failed to rewind inbox object", e))?;
            sink.finish_hex()
        }
    };

    let offset = {
        let mut bridge = SyncBridgeReader::new(&mut reader);
        let (_header, offset) = header_splitter
            .split(&mut bridge)
            .map_err(|e| WorkerError::from_source("failed to parse envelope header", e))?;
        offset
    };

    reader
        .seek(SeekFrom::Start(0))
        .await
        .map_err(|e| WorkerError::from_source("failed to rewind inbox object", e))?;
    let header_bytes = read_exact_async(&mut *reader, offset)
        .await
        .map_err(|e| WorkerError::from_source("failed to read envelope header", e))?;
    let header_hex = hex::encode(&header_bytes);
    message.insert("header", header_hex.clone());

    db.store_header(file_id, &header_hex)
        .await
        .map_err(|e| WorkerError::from_source("failed to store header", e))?;

    let archive_path = archive.location(file_id);
    let archive_size = archive
        .copy(&mut *reader, &archive_path)
        .await
        .map_err(|e| WorkerError::from_source("failed to archive object", e))?;
    message.insert("archive_path", archive_path.clone());

    db.set_archived(file_id, &archive_path, archive_size as i64)
        .await
        .map_err(|e| WorkerError::from_source("failed to mark archived", e))?;

    message.insert("file_checksum", file_checksum.clone());
    db.set_file_encrypted_checksum(file_id, &file_checksum, "sha256")
        .await
        .map_err(|e| WorkerError::from_source("failed to store inbox checksum", e))?;

    message.remove("encrypted_checksums");
    Ok(())
}

async fn read_exact_async(
    reader: &mut dyn ingest_storage::SeekableReader,
    len: u64,
) -> Result<bytes::Bytes, ingest_storage::StorageError> {
    let mut buf = bytes::BytesMut::new();
    let mut remaining = len as i64;
    while remaining > 0 {
        let chunk = reader.read(remaining.min(CHUNK)).await?;
        if chunk.is_empty() {
            break;
        }
        remaining -= chunk.len() as i64;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Strips control characters and surrounding whitespace from the submitter
/// identifier before it reaches the database (§9's forward-compatible
/// resolution of the sanitization open question).
fn sanitize_submitter(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_core::envelope::EnvelopeError;
    use ingest_db::fake::FakeDatabase;
    use ingest_storage::FileStorage;
    use sha2::{Digest, Sha256};
    use std::io::Read;

    #[test]
    fn sanitize_submitter_trims_and_strips_control_chars() {
        assert_eq!(sanitize_submitter("  alice\u{0}\n"), "alice");
    }

    /// Treats the first `header_len` bytes of the object as the header,
    /// standing in for a real Crypt4GH parse (crypto itself is out of scope).
    struct FixedHeaderSplitter {
        header_len: u64,
    }

    impl HeaderSplitter for FixedHeaderSplitter {
        fn split(&self, reader: &mut dyn Read) -> Result<(Vec<u8>, u64), EnvelopeError> {
            let mut header = vec![0u8; self.header_len as usize];
            reader
                .read_exact(&mut header)
                .map_err(|source| EnvelopeError::Io { source })?;
            Ok((header, self.header_len))
        }
    }

    async fn seed_inbox_object(root: &std::path::Path, user: &str, filepath: &str, content: &[u8]) {
        use ingest_storage::sanitize_path_component;
        let dir = root.join(sanitize_path_component(user));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(filepath), content).await.unwrap();
    }

    #[tokio::test]
    async fn happy_ingest_user_supplies_checksum() {
        let inbox_dir = tempfile::tempdir().unwrap();
        let archive_dir = tempfile::tempdir().unwrap();
        let inbox = FileStorage::new(inbox_dir.path());
        let archive = FileStorage::new(archive_dir.path());
        let splitter = FixedHeaderSplitter { header_len: 16 };
        let db = FakeDatabase::new();

        let header = vec![0xAAu8; 16];
        let body = b"plaintext-body-bytes".to_vec();
        let mut full = header.clone();
        full.extend_from_slice(&body);
        let checksum = hex::encode(Sha256::digest(&full));
        seed_inbox_object(inbox_dir.path(), "u", "file1.c4gh", &full).await;

        let payload = serde_json::json!({
            "filepath": "file1.c4gh",
            "user": "u",
            "encrypted_checksums": [{"type": "sha256", "value": checksum}],
        });

        let (message, result) = handle(&db, &inbox, &archive, &splitter, payload).await;
        result.expect("ingest should succeed");

        let file_id = message.get("file_id").and_then(serde_json::Value::as_i64).unwrap();
        assert_eq!(message.get_str("file_checksum"), Some(checksum.as_str()));
        assert_eq!(message.get_str("header"), Some(hex::encode(&header).as_str()));
        let archive_path = message.get_str("archive_path").unwrap().to_string();
        assert!(archive.exists(&archive_path).await.unwrap());

        let row = db.row(file_id).unwrap();
        assert_eq!(row.status, ingest_core::model::Status::Archived);
        assert_eq!(row.inbox_file_checksum.as_deref(), Some(checksum.as_str()));
    }

    #[tokio::test]
    async fn happy_ingest_computes_checksum_when_not_supplied() {
        let inbox_dir = tempfile::tempdir().unwrap();
        let archive_dir = tempfile::tempdir().unwrap();
        let inbox = FileStorage::new(inbox_dir.path());
        let archive = FileStorage::new(archive_dir.path());
        let splitter = FixedHeaderSplitter { header_len: 16 };
        let db = FakeDatabase::new();

        let header = vec![0xBBu8; 16];
        let body = b"other plaintext bytes".to_vec();
        let mut full = header.clone();
        full.extend_from_slice(&body);
        let expected_checksum = hex::encode(Sha256::digest(&full));
        seed_inbox_object(inbox_dir.path(), "u", "file2.c4gh", &full).await;

        let payload = serde_json::json!({ "filepath": "file2.c4gh", "user": "u" });

        let (message, result) = handle(&db, &inbox, &archive, &splitter, payload).await;
        result.expect("ingest should succeed");
        assert_eq!(message.get_str("file_checksum"), Some(expected_checksum.as_str()));
    }

    #[tokio::test]
    async fn inbox_miss_is_rejected_without_emission() {
        let inbox_dir = tempfile::tempdir().unwrap();
        let archive_dir = tempfile::tempdir().unwrap();
        let inbox = FileStorage::new(inbox_dir.path());
        let archive = FileStorage::new(archive_dir.path());
        let splitter = FixedHeaderSplitter { header_len: 16 };
        let db = FakeDatabase::new();

        let payload = serde_json::json!({ "filepath": "missing.c4gh", "user": "u" });

        let (message, result) = handle(&db, &inbox, &archive, &splitter, payload).await;
        let err = result.expect_err("missing inbox object must fail");
        assert_eq!(err.class_name(), "NotFoundInInbox");
        assert!(err.from_user());

        let file_id = message.get("file_id").and_then(serde_json::Value::as_i64).unwrap();
        let row = db.row(file_id).unwrap();
        assert_eq!(row.status, ingest_core::model::Status::Received);
    }
}
