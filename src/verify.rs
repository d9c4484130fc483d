//! The verify worker's handler body (§4.6): deconstruct the stored header,
//! guard against session-key reuse, decrypt the archived body, and record
//! completion.
//!
//! `file_id` is already present on the incoming payload (the ingest stage
//! put it there), so unlike [`crate::ingest`] this handler never needs to
//! grow it into the message — it only needs to hand the *incoming* message
//! back out on error, the way `lega/verify.py`'s exception handling reads
//! `data['file_id']` off the same dict the handler was given, not off the
//! `org_msg` copy the reply is built from.

use crate::sync_bridge::SyncBridgeReader;
use ingest_core::digest::DualDigestSink;
use ingest_core::envelope::{EditList, HeaderDeconstructor, SegmentDecryptor};
use ingest_core::message::{ChecksumEntry, Message};
use ingest_core::{ChecksumAlgorithm, UserError, WorkerError};
use ingest_db::Database;
use ingest_keys::KeyProvider;
use ingest_storage::StorageBackend;
use serde_json::Value;

pub async fn handle(
    db: &dyn Database,
    archive: &dyn StorageBackend,
    key_provider: &dyn KeyProvider,
    header_deconstructor: &dyn HeaderDeconstructor,
    segment_decryptor: &dyn SegmentDecryptor,
    payload: Value,
) -> (Message, Result<Option<Value>, WorkerError>) {
    let message = match Message::from_value(payload) {
        Ok(m) => m,
        Err(e) => return (Message::default(), Err(WorkerError::system(e.to_string()))),
    };

    let result = run(db, archive, key_provider, header_deconstructor, segment_decryptor, &message).await;
    (message, result)
}

async fn run(
    db: &dyn Database,
    archive: &dyn StorageBackend,
    key_provider: &dyn KeyProvider,
    header_deconstructor: &dyn HeaderDeconstructor,
    segment_decryptor: &dyn SegmentDecryptor,
    message: &Message,
) -> Result<Option<Value>, WorkerError> {
    let file_id = message
        .get("file_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| WorkerError::system("missing file_id in verify payload"))?;
    let archive_path = message
        .require_str("archive_path")
        .map_err(|e| WorkerError::system(e.to_string()))?;
    let file_checksum = message.get_str("file_checksum").map(str::to_string);

    let header_hex = db
        .get_header(file_id)
        .await
        .map_err(|e| WorkerError::from_source("failed to read header", e))?
        .ok_or_else(|| WorkerError::system(format!("no header stored for file {file_id}")))?;
    let header_bytes =
        hex::decode(&header_hex).map_err(|e| WorkerError::system(format!("stored header is not valid hex: {e}")))?;

    let private_key = key_provider
        .private()
        .map_err(|e| WorkerError::from_source("key provider unavailable", e))?;

    let (session_keys, edit_list) = header_deconstructor
        .deconstruct(&header_bytes, private_key)
        .map_err(|_| UserError::SessionKeyDecryptionFailure)?;

    if session_keys.is_empty() {
        return Err(UserError::SessionKeyDecryptionFailure.into());
    }

    let digests: Vec<String> = session_keys.iter().map(|k| k.sha256_hex()).collect();
    let reused = db
        .check_session_keys_checksums(&digests)
        .await
        .map_err(|e| WorkerError::from_source("failed to check session key ledger", e))?;
    if reused {
        return Err(UserError::SessionKeyReused {
            checksum: digests.first().cloned().unwrap_or_default(),
        }
        .into());
    }

    let mut reader = archive
        .open(archive_path)
        .await
        .map_err(|e| WorkerError::from_source("failed to open archive object", e))?;

    let mut sink = DualDigestSink::new();
    {
        let mut bridge = SyncBridgeReader::new(&mut reader);
        let decrypt_result = match &edit_list {
            Some(EditList(ranges)) if !ranges.is_empty() => {
                segment_decryptor.decrypt_ranges(&mut bridge, &session_keys, &EditList(ranges.clone()), &mut |chunk| {
                    sink.update(chunk)
                })
            }
            _ => segment_decryptor.decrypt_all(&mut bridge, &session_keys, &mut |chunk| sink.update(chunk)),
        };
        decrypt_result.map_err(|e| WorkerError::from_source("segment decryption failed", e))?;
    }
    let (sha256, md5) = sink.finish_hex();

    db.mark_completed(file_id, &digests, &sha256)
        .await
        .map_err(|e| WorkerError::from_source("failed to mark completed", e))?;

    let org_msg = message.get("org_msg").cloned().unwrap_or(Value::Object(Default::default()));
    let mut outgoing = Message::from_value(org_msg).unwrap_or_default();
    outgoing.insert(
        "decrypted_checksums",
        serde_json::to_value(vec![
            ChecksumEntry {
                algorithm: ChecksumAlgorithm::Sha256,
                value: sha256,
            },
            ChecksumEntry {
                algorithm: ChecksumAlgorithm::Md5,
                value: md5,
            },
        ])
        .expect("checksum entries serialize"),
    );
    if let Some(checksum) = file_checksum {
        outgoing.insert("file_checksum", checksum);
    }
    outgoing.remove("file_id");

    Ok(Some(outgoing.into_value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_core::envelope::SessionKey;
    use ingest_core::model::Status;
    use ingest_db::fake::{FakeDatabase, FakeRow};
    use ingest_keys::KeyError;
    use ingest_storage::FileStorage;
    use sha2::{Digest, Sha256};
    use std::io::Read;

    struct FakeKeyProvider {
        key: Vec<u8>,
    }

    impl KeyProvider for FakeKeyProvider {
        fn public(&self) -> Result<&[u8], KeyError> {
            Ok(&self.key)
        }

        fn private(&self) -> Result<&[u8], KeyError> {
            Ok(&self.key)
        }
    }

    /// Stands in for a real Crypt4GH codec: always recovers one fixed
    /// session key and emits a fixed plaintext, regardless of the header
    /// bytes or ciphertext actually passed in.
    struct FakeCodec {
        session_key: Vec<u8>,
        plaintext: Vec<u8>,
    }

    impl HeaderDeconstructor for FakeCodec {
        fn deconstruct(
            &self,
            _header: &[u8],
            _master_private_key: &[u8],
        ) -> Result<(Vec<SessionKey>, Option<EditList>), ingest_core::envelope::EnvelopeError> {
            Ok((vec![SessionKey(self.session_key.clone())], None))
        }
    }

    impl SegmentDecryptor for FakeCodec {
        fn decrypt_all(
            &self,
            _reader: &mut dyn Read,
            _session_keys: &[SessionKey],
            sink: &mut dyn FnMut(&[u8]),
        ) -> Result<(), ingest_core::envelope::EnvelopeError> {
            sink(&self.plaintext);
            Ok(())
        }

        fn decrypt_ranges(
            &self,
            reader: &mut dyn Read,
            session_keys: &[SessionKey],
            _edit_list: &EditList,
            sink: &mut dyn FnMut(&[u8]),
        ) -> Result<(), ingest_core::envelope::EnvelopeError> {
            self.decrypt_all(reader, session_keys, sink)
        }
    }

    #[tokio::test]
    async fn happy_verify_marks_completed_and_emits_decrypted_checksums() {
        let archive_dir = tempfile::tempdir().unwrap();
        let archive = FileStorage::new(archive_dir.path());
        tokio::fs::write(archive_dir.path().join("7"), b"ciphertext-stub").await.unwrap();

        let db = FakeDatabase::new();
        db.seed(FakeRow::new(7, "u", "file.c4gh", Status::Archived));
        db.store_header(7, "aabb").await.unwrap();

        let key_provider = FakeKeyProvider { key: vec![0u8; 32] };
        let session_key = vec![9u8; 32];
        let codec = FakeCodec {
            session_key: session_key.clone(),
            plaintext: b"decrypted-body".to_vec(),
        };

        let payload = serde_json::json!({
            "file_id": 7,
            "archive_path": "7",
            "org_msg": {"filepath": "file.c4gh", "user": "u"},
        });

        let (_message, result) = handle(&db, &archive, &key_provider, &codec, &codec, payload).await;
        let outgoing = result.expect("verify should succeed").expect("verify emits a reply");

        let mut sink = DualDigestSink::new();
        sink.update(b"decrypted-body");
        let (expected_sha256, _expected_md5) = sink.finish_hex();

        let outgoing_message = Message::from_value(outgoing).unwrap();
        let decrypted: Vec<ChecksumEntry> = outgoing_message
            .parse_field("decrypted_checksums")
            .unwrap()
            .unwrap_or_default();
        assert!(decrypted
            .iter()
            .any(|c| c.algorithm.is_sha256() && c.value == expected_sha256));

        let row = db.row(7).unwrap();
        assert_eq!(row.status, Status::Completed);
        assert_eq!(row.archive_file_checksum.as_deref(), Some(expected_sha256.as_str()));

        let digest = hex::encode(Sha256::digest(&session_key));
        assert!(db.check_session_keys_checksums(&[digest]).await.unwrap());
    }

    #[tokio::test]
    async fn session_key_reuse_is_rejected_and_row_stays_archived() {
        let archive_dir = tempfile::tempdir().unwrap();
        let archive = FileStorage::new(archive_dir.path());
        tokio::fs::write(archive_dir.path().join("9"), b"ciphertext-stub").await.unwrap();

        let db = FakeDatabase::new();
        db.seed(FakeRow::new(9, "u", "dup.c4gh", Status::Archived));
        db.store_header(9, "aabb").await.unwrap();

        let key_provider = FakeKeyProvider { key: vec![0u8; 32] };
        let session_key = vec![7u8; 32];
        db.seed_session_key_checksum(hex::encode(Sha256::digest(&session_key)));
        let codec = FakeCodec {
            session_key,
            plaintext: b"irrelevant".to_vec(),
        };

        let payload = serde_json::json!({
            "file_id": 9,
            "archive_path": "9",
            "org_msg": {},
        });

        let (message, result) = handle(&db, &archive, &key_provider, &codec, &codec, payload).await;
        let err = result.expect_err("reused session key must be rejected");
        assert_eq!(err.class_name(), "SessionKeyAlreadyUsedError");
        assert!(err.from_user());
        assert_eq!(message.get("file_id").and_then(Value::as_i64), Some(9));

        let row = db.row(9).unwrap();
        assert_eq!(row.status, Status::Archived);
    }
}
