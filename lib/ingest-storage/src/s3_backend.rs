//! S3-compatible object storage backend, grounded on `lega/utils/storage.py`'s
//! `S3FileReader`: a seekable reader backed by ranged `GetObject` calls, with
//! up to ten retries on transient failures, and a writer that switches from a
//! single `PutObject` to a multipart upload above a configurable threshold.

use crate::backend::{sanitize_path_component, BoxedReader, SeekableReader, StorageBackend};
use crate::error::StorageError;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::io::SeekFrom;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 10;

pub struct S3Storage {
    client: Client,
    bucket: String,
    /// Key prefix this view is rooted under, the S3 analogue of
    /// `FileStorage`'s formatted root — empty for the unscoped backend,
    /// one path segment per submitter once `scoped` is used (§4.5 step 3;
    /// `lega/ingest.py:156`'s `inbox_fs(user_id)` passes `user_id` as
    /// `S3Storage`'s `prefix` argument).
    prefix: String,
    multipart_threshold: u64,
}

impl S3Storage {
    pub fn new(client: Client, bucket: impl Into<String>, multipart_threshold: u64) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: String::new(),
            multipart_threshold,
        }
    }

    fn key(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            path.trim_start_matches('/').to_string()
        } else {
            format!("{}/{}", self.prefix, path.trim_start_matches('/'))
        }
    }

    fn backend_error(&self, path: &str, err: impl std::fmt::Display) -> StorageError {
        StorageError::Backend {
            path: path.to_string(),
            message: err.to_string(),
        }
    }

    async fn head(&self, path: &str) -> Result<u64, StorageError> {
        let key = self.key(path);
        let out = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    StorageError::NotFound { path: path.to_string() }
                } else {
                    self.backend_error(path, e)
                }
            })?;
        Ok(out.content_length().unwrap_or(0).max(0) as u64)
    }
}

fn is_not_found(err: &impl std::fmt::Debug) -> bool {
    format!("{err:?}").contains("NotFound") || format!("{err:?}").contains("NoSuchKey")
}

/// Mirrors `_fetch`'s `if 'time' in str(e).lower(): continue else: raise` —
/// only errors whose message indicates a timeout are worth retrying.
fn is_transient(err: &impl std::fmt::Debug) -> bool {
    format!("{err:?}").to_lowercase().contains("time")
}

#[async_trait]
impl StorageBackend for S3Storage {
    fn location(&self, file_id: i64) -> String {
        file_id.to_string()
    }

    fn scoped(&self, user: &str) -> Box<dyn StorageBackend> {
        let prefix = if self.prefix.is_empty() {
            sanitize_path_component(user)
        } else {
            format!("{}/{}", self.prefix, sanitize_path_component(user))
        };
        Box::new(S3Storage {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            prefix,
            multipart_threshold: self.multipart_threshold,
        })
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        match self.head(path).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }

    async fn filesize(&self, path: &str) -> Result<u64, StorageError> {
        self.head(path).await
    }

    async fn open(&self, path: &str) -> Result<BoxedReader, StorageError> {
        let size = self.head(path).await?;
        Ok(Box::new(S3Reader {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            key: self.key(path),
            position: 0,
            size,
        }))
    }

    async fn copy(&self, source: &mut dyn SeekableReader, dest_path: &str) -> Result<u64, StorageError> {
        let key = self.key(dest_path);
        let threshold = self.multipart_threshold.max(1);
        let first = source.read(threshold as i64).await?;

        if (first.len() as u64) < threshold {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(ByteStream::from(first.to_vec()))
                .send()
                .await
                .map_err(|e| self.backend_error(dest_path, e))?;
            return self.head(dest_path).await;
        }

        let create = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| self.backend_error(dest_path, e))?;
        let upload_id = create
            .upload_id()
            .ok_or_else(|| self.backend_error(dest_path, "missing upload id"))?
            .to_string();

        let mut parts = Vec::new();
        let mut part_number = 1i32;
        let mut chunk = first;
        loop {
            let upload = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(&key)
                .upload_id(&upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk.to_vec()))
                .send()
                .await
                .map_err(|e| self.backend_error(dest_path, e))?;
            let e_tag = upload.e_tag().unwrap_or_default().to_string();
            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(e_tag)
                    .build(),
            );

            chunk = source.read(threshold as i64).await?;
            if chunk.is_empty() {
                break;
            }
            part_number += 1;
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&key)
            .upload_id(&upload_id)
            .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(parts)).build())
            .send()
            .await
            .map_err(|e| self.backend_error(dest_path, e))?;

        self.head(dest_path).await
    }
}

struct S3Reader {
    client: Client,
    bucket: String,
    key: String,
    position: u64,
    size: u64,
}

#[async_trait]
impl SeekableReader for S3Reader {
    async fn seek(&mut self, pos: SeekFrom) -> Result<u64, StorageError> {
        let target = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(delta) => self.size as i64 + delta,
            SeekFrom::Current(delta) => self.position as i64 + delta,
        };
        if target < 0 {
            return Err(StorageError::SeekBeforeStart);
        }
        self.position = target as u64;
        Ok(self.position)
    }

    async fn read(&mut self, len: i64) -> Result<Bytes, StorageError> {
        if self.position >= self.size {
            return Ok(Bytes::new());
        }
        let end = if len < 0 {
            self.size
        } else {
            (self.position + len as u64).min(self.size)
        };
        let range = format!("bytes={}-{}", self.position, end - 1);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .range(&range)
                .send()
                .await;
            match result {
                Ok(out) => {
                    let bytes = out
                        .body
                        .collect()
                        .await
                        .map_err(|e| StorageError::Backend {
                            path: self.key.clone(),
                            message: e.to_string(),
                        })?
                        .into_bytes();
                    self.position += bytes.len() as u64;
                    return Ok(bytes);
                }
                Err(e) => {
                    if is_not_found(&e) {
                        return Err(StorageError::NotFound { path: self.key.clone() });
                    }
                    if !is_transient(&e) {
                        return Err(StorageError::Backend {
                            path: self.key.clone(),
                            message: e.to_string(),
                        });
                    }
                    if attempt >= MAX_ATTEMPTS {
                        return Err(StorageError::RetriesExhausted {
                            path: self.key.clone(),
                            attempts: attempt,
                        });
                    }
                    tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                }
            }
        }
    }
}
