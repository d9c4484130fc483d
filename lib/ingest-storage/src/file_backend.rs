//! POSIX-tree storage backend, grounded on `lega/utils/storage.py`'s
//! `FileStorage`: files live at `<root>/<fanout path>`, directories are
//! created lazily on write, and `location` never touches the filesystem.

use crate::backend::{fanout_path, sanitize_path_component, BoxedReader, SeekableReader, StorageBackend};
use crate::error::{self, StorageError};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use snafu::ResultExt;
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    fn location(&self, file_id: i64) -> String {
        fanout_path(file_id, 20, 3)
    }

    fn scoped(&self, user: &str) -> Box<dyn StorageBackend> {
        Box::new(FileStorage::new(self.root.join(sanitize_path_component(user))))
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(tokio::fs::metadata(self.resolve(path)).await.is_ok())
    }

    async fn filesize(&self, path: &str) -> Result<u64, StorageError> {
        let full = self.resolve(path);
        let meta = tokio::fs::metadata(&full)
            .await
            .context(error::IoSnafu { path: path.to_string() })?;
        Ok(meta.len())
    }

    async fn open(&self, path: &str) -> Result<BoxedReader, StorageError> {
        let full = self.resolve(path);
        let file = File::open(&full).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound { path: path.to_string() }
            } else {
                StorageError::Io { path: path.to_string(), source }
            }
        })?;
        Ok(Box::new(FileReader { file, path: path.to_string() }))
    }

    async fn copy(&self, source: &mut dyn SeekableReader, dest_path: &str) -> Result<u64, StorageError> {
        let full = self.resolve(dest_path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context(error::IoSnafu { path: parent.display().to_string() })?;
        }
        let mut dest = File::create(&full)
            .await
            .context(error::IoSnafu { path: dest_path.to_string() })?;
        const CHUNK: i64 = 1024 * 1024;
        loop {
            let buf = source.read(CHUNK).await?;
            if buf.is_empty() {
                break;
            }
            dest.write_all(&buf)
                .await
                .context(error::IoSnafu { path: dest_path.to_string() })?;
        }
        dest.flush().await.context(error::IoSnafu { path: dest_path.to_string() })?;
        drop(dest);
        self.filesize(dest_path).await
    }
}

struct FileReader {
    file: File,
    path: String,
}

#[async_trait]
impl SeekableReader for FileReader {
    async fn seek(&mut self, pos: SeekFrom) -> Result<u64, StorageError> {
        self.file
            .seek(pos)
            .await
            .context(error::IoSnafu { path: self.path.clone() })
    }

    async fn read(&mut self, len: i64) -> Result<Bytes, StorageError> {
        if len < 0 {
            let mut buf = Vec::new();
            self.file
                .read_to_end(&mut buf)
                .await
                .context(error::IoSnafu { path: self.path.clone() })?;
            return Ok(Bytes::from(buf));
        }
        let mut buf = BytesMut::zeroed(len as usize);
        let mut filled = 0usize;
        while filled < buf.len() {
            let n = self
                .file
                .read(&mut buf[filled..])
                .await
                .context(error::IoSnafu { path: self.path.clone() })?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StorageBackend;

    #[tokio::test]
    async fn writes_then_reads_back_through_fanout_path() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FileStorage::new(dir.path());
        let dest = archive.location(7);

        let src_dir = tempfile::tempdir().unwrap();
        let src_path = src_dir.path().join("payload");
        tokio::fs::write(&src_path, b"hello world").await.unwrap();
        let mut src_reader = FileReader {
            file: File::open(&src_path).await.unwrap(),
            path: "payload".to_string(),
        };

        let written = archive.copy(&mut src_reader, &dest).await.unwrap();
        assert_eq!(written, 11);
        assert!(archive.exists(&dest).await.unwrap());
        assert_eq!(archive.filesize(&dest).await.unwrap(), 11);

        let mut reader = archive.open(&dest).await.unwrap();
        let all = reader.read(-1).await.unwrap();
        assert_eq!(&all[..], b"hello world");
        drop(src_dir);
    }

    #[tokio::test]
    async fn open_of_missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let err = storage.open("missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn scoped_views_do_not_alias_across_submitters() {
        let dir = tempfile::tempdir().unwrap();
        let inbox = FileStorage::new(dir.path());
        let alice = inbox.scoped("alice");
        let bob = inbox.scoped("bob");

        let mut src_reader = FileReader {
            file: {
                let src = dir.path().join("src-alice");
                tokio::fs::write(&src, b"alice's data").await.unwrap();
                File::open(&src).await.unwrap()
            },
            path: "src-alice".to_string(),
        };
        alice.copy(&mut src_reader, "same/path.txt").await.unwrap();

        assert!(alice.exists("same/path.txt").await.unwrap());
        assert!(!bob.exists("same/path.txt").await.unwrap());
    }
}
