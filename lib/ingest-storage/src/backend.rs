//! The storage backend capability set, uniform over a POSIX tree and an
//! S3-compatible bucket.
//!
//! Modeled as an `async_trait` object rather than an inheritance hierarchy
//! (§9: "Polymorphic storage backends... define a capability set... and two
//! concrete implementations"), the same shape the teacher gives
//! `vector-buffers`'s `Filesystem` trait in
//! `lib/vector-buffers/src/variants/disk_v2/io.rs`.

use crate::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::SeekFrom;

/// A scoped, randomly seekable byte stream over an open object. Both
/// implementations release their underlying resource (file descriptor or
/// HTTP connection-pool permit) on drop, and `S3` readers additionally
/// reject seeking before offset zero.
#[async_trait]
pub trait SeekableReader: Send {
    async fn seek(&mut self, pos: SeekFrom) -> Result<u64, StorageError>;

    /// Reads up to `len` bytes. A negative `len` reads to end-of-object.
    /// Returns an empty buffer at EOF.
    async fn read(&mut self, len: i64) -> Result<Bytes, StorageError>;
}

pub type BoxedReader = Box<dyn SeekableReader>;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Pure function mapping an id to a backend-specific path. Deterministic
    /// and injective over the set of assigned ids (invariant 3, §8).
    fn location(&self, file_id: i64) -> String;

    /// Returns a view of this backend rooted under `user`'s own subtree, the
    /// way `lega/utils/storage.py`'s `FileStorage.__init__` formats
    /// `location % user` into its prefix and `lega/ingest.py:74`'s
    /// `inbox_fs(user_id)` builds one such view per message. Every other
    /// method on the returned backend resolves paths relative to that root,
    /// so two submitters using the same relative `filepath` never alias.
    fn scoped(&self, user: &str) -> Box<dyn StorageBackend>;

    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    async fn filesize(&self, path: &str) -> Result<u64, StorageError>;

    async fn open(&self, path: &str) -> Result<BoxedReader, StorageError>;

    /// Drains `source` into `dest_path`, returning the size read back from
    /// the backend afterward, not a local byte counter, so callers observe
    /// the authoritative persisted size (§4.1).
    async fn copy(&self, source: &mut dyn SeekableReader, dest_path: &str) -> Result<u64, StorageError>;
}

/// Collapses a submitter identifier into a single path component: strips
/// separators and leading dots so it can't escape the backend's root or
/// address a hidden/parent directory.
pub fn sanitize_path_component(user: &str) -> String {
    let cleaned: String = user
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Splits a zero-padded, fixed-width id into fixed-size character chunks,
/// joined by `/`. Shared by the POSIX backend's `location` (§4.1;
/// `lega/utils/storage.py`'s `FileStorage.location`).
pub fn fanout_path(file_id: i64, width: usize, chunk: usize) -> String {
    let padded = format!("{file_id:0>width$}", width = width);
    padded
        .as_bytes()
        .chunks(chunk)
        .map(|c| std::str::from_utf8(c).expect("ascii digits"))
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fanout_path_zero_pads_and_chunks() {
        assert_eq!(fanout_path(42, 20, 3), "000/000/000/000/000/000/42");
    }

    #[test]
    fn fanout_path_is_injective_for_distinct_ids() {
        assert_ne!(fanout_path(1, 20, 3), fanout_path(2, 20, 3));
    }

    #[test]
    fn sanitize_path_component_passes_through_a_plain_user() {
        assert_eq!(sanitize_path_component("alice"), "alice");
    }

    #[test]
    fn sanitize_path_component_neutralizes_separators_and_parent_refs() {
        assert_eq!(sanitize_path_component("../../etc"), "etc");
        assert_eq!(sanitize_path_component("a/b\\c"), "a_b_c");
    }
}
