//! Storage backend abstraction: a `StorageBackend` capability set, and
//! `FileStorage`/`S3Storage` implementations over it.

pub mod backend;
pub mod error;
pub mod file_backend;
pub mod s3_backend;

pub use backend::{fanout_path, sanitize_path_component, BoxedReader, SeekableReader, StorageBackend};
pub use error::StorageError;
pub use file_backend::FileStorage;
pub use s3_backend::S3Storage;
