//! Shared types for the ingest/verify/finalize pipeline: the `File` entity
//! and status machine, broker message shapes, the error taxonomy, digest
//! sinks, the envelope contract, and typed configuration.

pub mod config;
pub mod digest;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod message;
pub mod model;

pub use error::{UserError, WorkerError};
pub use message::Message;
pub use model::{ChecksumAlgorithm, FileInfo, Status};
