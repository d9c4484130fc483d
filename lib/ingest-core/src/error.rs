//! Error taxonomy: user-attributable faults vs. system faults.
//!
//! Grounded on `lega/utils/exceptions.py` (the `FromUser` subclass hierarchy)
//! from the original source, reshaped as a `snafu`-derived enum the way
//! `vector-buffers::variants::disk_v2::reader::ReaderError` models its
//! corruption-vs-io split.

use snafu::Snafu;

/// Faults attributable to the submitter's input rather than this system.
/// Recorded in the error log with `from_user = true`.
#[derive(Debug, Snafu)]
pub enum UserError {
    #[snafu(display("file not found in inbox: {filepath}"))]
    NotFoundInInbox { filepath: String },

    #[snafu(display("unsupported hash algorithm: {algorithm}"))]
    UnsupportedHashAlgorithm { algorithm: String },

    #[snafu(display("companion file not found for {name}"))]
    CompanionNotFound { name: String },

    #[snafu(display("invalid {algorithm} checksum for {file} ({context})"))]
    ChecksumMismatch {
        algorithm: String,
        file: String,
        context: &'static str,
    },

    #[snafu(display("unable to decrypt header with master key"))]
    SessionKeyDecryptionFailure,

    #[snafu(display("session key already used (checksum: {checksum})"))]
    SessionKeyReused { checksum: String },
}

impl UserError {
    /// Exception-class-shaped name recorded as `etype` in the error log,
    /// matching the original exception class names so operators' existing
    /// dashboards keep working.
    pub fn class_name(&self) -> &'static str {
        match self {
            UserError::NotFoundInInbox { .. } => "NotFoundInInbox",
            UserError::UnsupportedHashAlgorithm { .. } => "UnsupportedHashAlgorithm",
            UserError::CompanionNotFound { .. } => "CompanionNotFound",
            UserError::ChecksumMismatch { .. } => "Checksum",
            UserError::SessionKeyDecryptionFailure => "SessionKeyDecryptionError",
            UserError::SessionKeyReused { .. } => "SessionKeyAlreadyUsedError",
        }
    }
}

/// Every fault a worker handler can produce, classified for the error log
/// and for dispatch's ack/reject decision. System faults carry a rendered
/// message rather than a boxed source, so this crate doesn't need to know
/// about `sqlx`, `aws-sdk-s3`, or `lapin` error types directly.
#[derive(Debug, Snafu)]
pub enum WorkerError {
    #[snafu(display("{source}"))]
    User { source: UserError },

    #[snafu(display("system fault: {message}"))]
    System { message: String },
}

impl WorkerError {
    pub fn system(message: impl Into<String>) -> Self {
        WorkerError::System {
            message: message.into(),
        }
    }

    pub fn from_source(
        message: impl Into<String>,
        source: impl std::error::Error,
    ) -> Self {
        WorkerError::System {
            message: format!("{}: {source}", message.into()),
        }
    }

    /// Whether this fault should be recorded with `from_user = true`.
    pub fn from_user(&self) -> bool {
        matches!(self, WorkerError::User { .. })
    }

    /// Exception-class-shaped name recorded as `etype` in the error log.
    pub fn class_name(&self) -> String {
        match self {
            WorkerError::User { source } => source.class_name().to_string(),
            WorkerError::System { .. } => "SystemFault".to_string(),
        }
    }
}

impl From<UserError> for WorkerError {
    fn from(source: UserError) -> Self {
        WorkerError::User { source }
    }
}
