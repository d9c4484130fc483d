//! Postgres gateway for the `local_ega.files` table: connection bootstrap
//! with retry/backoff, and the typed query surface used by all three
//! workers.

pub mod database;
pub mod error;
pub mod pool;
pub mod queries;

#[cfg(feature = "test-support")]
pub mod fake;

pub use database::Database;
pub use error::DbError;
pub use pool::DbGateway;
