//! Archive key providers.

pub mod error;
pub mod provider;

pub use error::KeyError;
pub use provider::{Crypt4ghKeyLoader, FileKeyProvider, KeyProvider, RemoteHttpsKeyProvider, RemoteVaultKeyProvider};
