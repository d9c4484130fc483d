//! Archive key providers, grounded on `lega/utils/key.py`'s `Key` base class
//! and its three subclasses: a functional Crypt4GH file-backed key, and two
//! remote backends the original leaves as empty `pass` stubs.

use crate::error::{KeyError, NotImplementedSnafu, ReadSnafu, UnlockSnafu};
use snafu::ResultExt;

/// A keypair used to unlock session keys in an incoming header and sign the
/// archive's own header on re-encryption.
pub trait KeyProvider: Send + Sync {
    fn public(&self) -> Result<&[u8], KeyError>;
    fn private(&self) -> Result<&[u8], KeyError>;
}

/// The Crypt4GH private-key unlock step (passphrase-protected file → raw
/// key bytes) and public-key derivation are X25519 primitives this crate
/// does not implement; callers supply a concrete loader (§9, the envelope
/// parsing boundary).
pub trait Crypt4ghKeyLoader: Send + Sync {
    /// Returns `(private_key, public_key)`, each 32 bytes, or an unlock
    /// failure (wrong passphrase, malformed key file).
    fn load(&self, file_bytes: &[u8], passphrase: &str) -> Result<(Vec<u8>, Vec<u8>), KeyError>;
}

pub struct FileKeyProvider {
    private_key: Vec<u8>,
    public_key: Vec<u8>,
}

impl FileKeyProvider {
    pub fn load(path: &str, passphrase: &str, loader: &dyn Crypt4ghKeyLoader) -> Result<Self, KeyError> {
        let bytes = std::fs::read(path).context(ReadSnafu { path: path.to_string() })?;
        let (private_key, public_key) = loader.load(&bytes, passphrase)?;
        tracing::info!("successfully loaded a Crypt4GH-formatted key from file");
        Ok(Self { private_key, public_key })
    }
}

impl KeyProvider for FileKeyProvider {
    fn public(&self) -> Result<&[u8], KeyError> {
        Ok(&self.public_key)
    }

    fn private(&self) -> Result<&[u8], KeyError> {
        Ok(&self.private_key)
    }
}

/// Retrieves a key from a remote HashiCorp Vault. Left unimplemented, as in
/// the original (`HashiCorpVaultKey` is a bare `pass` subclass).
pub struct RemoteVaultKeyProvider;

impl KeyProvider for RemoteVaultKeyProvider {
    fn public(&self) -> Result<&[u8], KeyError> {
        NotImplementedSnafu { backend: "vault" }.fail()
    }

    fn private(&self) -> Result<&[u8], KeyError> {
        NotImplementedSnafu { backend: "vault" }.fail()
    }
}

/// Retrieves a key from a remote HTTP(S) server. Left unimplemented, as in
/// the original (`HTTPSKey` is a bare `pass` subclass).
pub struct RemoteHttpsKeyProvider;

impl KeyProvider for RemoteHttpsKeyProvider {
    fn public(&self) -> Result<&[u8], KeyError> {
        NotImplementedSnafu { backend: "https" }.fail()
    }

    fn private(&self) -> Result<&[u8], KeyError> {
        NotImplementedSnafu { backend: "https" }.fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeLoader;

    impl Crypt4ghKeyLoader for FakeLoader {
        fn load(&self, file_bytes: &[u8], passphrase: &str) -> Result<(Vec<u8>, Vec<u8>), KeyError> {
            if passphrase != "correct horse" {
                return UnlockSnafu { reason: "bad passphrase" }.fail();
            }
            Ok((file_bytes.to_vec(), vec![0xAB; 32]))
        }
    }

    #[test]
    fn file_key_provider_loads_through_the_unlocker() {
        let dir = std::env::temp_dir().join(format!("ingest-keys-test-{}", std::process::id()));
        std::fs::write(&dir, b"seckeybytes").unwrap();
        let provider = FileKeyProvider::load(dir.to_str().unwrap(), "correct horse", &FakeLoader).unwrap();
        assert_eq!(provider.private().unwrap(), b"seckeybytes");
        assert_eq!(provider.public().unwrap(), &[0xAB; 32]);
        std::fs::remove_file(&dir).ok();
    }

    #[test]
    fn remote_providers_report_not_implemented() {
        let vault = RemoteVaultKeyProvider;
        assert!(matches!(vault.public(), Err(KeyError::NotImplemented { backend: "vault" })));
    }
}
