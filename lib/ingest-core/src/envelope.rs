//! The envelope contract: header/body splitting, header deconstruction, and
//! segment decryption are implemented by an external crate (§1 scopes the
//! "cryptographic envelope parser and segment decryptor" out of the core);
//! these traits are the seam the core calls through, mirroring how
//! `vector-buffers`'s `Filesystem` trait (`lib/vector-buffers/src/variants/disk_v2/io.rs`
//! in the reference tree) lets the buffer engine stay agnostic of the
//! concrete filesystem it runs against.

use std::io;

/// A symmetric key recovered from a header packet.
#[derive(Clone)]
pub struct SessionKey(pub Vec<u8>);

impl SessionKey {
    pub fn sha256_hex(&self) -> String {
        use sha2::{Digest, Sha256};
        hex::encode(Sha256::digest(&self.0))
    }
}

/// An optional header directive naming the plaintext byte ranges a decryptor
/// should emit, rather than the whole body.
#[derive(Clone, Debug, Default)]
pub struct EditList(pub Vec<(u64, u64)>);

/// Splits an envelope's header from its body.
///
/// Implementations read from the start of `reader`, consuming exactly the
/// header packets, and report the byte offset where ciphertext segments
/// begin (`header.rs`'s `parse` / `get_header` in the original source).
pub trait HeaderSplitter: Send + Sync {
    /// Returns the header bytes and the offset in `reader` where the body begins.
    fn split(&self, reader: &mut dyn io::Read) -> Result<(Vec<u8>, u64), EnvelopeError>;
}

/// Deconstructs a header with the archive's master private key.
pub trait HeaderDeconstructor: Send + Sync {
    fn deconstruct(
        &self,
        header: &[u8],
        master_private_key: &[u8],
    ) -> Result<(Vec<SessionKey>, Option<EditList>), EnvelopeError>;
}

/// Decrypts ciphertext segments into a plaintext sink.
pub trait SegmentDecryptor: Send + Sync {
    /// Decrypts every segment in `reader` from start to end, writing
    /// plaintext to `sink` as it becomes available.
    fn decrypt_all(
        &self,
        reader: &mut dyn io::Read,
        session_keys: &[SessionKey],
        sink: &mut dyn FnMut(&[u8]),
    ) -> Result<(), EnvelopeError>;

    /// Decrypts only the segments named by `edit_list`.
    fn decrypt_ranges(
        &self,
        reader: &mut dyn io::Read,
        session_keys: &[SessionKey],
        edit_list: &EditList,
        sink: &mut dyn FnMut(&[u8]),
    ) -> Result<(), EnvelopeError>;
}

#[derive(Debug, snafu::Snafu)]
pub enum EnvelopeError {
    #[snafu(display("envelope I/O error: {source}"))]
    Io { source: io::Error },
    #[snafu(display("malformed envelope: {reason}"))]
    Malformed { reason: String },
    #[snafu(display("no envelope codec wired into this build"))]
    NotWired,
}

/// Placeholder codec so a worker binary links and starts without a
/// concrete Crypt4GH implementation plugged in; every call fails with
/// [`EnvelopeError::NotWired`]. Deployments swap this for a real codec the
/// same way [`crate::config::KeyConfig::Vault`] requires a real
/// `KeyProvider` before it can serve requests.
pub struct UnimplementedEnvelopeCodec;

impl HeaderSplitter for UnimplementedEnvelopeCodec {
    fn split(&self, _reader: &mut dyn io::Read) -> Result<(Vec<u8>, u64), EnvelopeError> {
        NotWiredSnafu.fail()
    }
}

impl HeaderDeconstructor for UnimplementedEnvelopeCodec {
    fn deconstruct(
        &self,
        _header: &[u8],
        _master_private_key: &[u8],
    ) -> Result<(Vec<SessionKey>, Option<EditList>), EnvelopeError> {
        NotWiredSnafu.fail()
    }
}

impl SegmentDecryptor for UnimplementedEnvelopeCodec {
    fn decrypt_all(
        &self,
        _reader: &mut dyn io::Read,
        _session_keys: &[SessionKey],
        _sink: &mut dyn FnMut(&[u8]),
    ) -> Result<(), EnvelopeError> {
        NotWiredSnafu.fail()
    }

    fn decrypt_ranges(
        &self,
        _reader: &mut dyn io::Read,
        _session_keys: &[SessionKey],
        _edit_list: &EditList,
        _sink: &mut dyn FnMut(&[u8]),
    ) -> Result<(), EnvelopeError> {
        NotWiredSnafu.fail()
    }
}
