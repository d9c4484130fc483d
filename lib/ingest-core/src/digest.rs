//! Digest sinks fed by the streaming copy/decrypt loops.
//!
//! The original source drives a coroutine (`process_output` in
//! `lega/verify.py`) with `yield` to push decrypted chunks into two hashers
//! at once. §9 of the spec calls out replacing that with a plain writer
//! object — this is that writer, one `update` call per chunk, no
//! generator-based control flow.

use md5::Md5;
use sha2::{Digest, Sha256};

/// Accumulates a sha256 digest over a byte stream.
///
/// Used by ingest to hash the full encrypted envelope when the submitter
/// didn't supply one.
#[derive(Default)]
pub struct Sha256Sink {
    hasher: Sha256,
}

impl Sha256Sink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    pub fn finish_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Accumulates sha256 and md5 digests over the same byte stream in parallel.
///
/// Used by verify to hash plaintext segments as they're decrypted. The md5
/// half exists solely for legacy downstream stable-ID assignment (see §4.6).
#[derive(Default)]
pub struct DualDigestSink {
    sha256: Sha256,
    md5: Md5,
}

impl DualDigestSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.sha256.update(chunk);
        self.md5.update(chunk);
    }

    pub fn finish_hex(self) -> (String, String) {
        (hex::encode(self.sha256.finalize()), hex::encode(self.md5.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input_matches_known_constant() {
        let sink = Sha256Sink::new();
        assert_eq!(
            sink.finish_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn dual_sink_hashes_both_algorithms_over_the_same_bytes() {
        let mut sink = DualDigestSink::new();
        sink.update(b"hello ");
        sink.update(b"world");
        let (sha256, md5) = sink.finish_hex();
        assert_eq!(
            sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde"
        );
        assert_eq!(md5, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }
}
