//! Bridges the async [`ingest_storage::SeekableReader`] trait to
//! `std::io::Read`, for the handful of call sites (envelope header
//! splitting, segment decryption) whose contract is defined in terms of the
//! synchronous reader a crypto crate would expect. Bounded to short-lived
//! header-sized reads and body streaming, never to buffering a whole
//! archive object in memory.

use ingest_storage::BoxedReader;
use std::io;
use tokio::runtime::Handle;

pub struct SyncBridgeReader<'a> {
    inner: &'a mut BoxedReader,
    handle: Handle,
}

impl<'a> SyncBridgeReader<'a> {
    pub fn new(inner: &'a mut BoxedReader) -> Self {
        Self {
            inner,
            handle: Handle::current(),
        }
    }
}

impl<'a> io::Read for SyncBridgeReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let handle = self.handle.clone();
        let inner = &mut self.inner;
        let len = buf.len() as i64;
        let bytes = tokio::task::block_in_place(|| handle.block_on(inner.read(len)))
            .map_err(|e| io::Error::other(e.to_string()))?;
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }
}
