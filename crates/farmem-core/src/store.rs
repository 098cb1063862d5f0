//! The storage backend trait.

use crate::error::StoreError;

/// How many bytes [`Store::zero`] writes per chunk in the provided
/// implementation.
const ZERO_CHUNK: usize = 256;

/// A backing medium for a virtual memory pool.
///
/// A `Store` is a flat, randomly addressable byte range: a RAM buffer, a
/// file, an SD card, or a remote host reached over a byte stream. The
/// allocator in `farmem-alloc` performs all pool access through this
/// trait and never reads or writes past the pool size it was configured
/// with.
///
/// Reads and writes are exact-length: a short transfer is an error, not
/// a partial success.
pub trait Store {
    /// Bring the backing medium up.
    ///
    /// Called once by the allocator before any access. Backends open
    /// files, perform handshakes, or do nothing.
    fn start(&mut self) -> Result<(), StoreError>;

    /// Shut the backing medium down.
    ///
    /// Called once when the allocator is closed. The allocator flushes
    /// its cache first, so backends only need to release resources.
    fn stop(&mut self) -> Result<(), StoreError>;

    /// Read exactly `buf.len()` bytes starting at `offset`.
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), StoreError>;

    /// Write all of `data` starting at `offset`.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), StoreError>;

    /// Fill `[0, len)` with zeros.
    ///
    /// The provided implementation writes fixed-size zero chunks.
    /// Backends with a cheaper path (file truncation) may override.
    fn zero(&mut self, len: u32) -> Result<(), StoreError> {
        let zeros = [0u8; ZERO_CHUNK];
        let mut pos = 0u32;
        while pos < len {
            let n = (len - pos).min(ZERO_CHUNK as u32) as usize;
            self.write(pos, &zeros[..n])?;
            pos += n as u32;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-test store; the real backends live in `farmem-store`.
    struct VecStore(Vec<u8>);

    impl Store for VecStore {
        fn start(&mut self) -> Result<(), StoreError> {
            Ok(())
        }

        fn stop(&mut self) -> Result<(), StoreError> {
            Ok(())
        }

        fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), StoreError> {
            let start = offset as usize;
            buf.copy_from_slice(&self.0[start..start + buf.len()]);
            Ok(())
        }

        fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), StoreError> {
            let start = offset as usize;
            self.0[start..start + data.len()].copy_from_slice(data);
            Ok(())
        }
    }

    #[test]
    fn default_zero_covers_partial_chunks() {
        let mut store = VecStore(vec![0xAA; 600]);
        store.zero(515).unwrap();
        assert!(store.0[..515].iter().all(|&b| b == 0));
        assert!(store.0[515..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn default_zero_handles_empty_range() {
        let mut store = VecStore(vec![0xAA; 16]);
        store.zero(0).unwrap();
        assert!(store.0.iter().all(|&b| b == 0xAA));
    }
}
