//! RAM-backed store.

use farmem_core::{Store, StoreError};

/// A pool backed by a plain RAM buffer.
///
/// Mostly useful for tests and examples; it also serves devices where
/// a slab of slow RAM backs a pool accessed through the fast cache
/// pages. Contents persist across [`stop`](Store::stop) and
/// [`start`](Store::start).
#[derive(Debug)]
pub struct MemStore {
    buf: Vec<u8>,
}

impl MemStore {
    /// Create a zeroed store of `capacity` bytes.
    pub fn new(capacity: u32) -> Self {
        Self {
            buf: vec![0; capacity as usize],
        }
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> u32 {
        self.buf.len() as u32
    }

    fn check(&self, offset: u32, len: usize) -> Result<(), StoreError> {
        if offset as usize + len > self.buf.len() {
            return Err(StoreError::OutOfRange {
                offset,
                len,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }
}

impl Store for MemStore {
    fn start(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), StoreError> {
        self.check(offset, buf.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.buf[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), StoreError> {
        self.check(offset, data.len())?;
        let start = offset as usize;
        self.buf[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn zero(&mut self, len: u32) -> Result<(), StoreError> {
        self.check(0, len as usize)?;
        self.buf[..len as usize].fill(0);
        Ok(())
    }
}
