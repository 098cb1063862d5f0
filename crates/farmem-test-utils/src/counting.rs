//! Store wrapper that counts backend traffic.

use farmem_core::{Store, StoreError};

/// Wraps any [`Store`] and counts the operations passing through, so
/// tests can assert on cache behaviour (hits cause no backend reads)
/// rather than just on data correctness.
pub struct CountingStore<S: Store> {
    inner: S,
    /// Number of `read` calls.
    pub reads: u64,
    /// Number of `write` calls.
    pub writes: u64,
    /// Total bytes read.
    pub bytes_read: u64,
    /// Total bytes written.
    pub bytes_written: u64,
}

impl<S: Store> CountingStore<S> {
    /// Wrap a store with zeroed counters.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reads: 0,
            writes: 0,
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Zero all counters.
    pub fn reset(&mut self) {
        self.reads = 0;
        self.writes = 0;
        self.bytes_read = 0;
        self.bytes_written = 0;
    }
}

impl<S: Store> Store for CountingStore<S> {
    fn start(&mut self) -> Result<(), StoreError> {
        self.inner.start()
    }

    fn stop(&mut self) -> Result<(), StoreError> {
        self.inner.stop()
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), StoreError> {
        self.reads += 1;
        self.bytes_read += buf.len() as u64;
        self.inner.read(offset, buf)
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), StoreError> {
        self.writes += 1;
        self.bytes_written += data.len() as u64;
        self.inner.write(offset, data)
    }

    fn zero(&mut self, len: u32) -> Result<(), StoreError> {
        self.inner.zero(len)
    }
}
