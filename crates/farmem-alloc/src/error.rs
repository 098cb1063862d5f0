//! Allocator error type.

use std::error::Error;
use std::fmt;

use farmem_core::{StoreError, VAddr};

/// Errors that can occur during allocator operations.
#[derive(Debug)]
pub enum AllocError {
    /// The pool cannot satisfy the allocation.
    OutOfMemory {
        /// Requested allocation size in bytes.
        requested: u32,
        /// Total pool size in bytes.
        pool_size: u32,
    },
    /// An access fell outside the pool.
    OutOfBounds {
        /// Start address of the access.
        addr: VAddr,
        /// Length of the access in bytes.
        len: usize,
        /// Total pool size in bytes.
        pool_size: u32,
    },
    /// An address passed to `free` does not name an allocated block.
    InvalidAddress {
        /// The offending address.
        addr: VAddr,
    },
    /// A zero-sized allocation was requested.
    InvalidSize,
    /// The null address was dereferenced.
    NullAccess,
    /// A lock request exceeds the largest page size.
    LockTooLarge {
        /// Requested lock length in bytes.
        requested: u32,
        /// The big page size, the largest lockable length.
        max: u32,
    },
    /// Every cache page in the required class is pinned by a lock.
    NoFreePage,
    /// The configuration failed validation.
    InvalidConfig {
        /// What was wrong with it.
        reason: &'static str,
    },
    /// A reopened pool holds heap metadata that cannot be valid.
    CorruptPool {
        /// What was wrong with it.
        reason: &'static str,
    },
    /// The storage backend failed.
    Store(StoreError),
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory {
                requested,
                pool_size,
            } => write!(
                f,
                "pool exhausted: requested {requested} bytes from a {pool_size} byte pool"
            ),
            Self::OutOfBounds {
                addr,
                len,
                pool_size,
            } => write!(
                f,
                "access out of bounds: {addr} len {len} in a {pool_size} byte pool"
            ),
            Self::InvalidAddress { addr } => write!(f, "not an allocated block: {addr}"),
            Self::InvalidSize => write!(f, "zero-sized allocation"),
            Self::NullAccess => write!(f, "null virtual address dereferenced"),
            Self::LockTooLarge { requested, max } => {
                write!(f, "lock of {requested} bytes exceeds big page size {max}")
            }
            Self::NoFreePage => write!(f, "all cache pages are pinned by locks"),
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
            Self::CorruptPool { reason } => write!(f, "corrupt pool metadata: {reason}"),
            Self::Store(e) => write!(f, "store failure: {e}"),
        }
    }
}

impl Error for AllocError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for AllocError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
