//! Virtual addresses within a farmem pool.

use std::fmt;

/// A byte address inside a virtual memory pool.
///
/// Addresses are plain `u32` offsets, so a pool can span up to 4 GiB.
/// Address `0` is the null address and never refers to data: the heap
/// managed by `farmem-alloc` starts past a reserved offset precisely so
/// that `0` stays free for null.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct VAddr(pub u32);

impl VAddr {
    /// The null address.
    pub const NULL: VAddr = VAddr(0);

    /// Whether this is the null address.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The raw byte offset.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Offset this address by a signed byte count.
    ///
    /// Wraps on overflow like pointer arithmetic on a fixed-width
    /// address space; callers that care validate against the pool size.
    pub fn offset(self, bytes: i64) -> VAddr {
        VAddr((i64::from(self.0) + bytes) as u32)
    }
}

impl fmt::Display for VAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl From<u32> for VAddr {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
