//! Allocator usage counters.

/// Usage statistics maintained by [`VirtMem`](crate::VirtMem).
///
/// All counters are always on; they are plain integer bumps on paths
/// that already touch the page cache, so there is no trace feature flag
/// to enable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VmStats {
    /// Bytes currently allocated from the pool, including block headers.
    pub mem_used: u64,
    /// High-water mark of [`mem_used`](Self::mem_used).
    pub max_mem_used: u64,
    /// Number of page windows loaded from the store (cache misses).
    pub page_loads: u64,
    /// Number of dirty page windows written back to the store.
    pub page_stores: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zeroed() {
        let s = VmStats::default();
        assert_eq!(s.mem_used, 0);
        assert_eq!(s.max_mem_used, 0);
        assert_eq!(s.page_loads, 0);
        assert_eq!(s.page_stores, 0);
    }
}
