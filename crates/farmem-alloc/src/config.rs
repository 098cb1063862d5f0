//! Allocator configuration parameters.

/// Geometry of one cache page class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageSetConfig {
    /// Number of pages in this class.
    pub count: u8,
    /// Size of each page in bytes.
    pub size: u32,
}

/// Configuration for a [`VirtMem`](crate::VirtMem) allocator.
///
/// The three page classes trade RAM for performance: small and medium
/// pages mostly serve short-lived locks on structured data, while big
/// pages double as the general read/write cache. More pages improve
/// random access, bigger pages reduce swapping on sequential access.
/// Validated when the allocator is opened; immutable afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VmConfig {
    /// Total pool size in bytes.
    pub pool_size: u32,
    /// Small page class geometry.
    pub small: PageSetConfig,
    /// Medium page class geometry.
    pub medium: PageSetConfig,
    /// Big page class geometry. Big pages back the read/write cache,
    /// so their size also bounds lock lengths and bulk-op chunking.
    pub big: PageSetConfig,
}

impl VmConfig {
    /// Default pool size: 1 MiB.
    pub const DEFAULT_POOL_SIZE: u32 = 1024 * 1024;

    /// Smallest accepted pool.
    pub const MIN_POOL_SIZE: u32 = 256;

    /// Smallest accepted page size.
    pub const MIN_PAGE_SIZE: u32 = 16;

    /// Create a config with the desktop-profile page geometry:
    /// 4×64 B small, 4×256 B medium, 4×8 KiB big pages.
    pub fn new(pool_size: u32) -> Self {
        Self {
            pool_size,
            small: PageSetConfig { count: 4, size: 64 },
            medium: PageSetConfig {
                count: 4,
                size: 256,
            },
            big: PageSetConfig {
                count: 4,
                size: 8 * 1024,
            },
        }
    }

    /// Create a config with the constrained-device page geometry:
    /// 2×16 B small, 1×32 B medium, 1×128 B big pages.
    ///
    /// With a single big page every non-resident access faults, which
    /// also makes this geometry useful for exercising eviction in tests.
    pub fn tiny(pool_size: u32) -> Self {
        Self {
            pool_size,
            small: PageSetConfig { count: 2, size: 16 },
            medium: PageSetConfig { count: 1, size: 32 },
            big: PageSetConfig {
                count: 1,
                size: 128,
            },
        }
    }

    /// RAM consumed by the cache pages of this config.
    pub fn cache_bytes(&self) -> usize {
        [self.small, self.medium, self.big]
            .iter()
            .map(|c| c.count as usize * c.size as usize)
            .sum()
    }

    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.pool_size < Self::MIN_POOL_SIZE {
            return Err("pool size below minimum");
        }
        for class in [&self.small, &self.medium, &self.big] {
            if class.count == 0 {
                return Err("page class needs at least one page");
            }
            if class.size < Self::MIN_PAGE_SIZE {
                return Err("page size below minimum");
            }
        }
        if self.small.size > self.medium.size || self.medium.size > self.big.size {
            return Err("page class sizes must be ascending");
        }
        Ok(())
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_POOL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry_validates() {
        assert!(VmConfig::default().validate().is_ok());
        assert!(VmConfig::tiny(4096).validate().is_ok());
    }

    #[test]
    fn rejects_tiny_pool() {
        let cfg = VmConfig::new(64);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_page_count() {
        let mut cfg = VmConfig::default();
        cfg.big.count = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_descending_class_sizes() {
        let mut cfg = VmConfig::default();
        cfg.medium.size = cfg.small.size / 2;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn cache_bytes_sums_all_classes() {
        let cfg = VmConfig::tiny(4096);
        assert_eq!(cfg.cache_bytes(), 2 * 16 + 32 + 128);
    }
}
