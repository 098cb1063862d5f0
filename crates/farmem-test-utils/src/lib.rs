//! Shared fixtures for testing farmem crates.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod counting;
mod host;

pub use counting::CountingStore;
pub use host::MockHost;

use farmem_alloc::{VirtMem, VmConfig};
use farmem_store::MemStore;

/// Small RAM-backed allocator with the constrained page geometry, so
/// tests exercise page eviction without large workloads.
pub fn tiny_vm(pool_size: u32) -> VirtMem<MemStore> {
    VirtMem::open(MemStore::new(pool_size), VmConfig::tiny(pool_size))
        .expect("tiny test allocator must open")
}

/// The page geometry used by [`tiny_vm`].
pub fn tiny_config(pool_size: u32) -> VmConfig {
    VmConfig::tiny(pool_size)
}
