//! Virtual memory allocator with a paged cache.
//!
//! This crate is the heart of farmem: it turns any
//! [`Store`](farmem_core::Store) backend into an allocatable byte pool
//! far larger than RAM. A first-fit free-list heap hands out virtual
//! addresses, and a small cache of RAM pages in three size classes
//! absorbs the actual data traffic, swapping windows of the pool in and
//! out on demand.
//!
//! ```
//! use farmem_alloc::{VirtMem, VmConfig};
//! use farmem_store::MemStore;
//!
//! # fn main() -> Result<(), farmem_alloc::AllocError> {
//! let mut vm = VirtMem::open(MemStore::new(64 * 1024), VmConfig::tiny(64 * 1024))?;
//! let addr = vm.alloc(11)?;
//! vm.write(addr, b"hello world")?;
//! let mut buf = [0u8; 11];
//! vm.read(addr, &mut buf)?;
//! assert_eq!(&buf, b"hello world");
//! vm.free(addr)?;
//! vm.close()?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod header;
mod lock;
mod page;
mod stats;
mod vm;

pub use config::{PageSetConfig, VmConfig};
pub use error::AllocError;
pub use lock::{LockGuard, LockGuardMut};
pub use page::PageClass;
pub use stats::VmStats;
pub use vm::VirtMem;
