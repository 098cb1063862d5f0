//! Virtual memory pools for memory-constrained programs.
//!
//! farmem lets a program allocate from a pool far larger than its RAM.
//! The pool lives on a [`Store`] backend: a RAM buffer, a file, or any
//! byte stream with a pool host on the far side. A small cache of RAM
//! pages absorbs the traffic, and a free-list heap hands out virtual
//! addresses that typed pointers make safe to pass around.
//!
//! ```
//! use farmem::prelude::*;
//!
//! # fn main() -> Result<(), AllocError> {
//! let mut vm = VirtMem::open(MemStore::new(64 * 1024), VmConfig::tiny(64 * 1024))?;
//!
//! let answer = vm.alloc_init(&42u32)?;
//! assert_eq!(vm.get(answer)?, 42);
//!
//! let names = vm.alloc_slice::<[u8; 4]>(3)?;
//! vm.write_slice(names, &[*b"tick", *b"tock", *b"boom"])?;
//! assert_eq!(vm.get_at(names, 2)?, *b"boom");
//!
//! vm.free_typed(answer)?;
//! vm.free_slice(names)?;
//! vm.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! The facade re-exports the pieces; depend on the individual crates
//! instead if you only need a subset.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub use farmem_alloc as alloc;
pub use farmem_core as core;
pub use farmem_ptr as ptr;
pub use farmem_store as store;

pub use farmem_alloc::{
    AllocError, LockGuard, LockGuardMut, PageClass, PageSetConfig, VirtMem, VmConfig, VmStats,
};
pub use farmem_core::{Store, StoreError, VAddr};
pub use farmem_ptr::{Storable, TypedVm, VPtr, VSlice};
pub use farmem_store::{FileStore, MemStore, StreamStore};

/// Everything a typical pool user needs in scope.
pub mod prelude {
    pub use farmem_alloc::{AllocError, VirtMem, VmConfig};
    pub use farmem_core::{Store, VAddr};
    pub use farmem_ptr::{Storable, TypedVm, VPtr, VSlice};
    pub use farmem_store::{FileStore, MemStore, StreamStore};
}
