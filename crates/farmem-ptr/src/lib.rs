//! Typed pointers over farmem pools.
//!
//! `farmem-alloc` deals in raw addresses and byte slices. This crate
//! adds the typed layer: the [`Storable`] encoding trait, the
//! [`VPtr`]/[`VSlice`] pointer types, and the [`TypedVm`] extension
//! trait that lets an allocator hand out and dereference them.
//!
//! ```
//! use farmem_alloc::{VirtMem, VmConfig};
//! use farmem_ptr::TypedVm;
//! use farmem_store::MemStore;
//!
//! # fn main() -> Result<(), farmem_alloc::AllocError> {
//! let mut vm = VirtMem::open(MemStore::new(64 * 1024), VmConfig::tiny(64 * 1024))?;
//! let counter = vm.alloc_init(&0u64)?;
//! let n = vm.get(counter)?;
//! vm.put(counter, &(n + 1))?;
//! assert_eq!(vm.get(counter)?, 1);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod storable;
mod typed;
mod vptr;

pub use storable::Storable;
pub use typed::TypedVm;
pub use vptr::{VPtr, VSlice};
