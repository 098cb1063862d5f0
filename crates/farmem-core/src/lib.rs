//! Core types for the farmem virtual-memory toolkit.
//!
//! This crate defines the vocabulary shared by every farmem crate: the
//! [`VAddr`] virtual address type, the [`Store`] trait that storage
//! backends implement, and the [`StoreError`] failure type. It carries
//! no policy: allocation and caching live in `farmem-alloc`, concrete
//! backends in `farmem-store`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod addr;
pub mod error;
pub mod store;

pub use addr::VAddr;
pub use error::StoreError;
pub use store::Store;
