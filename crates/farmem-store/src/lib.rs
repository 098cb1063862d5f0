//! Storage backends for farmem pools.
//!
//! Three implementations of [`farmem_core::Store`]:
//!
//! - [`MemStore`]: a RAM buffer. Useful for tests and as the simplest
//!   possible pool.
//! - [`FileStore`]: a file on disk, so the pool survives the process
//!   and can dwarf available RAM.
//! - [`StreamStore`]: a pool hosted on the far side of any
//!   `Read + Write` byte stream (a serial port, a TCP socket), spoken
//!   with a small framed protocol.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod file;
mod mem;
mod stream;

pub use file::FileStore;
pub use mem::MemStore;
pub use stream::{Cmd, StreamStore, FRAME};
