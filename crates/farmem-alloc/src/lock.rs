//! RAII locks over cache pages.
//!
//! A lock pins a region of the pool into one cache page and exposes it
//! as a plain byte slice, so hot data can be worked on without going
//! through [`VirtMem::read`](crate::VirtMem::read) and
//! [`VirtMem::write`](crate::VirtMem::write) per access. Guards borrow
//! the allocator mutably for their whole lifetime; the borrow checker
//! rules out aliasing between locks and other allocator calls, so lock
//! counting only guards against eviction.

use std::ops::{Deref, DerefMut};

use farmem_core::{Store, VAddr};

use crate::error::AllocError;
use crate::page::PageClass;
use crate::vm::VirtMem;

/// A shared lock on a pool region.
///
/// Dereferences to the locked bytes. Dropping the guard releases the
/// page; store errors during that write-back are swallowed, call
/// [`release`](Self::release) to observe them.
#[must_use]
pub struct LockGuard<'a, S: Store> {
    vm: &'a mut VirtMem<S>,
    class: PageClass,
    idx: usize,
    len: u32,
    released: bool,
}

/// An exclusive lock on a pool region.
///
/// Like [`LockGuard`] but dereferences mutably; the page is marked
/// dirty up front and written back when it leaves the cache.
#[must_use]
pub struct LockGuardMut<'a, S: Store> {
    vm: &'a mut VirtMem<S>,
    class: PageClass,
    idx: usize,
    len: u32,
    released: bool,
}

impl<S: Store> VirtMem<S> {
    /// Lock `len` bytes at `addr` for reading.
    ///
    /// The region must fit one page of some class; longer spans return
    /// [`AllocError::LockTooLarge`] and should use
    /// [`read`](Self::read) instead.
    pub fn lock(&mut self, addr: VAddr, len: u32) -> Result<LockGuard<'_, S>, AllocError> {
        let (class, idx) = self.acquire(addr, len, true)?;
        Ok(LockGuard {
            vm: self,
            class,
            idx,
            len,
            released: false,
        })
    }

    /// Lock `len` bytes at `addr` for reading and writing.
    pub fn lock_mut(&mut self, addr: VAddr, len: u32) -> Result<LockGuardMut<'_, S>, AllocError> {
        let (class, idx) = self.acquire(addr, len, false)?;
        Ok(LockGuardMut {
            vm: self,
            class,
            idx,
            len,
            released: false,
        })
    }

    /// Lock as much of `[addr, addr + wanted)` as fits in one page,
    /// for reading and writing. The guard's slice length tells how much
    /// was locked; callers iterate until they have covered their span.
    pub fn lock_fitting_mut(
        &mut self,
        addr: VAddr,
        wanted: u32,
    ) -> Result<LockGuardMut<'_, S>, AllocError> {
        let len = self.fitting_len(addr, wanted);
        self.lock_mut(addr, len)
    }
}

impl<S: Store> Deref for LockGuard<'_, S> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.vm.set_ref(self.class).pages[self.idx].buf[..self.len as usize]
    }
}

impl<S: Store> LockGuard<'_, S> {
    /// Release the lock, surfacing any write-back error.
    pub fn release(mut self) -> Result<(), AllocError> {
        self.released = true;
        self.vm.release_page(self.class, self.idx)
    }
}

impl<S: Store> Drop for LockGuard<'_, S> {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.vm.release_page(self.class, self.idx);
        }
    }
}

impl<S: Store> Deref for LockGuardMut<'_, S> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.vm.set_ref(self.class).pages[self.idx].buf[..self.len as usize]
    }
}

impl<S: Store> DerefMut for LockGuardMut<'_, S> {
    fn deref_mut(&mut self) -> &mut [u8] {
        let len = self.len as usize;
        &mut self.vm.set_mut(self.class).pages[self.idx].buf[..len]
    }
}

impl<S: Store> LockGuardMut<'_, S> {
    /// Release the lock, surfacing any write-back error.
    pub fn release(mut self) -> Result<(), AllocError> {
        self.released = true;
        self.vm.release_page(self.class, self.idx)
    }
}

impl<S: Store> Drop for LockGuardMut<'_, S> {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.vm.release_page(self.class, self.idx);
        }
    }
}
