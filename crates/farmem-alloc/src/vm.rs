//! The virtual memory allocator.
//!
//! [`VirtMem`] owns a storage backend and runs a first-fit free-list
//! heap over it. The free list is circular and address-sorted, anchored
//! at an in-RAM pseudo block, and the heap claims pool space lazily
//! through a watermark so an unused pool costs no backend traffic. All
//! data moves through the cache pages in [`crate::page`].

use std::cmp::Ordering;

use farmem_core::{Store, VAddr};

use crate::config::VmConfig;
use crate::error::AllocError;
use crate::header::{Header, BASE, HEADER_BYTES, MIN_GROW_BLOCKS, START_OFFSET};
use crate::page::{PageClass, PageSet};
use crate::stats::VmStats;

/// Stack buffer size for bulk copy and compare loops.
const COPY_CHUNK: usize = 256;

/// A virtual memory allocator over a [`Store`] backend.
///
/// Created with [`open`](Self::open), which starts the backend and
/// zeroes the pool; shut down with [`close`](Self::close), which
/// flushes the cache and hands the backend back. Dropping a `VirtMem`
/// without closing it discards any unflushed cache pages.
///
/// All methods take `&mut self`: the allocator is single-threaded by
/// construction, and lock guards borrow it for their whole lifetime.
#[derive(Debug)]
pub struct VirtMem<S: Store> {
    store: S,
    cfg: VmConfig,
    small: PageSet,
    medium: PageSet,
    big: PageSet,
    /// Next never-claimed pool offset; the heap grows toward
    /// `cfg.pool_size` on demand.
    free_pos: u32,
    /// In-RAM head of the circular free list.
    base_header: Header,
    stats: VmStats,
}

impl<S: Store> VirtMem<S> {
    /// Start `store` and build an allocator over it with the given
    /// configuration. The pool is zeroed, so any previous content of
    /// the backend is discarded.
    pub fn open(mut store: S, cfg: VmConfig) -> Result<Self, AllocError> {
        cfg.validate()
            .map_err(|reason| AllocError::InvalidConfig { reason })?;
        store.start()?;
        store.zero(cfg.pool_size)?;
        Ok(Self {
            store,
            cfg,
            small: PageSet::new(cfg.small.count, cfg.small.size),
            medium: PageSet::new(cfg.medium.count, cfg.medium.size),
            big: PageSet::new(cfg.big.count, cfg.big.size),
            free_pos: START_OFFSET,
            base_header: Header {
                next: BASE,
                size: 0,
            },
            stats: VmStats::default(),
        })
    }

    /// Attach to a pool that an earlier allocator wrote and closed.
    ///
    /// The backend is started but not zeroed; the heap resumes from
    /// the watermark and free-list head persisted in the pool's first
    /// eight bytes. Usage counters start from zero, they are
    /// per-session. Fails with [`AllocError::CorruptPool`] when the
    /// metadata cannot describe a heap in a pool of this size.
    pub fn open_existing(mut store: S, cfg: VmConfig) -> Result<Self, AllocError> {
        cfg.validate()
            .map_err(|reason| AllocError::InvalidConfig { reason })?;
        store.start()?;
        let mut meta = [0u8; 8];
        store.read(0, &mut meta)?;
        let free_pos = u32::from_le_bytes([meta[0], meta[1], meta[2], meta[3]]);
        let free_head = u32::from_le_bytes([meta[4], meta[5], meta[6], meta[7]]);

        // An all-zero word pair is a never-used pool.
        let free_pos = if free_pos == 0 { START_OFFSET } else { free_pos };
        let free_head = if free_head == 0 { BASE } else { free_head };
        if free_pos < START_OFFSET
            || free_pos > cfg.pool_size
            || free_pos % HEADER_BYTES != 0
        {
            return Err(AllocError::CorruptPool {
                reason: "watermark outside the pool",
            });
        }
        if free_head != BASE && (free_head % HEADER_BYTES != 0 || free_head >= free_pos) {
            return Err(AllocError::CorruptPool {
                reason: "free list head outside the claimed pool",
            });
        }
        Ok(Self {
            store,
            cfg,
            small: PageSet::new(cfg.small.count, cfg.small.size),
            medium: PageSet::new(cfg.medium.count, cfg.medium.size),
            big: PageSet::new(cfg.big.count, cfg.big.size),
            free_pos,
            base_header: Header {
                next: free_head,
                size: 0,
            },
            stats: VmStats::default(),
        })
    }

    /// Flush the cache, stop the backend and return it.
    pub fn close(mut self) -> Result<S, AllocError> {
        self.flush()?;
        self.store.stop()?;
        Ok(self.store)
    }

    /// Total pool size in bytes.
    pub fn pool_size(&self) -> u32 {
        self.cfg.pool_size
    }

    /// The configuration this allocator was opened with.
    pub fn config(&self) -> &VmConfig {
        &self.cfg
    }

    /// Current usage counters.
    pub fn stats(&self) -> VmStats {
        self.stats
    }

    /// Number of cache pages in a class.
    pub fn page_count(&self, class: PageClass) -> usize {
        self.set_ref(class).pages.len()
    }

    /// Page size of a class in bytes.
    pub fn page_size(&self, class: PageClass) -> u32 {
        self.set_ref(class).page_size
    }

    /// Number of cache pages in a class holding nothing.
    pub fn free_pages(&self, class: PageClass) -> usize {
        self.set_ref(class).free_pages()
    }

    /// Number of cache pages in a class not pinned by a lock.
    pub fn unlocked_pages(&self, class: PageClass) -> usize {
        self.set_ref(class).unlocked_pages()
    }

    /// Write every dirty cache page back to the store, along with the
    /// heap metadata in the pool's first eight bytes. A flushed store
    /// can be reattached later with
    /// [`open_existing`](Self::open_existing).
    pub fn flush(&mut self) -> Result<(), AllocError> {
        self.small.sync_all(&mut self.store, &mut self.stats)?;
        self.medium.sync_all(&mut self.store, &mut self.stats)?;
        self.big.sync_all(&mut self.store, &mut self.stats)?;
        // Cache pages never cover the metadata words, so this write
        // cannot be shadowed by a later page sync.
        let mut meta = [0u8; 8];
        meta[..4].copy_from_slice(&self.free_pos.to_le_bytes());
        meta[4..].copy_from_slice(&self.base_header.next.to_le_bytes());
        self.store.write(0, &meta)?;
        Ok(())
    }

    /// Flush and then drop every cache page. The next access of any
    /// address faults its page back in.
    pub fn clear_cache(&mut self) -> Result<(), AllocError> {
        self.flush()?;
        self.small.invalidate_all();
        self.medium.invalidate_all();
        self.big.invalidate_all();
        Ok(())
    }

    // ---- heap ----

    /// Allocate `size` bytes from the pool and return the address of
    /// the payload.
    ///
    /// First fit over the free list; when nothing fits, the watermark
    /// claims more of the pool (at least sixteen blocks at a time) and
    /// the scan restarts. A block that is larger than the
    /// request is split from its tail, leaving the remainder listed
    /// without relinking.
    pub fn alloc(&mut self, size: u32) -> Result<VAddr, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidSize);
        }
        let quantity64 =
            (u64::from(size) + u64::from(HEADER_BYTES) - 1) / u64::from(HEADER_BYTES) + 1;
        if quantity64 * u64::from(HEADER_BYTES) > u64::from(self.cfg.pool_size) {
            return Err(AllocError::OutOfMemory {
                requested: size,
                pool_size: self.cfg.pool_size,
            });
        }
        let quantity = quantity64 as u32;

        let mut prev = BASE;
        let mut cur = self.base_header.next;
        loop {
            if cur == BASE {
                // Wrapped around (or the list is empty): claim more of
                // the pool and rescan.
                if !self.grow(quantity)? {
                    return Err(AllocError::OutOfMemory {
                        requested: size,
                        pool_size: self.cfg.pool_size,
                    });
                }
                prev = BASE;
                cur = self.base_header.next;
                continue;
            }
            let mut h = self.load_header(cur)?;
            if h.size >= quantity {
                let block = if h.size == quantity {
                    let mut ph = self.load_header(prev)?;
                    ph.next = h.next;
                    self.store_header(prev, ph)?;
                    cur
                } else {
                    h.size -= quantity;
                    self.store_header(cur, h)?;
                    let tail = cur + h.size * HEADER_BYTES;
                    self.store_header(
                        tail,
                        Header {
                            next: 0,
                            size: quantity,
                        },
                    )?;
                    tail
                };
                self.stats.mem_used += u64::from(quantity) * u64::from(HEADER_BYTES);
                self.stats.max_mem_used = self.stats.max_mem_used.max(self.stats.mem_used);
                return Ok(VAddr::from(block + HEADER_BYTES));
            }
            prev = cur;
            cur = h.next;
        }
    }

    /// Return an allocated block to the free list.
    ///
    /// Freeing the null address is a no-op. The block header is read
    /// back for the size; addresses that cannot name an allocated block
    /// are rejected, but a stale pointer into a previously freed block
    /// is not detectable.
    pub fn free(&mut self, addr: VAddr) -> Result<(), AllocError> {
        if addr.is_null() {
            return Ok(());
        }
        let a = addr.raw();
        if a < START_OFFSET + HEADER_BYTES || a % HEADER_BYTES != 0 {
            return Err(AllocError::InvalidAddress { addr });
        }
        let block = a - HEADER_BYTES;
        let h = self.load_header(block)?;
        let bytes = u64::from(h.size) * u64::from(HEADER_BYTES);
        if h.size == 0 || u64::from(block) + bytes > u64::from(self.free_pos) {
            return Err(AllocError::InvalidAddress { addr });
        }
        self.stats.mem_used = self.stats.mem_used.saturating_sub(bytes);
        self.insert_free(block)
    }

    /// Extend the watermark by at least `quantity` blocks and put the
    /// new block on the free list. Returns `false` when the pool has no
    /// room left even for an exact-sized block.
    fn grow(&mut self, quantity: u32) -> Result<bool, AllocError> {
        let avail = u64::from(self.cfg.pool_size - self.free_pos);
        let mut nblocks = quantity.max(MIN_GROW_BLOCKS);
        if u64::from(nblocks) * u64::from(HEADER_BYTES) > avail {
            nblocks = quantity;
            if u64::from(nblocks) * u64::from(HEADER_BYTES) > avail {
                return Ok(false);
            }
        }
        let block = self.free_pos;
        self.store_header(
            block,
            Header {
                next: 0,
                size: nblocks,
            },
        )?;
        self.free_pos += nblocks * HEADER_BYTES;
        self.insert_free(block)?;
        Ok(true)
    }

    /// Link the block at `addr` into the address-sorted free list,
    /// coalescing with adjacent free neighbours.
    fn insert_free(&mut self, addr: u32) -> Result<(), AllocError> {
        let mut h = self.load_header(addr)?;

        let mut prev = BASE;
        let mut cur = self.base_header.next;
        while cur != BASE && cur < addr {
            prev = cur;
            cur = self.load_header(cur)?.next;
        }

        if cur != BASE && addr + h.size * HEADER_BYTES == cur {
            let ch = self.load_header(cur)?;
            h.size += ch.size;
            h.next = ch.next;
        } else {
            h.next = cur;
        }

        if prev != BASE {
            let mut ph = self.load_header(prev)?;
            if prev + ph.size * HEADER_BYTES == addr {
                ph.size += h.size;
                ph.next = h.next;
                return self.store_header(prev, ph);
            }
        }
        self.store_header(addr, h)?;
        let mut ph = self.load_header(prev)?;
        ph.next = addr;
        self.store_header(prev, ph)
    }

    fn load_header(&mut self, addr: u32) -> Result<Header, AllocError> {
        if addr == BASE {
            return Ok(self.base_header);
        }
        let mut buf = [0u8; HEADER_BYTES as usize];
        self.read_raw(addr, &mut buf)?;
        Ok(Header::decode(&buf))
    }

    fn store_header(&mut self, addr: u32, h: Header) -> Result<(), AllocError> {
        if addr == BASE {
            self.base_header = h;
            return Ok(());
        }
        self.write_raw(addr, &h.encode())
    }

    /// Free-list snapshot as `(block address, block bytes)` pairs, in
    /// address order. Diagnostic; the heap never needs it.
    pub fn free_blocks(&mut self) -> Result<Vec<(VAddr, u32)>, AllocError> {
        let mut out = Vec::new();
        let mut cur = self.base_header.next;
        while cur != BASE {
            let h = self.load_header(cur)?;
            out.push((VAddr::from(cur), h.size * HEADER_BYTES));
            cur = h.next;
        }
        Ok(out)
    }

    // ---- data access ----

    fn check_range(&self, addr: VAddr, len: usize) -> Result<(), AllocError> {
        if addr.is_null() {
            return Err(AllocError::NullAccess);
        }
        if u64::from(addr.raw()) + len as u64 > u64::from(self.cfg.pool_size) {
            return Err(AllocError::OutOfBounds {
                addr,
                len,
                pool_size: self.cfg.pool_size,
            });
        }
        Ok(())
    }

    /// Read `buf.len()` bytes starting at `addr` through the cache.
    pub fn read(&mut self, addr: VAddr, buf: &mut [u8]) -> Result<(), AllocError> {
        self.check_range(addr, buf.len())?;
        self.read_raw(addr.raw(), buf)
    }

    /// Write `data` starting at `addr` through the cache. The touched
    /// pages become dirty; the store sees the bytes on eviction or
    /// [`flush`](Self::flush).
    pub fn write(&mut self, addr: VAddr, data: &[u8]) -> Result<(), AllocError> {
        self.check_range(addr, data.len())?;
        self.write_raw(addr.raw(), data)
    }

    fn read_raw(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), AllocError> {
        let mut off = 0usize;
        while off < buf.len() {
            let a = addr + off as u32;
            let chunk = (buf.len() - off).min(self.cfg.big.size as usize);
            let idx = self.big.pull(
                &mut self.store,
                &mut self.stats,
                self.cfg.pool_size,
                a,
                chunk as u32,
                true,
                false,
            )?;
            let pg = &self.big.pages[idx];
            let s = (a - pg.start) as usize;
            buf[off..off + chunk].copy_from_slice(&pg.buf[s..s + chunk]);
            off += chunk;
        }
        Ok(())
    }

    fn write_raw(&mut self, addr: u32, data: &[u8]) -> Result<(), AllocError> {
        let mut off = 0usize;
        while off < data.len() {
            let a = addr + off as u32;
            let chunk = (data.len() - off).min(self.cfg.big.size as usize);
            let idx = self.big.pull(
                &mut self.store,
                &mut self.stats,
                self.cfg.pool_size,
                a,
                chunk as u32,
                false,
                false,
            )?;
            let pg = &mut self.big.pages[idx];
            let s = (a - pg.start) as usize;
            pg.buf[s..s + chunk].copy_from_slice(&data[off..off + chunk]);
            off += chunk;
        }
        Ok(())
    }

    /// Set `len` bytes starting at `addr` to `value`.
    pub fn fill(&mut self, addr: VAddr, len: u32, value: u8) -> Result<(), AllocError> {
        self.check_range(addr, len as usize)?;
        let mut done = 0u32;
        while done < len {
            let a = addr.raw() + done;
            let chunk = (len - done).min(self.cfg.big.size);
            let idx = self.big.pull(
                &mut self.store,
                &mut self.stats,
                self.cfg.pool_size,
                a,
                chunk,
                false,
                false,
            )?;
            let pg = &mut self.big.pages[idx];
            let s = (a - pg.start) as usize;
            pg.buf[s..s + chunk as usize].fill(value);
            done += chunk;
        }
        Ok(())
    }

    /// Copy `len` bytes from `src` to `dst`. The regions may overlap;
    /// the result is as if the source had been read in full first.
    pub fn copy_within(&mut self, src: VAddr, dst: VAddr, len: u32) -> Result<(), AllocError> {
        self.check_range(src, len as usize)?;
        self.check_range(dst, len as usize)?;
        if len == 0 || src == dst {
            return Ok(());
        }
        let mut buf = [0u8; COPY_CHUNK];
        if dst.raw() > src.raw() && dst.raw() < src.raw() + len {
            // Forward overlap: copy back to front so unread source
            // bytes are never clobbered.
            let mut remaining = len;
            while remaining > 0 {
                let chunk = remaining.min(COPY_CHUNK as u32);
                remaining -= chunk;
                self.read_raw(src.raw() + remaining, &mut buf[..chunk as usize])?;
                self.write_raw(dst.raw() + remaining, &buf[..chunk as usize])?;
            }
        } else {
            let mut done = 0u32;
            while done < len {
                let chunk = (len - done).min(COPY_CHUNK as u32);
                self.read_raw(src.raw() + done, &mut buf[..chunk as usize])?;
                self.write_raw(dst.raw() + done, &buf[..chunk as usize])?;
                done += chunk;
            }
        }
        Ok(())
    }

    /// Lexicographically compare `len` bytes at `a` against `len` bytes
    /// at `b`.
    pub fn compare(&mut self, a: VAddr, b: VAddr, len: u32) -> Result<Ordering, AllocError> {
        self.check_range(a, len as usize)?;
        self.check_range(b, len as usize)?;
        let mut ba = [0u8; COPY_CHUNK];
        let mut bb = [0u8; COPY_CHUNK];
        let mut done = 0u32;
        while done < len {
            let chunk = ((len - done).min(COPY_CHUNK as u32)) as usize;
            self.read_raw(a.raw() + done, &mut ba[..chunk])?;
            self.read_raw(b.raw() + done, &mut bb[..chunk])?;
            match ba[..chunk].cmp(&bb[..chunk]) {
                Ordering::Equal => {}
                other => return Ok(other),
            }
            done += chunk as u32;
        }
        Ok(Ordering::Equal)
    }

    // ---- lock plumbing ----

    /// Smallest page class whose pages can hold `len` bytes, or `None`
    /// when `len` exceeds even the big page size. This is the class a
    /// lock of that length would pin.
    pub fn class_for(&self, len: u32) -> Option<PageClass> {
        if len <= self.cfg.small.size {
            Some(PageClass::Small)
        } else if len <= self.cfg.medium.size {
            Some(PageClass::Medium)
        } else if len <= self.cfg.big.size {
            Some(PageClass::Big)
        } else {
            None
        }
    }

    pub(crate) fn set_ref(&self, class: PageClass) -> &PageSet {
        match class {
            PageClass::Small => &self.small,
            PageClass::Medium => &self.medium,
            PageClass::Big => &self.big,
        }
    }

    pub(crate) fn set_mut(&mut self, class: PageClass) -> &mut PageSet {
        match class {
            PageClass::Small => &mut self.small,
            PageClass::Medium => &mut self.medium,
            PageClass::Big => &mut self.big,
        }
    }

    /// Pin `[addr, addr + len)` in a page of the smallest fitting
    /// class. The page is loaded so it starts exactly at `addr`, and
    /// its lock count goes up; pages in other classes overlapping the
    /// range are flushed out first so there is only one copy in RAM.
    pub(crate) fn acquire(
        &mut self,
        addr: VAddr,
        len: u32,
        readonly: bool,
    ) -> Result<(PageClass, usize), AllocError> {
        if addr.is_null() {
            return Err(AllocError::NullAccess);
        }
        if len == 0 {
            return Err(AllocError::InvalidSize);
        }
        let class = self.class_for(len).ok_or(AllocError::LockTooLarge {
            requested: len,
            max: self.cfg.big.size,
        })?;
        self.check_range(addr, len as usize)?;

        let a = addr.raw();
        if class != PageClass::Small {
            self.small
                .evict_overlapping(&mut self.store, &mut self.stats, a, len)?;
        }
        if class != PageClass::Medium {
            self.medium
                .evict_overlapping(&mut self.store, &mut self.stats, a, len)?;
        }
        if class != PageClass::Big {
            self.big
                .evict_overlapping(&mut self.store, &mut self.stats, a, len)?;
        }

        let set = match class {
            PageClass::Small => &mut self.small,
            PageClass::Medium => &mut self.medium,
            PageClass::Big => &mut self.big,
        };
        let idx = set.pull(
            &mut self.store,
            &mut self.stats,
            self.cfg.pool_size,
            a,
            len,
            readonly,
            true,
        )?;
        set.pages[idx].locks += 1;
        Ok((class, idx))
    }

    /// Drop one lock on a page. When the last lock on a small or
    /// medium page goes away the page is written back and emptied;
    /// those classes exist only to serve locks. Big pages stay cached.
    pub(crate) fn release_page(&mut self, class: PageClass, idx: usize) -> Result<(), AllocError> {
        let (set, keep) = match class {
            PageClass::Small => (&mut self.small, false),
            PageClass::Medium => (&mut self.medium, false),
            PageClass::Big => (&mut self.big, true),
        };
        let pg = &mut set.pages[idx];
        pg.locks = pg.locks.saturating_sub(1);
        if pg.locks == 0 && !keep {
            set.sync(&mut self.store, &mut self.stats, idx)?;
            set.pages[idx].start = 0;
        }
        Ok(())
    }

    /// Largest lockable span starting at `addr`: clamped to the big
    /// page size and the pool end.
    pub(crate) fn fitting_len(&self, addr: VAddr, wanted: u32) -> u32 {
        wanted
            .min(self.cfg.big.size)
            .min(self.cfg.pool_size.saturating_sub(addr.raw()))
    }
}
