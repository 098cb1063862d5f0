//! Cache pages and per-class page pools.
//!
//! A [`Page`] is an in-RAM window over the pool; a [`PageSet`] is the
//! fixed array of pages of one size class. Big pages back the general
//! read/write cache, all classes serve locks. Eviction prefers, in
//! order: a page already covering the request, pages overlapping the
//! window about to load (they must go anyway), empty pages, clean
//! pages, and finally dirty pages in FIFO order. A dirty page may dodge
//! eviction a bounded number of times before it counts as fair game.

use smallvec::SmallVec;

use farmem_core::Store;

use crate::error::AllocError;
use crate::stats::VmStats;

/// How often a dirty page may be passed over in favour of a clean one
/// before it is treated as clean itself.
const MAX_CLEAN_SKIPS: u8 = 5;

/// The three cache page size classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageClass {
    /// Smallest pages; short locks on scalar-sized data.
    Small,
    /// Mid-sized pages; locks on structs and small buffers.
    Medium,
    /// Largest pages; the read/write cache and bulk-op locks.
    Big,
}

/// One in-RAM cache page.
#[derive(Debug)]
pub(crate) struct Page {
    /// Pool address of the loaded window; 0 means empty.
    pub(crate) start: u32,
    /// Valid bytes in `buf` (the window can be short near the pool end).
    pub(crate) used: u32,
    /// Page buffer, allocated to the class page size.
    pub(crate) buf: Vec<u8>,
    /// Active lock count; a locked page is never evicted.
    pub(crate) locks: u8,
    /// Times this page dodged eviction while dirty.
    pub(crate) clean_skips: u8,
    /// Whether `buf` has modifications not yet written back.
    pub(crate) dirty: bool,
}

impl Page {
    fn new(size: u32) -> Self {
        Self {
            start: 0,
            used: 0,
            buf: vec![0; size as usize],
            locks: 0,
            clean_skips: 0,
            dirty: false,
        }
    }
}

/// Eviction candidate ranking, worst to best.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Candidate {
    None,
    Dirty,
    Clean,
    Empty,
    Overlap,
}

/// The fixed set of cache pages of one size class.
#[derive(Debug)]
pub(crate) struct PageSet {
    pub(crate) pages: SmallVec<[Page; 4]>,
    pub(crate) page_size: u32,
    /// FIFO cursor for dirty-page eviction.
    next_swap: usize,
}

impl PageSet {
    pub(crate) fn new(count: u8, page_size: u32) -> Self {
        let mut pages = SmallVec::with_capacity(count as usize);
        for _ in 0..count {
            pages.push(Page::new(page_size));
        }
        Self {
            pages,
            page_size,
            next_swap: 0,
        }
    }

    /// Make `[addr, addr + len)` resident in some page of this set and
    /// return the page index.
    ///
    /// With `forcestart` the chosen page must begin exactly at `addr`
    /// (lock acquisition); otherwise any page containing the range is a
    /// hit. On a miss a window of up to one page size is loaded from
    /// the store, evicting by the candidate ranking. A non-readonly
    /// pull marks the page dirty.
    ///
    /// The caller guarantees `len <= page_size` and
    /// `addr + len <= pool_size`.
    pub(crate) fn pull<S: Store>(
        &mut self,
        store: &mut S,
        stats: &mut VmStats,
        pool_size: u32,
        addr: u32,
        len: u32,
        readonly: bool,
        forcestart: bool,
    ) -> Result<usize, AllocError> {
        // Address 0 is the null address and doubles as the empty-page
        // sentinel; the heap never hands it out.
        debug_assert!(addr != 0);
        debug_assert!(len <= self.page_size);
        debug_assert!(u64::from(addr) + u64::from(len) <= u64::from(pool_size));

        // Already resident?
        for i in 0..self.pages.len() {
            let pg = &self.pages[i];
            if pg.start == 0 {
                continue;
            }
            let hit = if forcestart {
                pg.start == addr && len <= pg.used
            } else {
                addr >= pg.start && addr + len <= pg.start + pg.used
            };
            if hit {
                if !readonly {
                    self.pages[i].dirty = true;
                }
                return Ok(i);
            }
        }

        let window = self.page_size.min(pool_size - addr);

        // Pick a victim. Pages overlapping the incoming window are
        // written back and invalidated no matter what gets chosen, so
        // the load cannot leave two pages covering the same range.
        let mut found = Candidate::None;
        let mut cand = 0usize;
        for i in 0..self.pages.len() {
            if self.pages[i].locks > 0 {
                continue;
            }
            if self.pages[i].start == 0 {
                if found < Candidate::Empty {
                    found = Candidate::Empty;
                    cand = i;
                }
                continue;
            }
            let pstart = self.pages[i].start;
            let pend = pstart + self.pages[i].used;
            if addr < pend && addr + window > pstart {
                self.sync(store, stats, i)?;
                self.pages[i].start = 0;
                found = Candidate::Overlap;
                cand = i;
                continue;
            }
            if found < Candidate::Clean {
                let clean = if self.pages[i].dirty {
                    self.pages[i].clean_skips += 1;
                    self.pages[i].clean_skips >= MAX_CLEAN_SKIPS
                } else {
                    true
                };
                if clean {
                    found = Candidate::Clean;
                    cand = i;
                } else if found < Candidate::Dirty && i == self.next_swap {
                    found = Candidate::Dirty;
                    cand = i;
                }
            }
        }

        if found == Candidate::None {
            // The FIFO cursor can sit on a locked page; fall back to
            // any unlocked page before giving up.
            match (0..self.pages.len()).find(|&i| self.pages[i].locks == 0) {
                Some(i) => {
                    found = Candidate::Dirty;
                    cand = i;
                }
                None => return Err(AllocError::NoFreePage),
            }
        }

        if self.pages[cand].start != 0 {
            self.sync(store, stats, cand)?;
        }
        if found == Candidate::Dirty {
            self.next_swap = (self.next_swap + 1) % self.pages.len();
        } else {
            self.next_swap = 0;
        }

        let pg = &mut self.pages[cand];
        store.read(addr, &mut pg.buf[..window as usize])?;
        stats.page_loads += 1;
        pg.start = addr;
        pg.used = window;
        pg.clean_skips = 0;
        pg.dirty = !readonly;
        Ok(cand)
    }

    /// Write page `i` back to the store if it is dirty.
    pub(crate) fn sync<S: Store>(
        &mut self,
        store: &mut S,
        stats: &mut VmStats,
        i: usize,
    ) -> Result<(), AllocError> {
        let pg = &mut self.pages[i];
        if pg.dirty && pg.start != 0 {
            store.write(pg.start, &pg.buf[..pg.used as usize])?;
            pg.dirty = false;
            pg.clean_skips = 0;
            stats.page_stores += 1;
        }
        Ok(())
    }

    /// Write back every dirty page.
    pub(crate) fn sync_all<S: Store>(
        &mut self,
        store: &mut S,
        stats: &mut VmStats,
    ) -> Result<(), AllocError> {
        for i in 0..self.pages.len() {
            self.sync(store, stats, i)?;
        }
        Ok(())
    }

    /// Write back and drop every unlocked page overlapping
    /// `[addr, addr + len)`. Used to keep classes coherent when a lock
    /// pulls a region into a different set than the one caching it.
    pub(crate) fn evict_overlapping<S: Store>(
        &mut self,
        store: &mut S,
        stats: &mut VmStats,
        addr: u32,
        len: u32,
    ) -> Result<(), AllocError> {
        for i in 0..self.pages.len() {
            let pg = &self.pages[i];
            if pg.start == 0 || pg.locks > 0 {
                continue;
            }
            if addr < pg.start + pg.used && addr + len > pg.start {
                self.sync(store, stats, i)?;
                self.pages[i].start = 0;
            }
        }
        Ok(())
    }

    /// Drop every page without writing anything back. Callers sync first.
    pub(crate) fn invalidate_all(&mut self) {
        for pg in &mut self.pages {
            pg.start = 0;
            pg.used = 0;
            pg.dirty = false;
            pg.clean_skips = 0;
        }
        self.next_swap = 0;
    }

    pub(crate) fn free_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.start == 0).count()
    }

    pub(crate) fn unlocked_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.locks == 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmem_store::MemStore;

    const POOL: u32 = 4096;

    fn set_and_store(count: u8, size: u32) -> (PageSet, MemStore, VmStats) {
        let mut store = MemStore::new(POOL);
        store.start().unwrap();
        (PageSet::new(count, size), store, VmStats::default())
    }

    fn write_at(set: &mut PageSet, idx: usize, addr: u32, byte: u8) {
        let pg = &mut set.pages[idx];
        let off = (addr - pg.start) as usize;
        pg.buf[off] = byte;
    }

    #[test]
    fn pull_loads_window_at_address() {
        let (mut set, mut store, mut stats) = set_and_store(2, 64);
        store.write(100, &[7, 8, 9]).unwrap();

        let idx = set.pull(&mut store, &mut stats, POOL, 100, 3, true, false).unwrap();
        assert_eq!(set.pages[idx].start, 100);
        assert_eq!(set.pages[idx].used, 64);
        assert_eq!(&set.pages[idx].buf[..3], &[7, 8, 9]);
        assert_eq!(stats.page_loads, 1);
        assert!(!set.pages[idx].dirty);
    }

    #[test]
    fn contained_request_is_a_hit() {
        let (mut set, mut store, mut stats) = set_and_store(2, 64);
        let first = set.pull(&mut store, &mut stats, POOL, 100, 8, true, false).unwrap();
        let second = set.pull(&mut store, &mut stats, POOL, 120, 8, true, false).unwrap();
        assert_eq!(first, second);
        assert_eq!(stats.page_loads, 1);
    }

    #[test]
    fn forcestart_rejects_mid_page_hit() {
        let (mut set, mut store, mut stats) = set_and_store(2, 64);
        set.pull(&mut store, &mut stats, POOL, 100, 8, true, false).unwrap();
        let idx = set.pull(&mut store, &mut stats, POOL, 120, 8, true, true).unwrap();
        assert_eq!(set.pages[idx].start, 120);
        assert_eq!(stats.page_loads, 2);
    }

    #[test]
    fn window_clamps_at_pool_end() {
        let (mut set, mut store, mut stats) = set_and_store(1, 64);
        let idx = set
            .pull(&mut store, &mut stats, POOL, POOL - 10, 10, true, false)
            .unwrap();
        assert_eq!(set.pages[idx].used, 10);
    }

    #[test]
    fn dirty_page_written_back_on_eviction() {
        let (mut set, mut store, mut stats) = set_and_store(1, 64);
        let idx = set.pull(&mut store, &mut stats, POOL, 8, 8, false, false).unwrap();
        write_at(&mut set, idx, 12, 0xAB);
        assert!(set.pages[idx].dirty);

        // Single page: the next pull must evict and write back.
        set.pull(&mut store, &mut stats, POOL, 2048, 8, true, false).unwrap();
        let mut byte = [0u8; 1];
        store.read(12, &mut byte).unwrap();
        assert_eq!(byte[0], 0xAB);
        assert_eq!(stats.page_stores, 1);
    }

    #[test]
    fn overlapping_page_is_invalidated_before_load() {
        let (mut set, mut store, mut stats) = set_and_store(2, 64);
        let idx = set.pull(&mut store, &mut stats, POOL, 100, 8, false, false).unwrap();
        write_at(&mut set, idx, 100, 0x55);

        // Window [80, 144) overlaps [100, 164): the old page must be
        // synced and dropped, not left as a stale double mapping.
        set.pull(&mut store, &mut stats, POOL, 80, 8, true, false).unwrap();
        let resident: Vec<u32> = set
            .pages
            .iter()
            .filter(|p| p.start != 0)
            .map(|p| p.start)
            .collect();
        assert_eq!(resident, vec![80]);
        let mut byte = [0u8; 1];
        store.read(100, &mut byte).unwrap();
        assert_eq!(byte[0], 0x55);
    }

    #[test]
    fn clean_page_preferred_over_dirty() {
        let (mut set, mut store, mut stats) = set_and_store(2, 64);
        let d = set.pull(&mut store, &mut stats, POOL, 8, 8, false, false).unwrap();
        let c = set.pull(&mut store, &mut stats, POOL, 1024, 8, true, false).unwrap();
        assert_ne!(d, c);

        // Both resident, one dirty one clean: the clean page loses.
        let v = set.pull(&mut store, &mut stats, POOL, 2048, 8, true, false).unwrap();
        assert_eq!(v, c);
        assert_eq!(set.pages[d].start, 8);
        assert!(set.pages[d].dirty);
    }

    #[test]
    fn dirty_page_evicted_after_max_skips() {
        let (mut set, mut store, mut stats) = set_and_store(2, 64);
        set.pull(&mut store, &mut stats, POOL, 8, 8, false, false).unwrap();

        // Keep faulting fresh addresses; the dirty page dodges eviction
        // MAX_CLEAN_SKIPS times while the clean page recycles, then
        // finally counts as clean and gets written out.
        for k in 0..6u32 {
            set.pull(&mut store, &mut stats, POOL, 1024 + k * 128, 8, true, false)
                .unwrap();
        }
        assert!(set.pages.iter().all(|p| !p.dirty));
        assert_eq!(stats.page_stores, 1);
    }

    #[test]
    fn locked_pages_are_never_victims() {
        let (mut set, mut store, mut stats) = set_and_store(2, 64);
        let a = set.pull(&mut store, &mut stats, POOL, 8, 8, true, true).unwrap();
        set.pages[a].locks = 1;
        let b = set.pull(&mut store, &mut stats, POOL, 512, 8, true, true).unwrap();
        set.pages[b].locks = 1;

        let err = set
            .pull(&mut store, &mut stats, POOL, 1024, 8, true, false)
            .unwrap_err();
        assert!(matches!(err, AllocError::NoFreePage));
    }

    #[test]
    fn sync_all_clears_dirt() {
        let (mut set, mut store, mut stats) = set_and_store(2, 64);
        let idx = set.pull(&mut store, &mut stats, POOL, 8, 8, false, false).unwrap();
        write_at(&mut set, idx, 8, 0x11);
        set.sync_all(&mut store, &mut stats).unwrap();
        assert!(set.pages.iter().all(|p| !p.dirty));
        let mut byte = [0u8; 1];
        store.read(8, &mut byte).unwrap();
        assert_eq!(byte[0], 0x11);
    }

    #[test]
    fn invalidate_all_empties_the_set() {
        let (mut set, mut store, mut stats) = set_and_store(2, 64);
        set.pull(&mut store, &mut stats, POOL, 8, 8, true, false).unwrap();
        set.invalidate_all();
        assert_eq!(set.free_pages(), 2);
    }
}
