//! Property tests for the heap invariants.

use proptest::prelude::*;

use farmem_alloc::{VirtMem, VmConfig};
use farmem_store::MemStore;

const POOL: u32 = 32 * 1024;

fn vm() -> VirtMem<MemStore> {
    VirtMem::open(MemStore::new(POOL), VmConfig::tiny(POOL)).expect("open")
}

proptest! {
    /// Payload regions of live allocations are pairwise disjoint and
    /// inside the pool.
    #[test]
    fn allocations_are_disjoint(sizes in prop::collection::vec(1..256u32, 1..24)) {
        let mut vm = vm();
        let mut regions: Vec<(u32, u32)> = Vec::new();
        for &size in &sizes {
            let addr = vm.alloc(size)?;
            let start = addr.raw();
            prop_assert!(start >= 8);
            prop_assert!(u64::from(start) + u64::from(size) <= u64::from(POOL));
            for &(s, e) in &regions {
                prop_assert!(start + size <= s || start >= e,
                    "[{start}, {}) overlaps [{s}, {e})", start + size);
            }
            regions.push((start, start + size));
        }
    }

    /// Any byte pattern written to an allocation reads back intact,
    /// even after the cache is dropped.
    #[test]
    fn written_bytes_read_back(data in prop::collection::vec(any::<u8>(), 1..600)) {
        let mut vm = vm();
        let addr = vm.alloc(data.len() as u32)?;
        vm.write(addr, &data)?;
        let mut back = vec![0u8; data.len()];
        vm.read(addr, &mut back)?;
        prop_assert_eq!(&back, &data);

        vm.clear_cache()?;
        vm.read(addr, &mut back)?;
        prop_assert_eq!(&back, &data);
    }

    /// Freeing some allocations never disturbs the survivors.
    #[test]
    fn free_does_not_disturb_survivors(
        sizes in prop::collection::vec(1..200u32, 2..16),
        free_mask in prop::collection::vec(any::<bool>(), 16),
    ) {
        let mut vm = vm();
        let mut live = Vec::new();
        for (i, &size) in sizes.iter().enumerate() {
            let addr = vm.alloc(size)?;
            let fill = (i as u8).wrapping_mul(37).wrapping_add(1);
            vm.fill(addr, size, fill)?;
            live.push((addr, size, fill));
        }
        let mut survivors = Vec::new();
        for (i, entry) in live.into_iter().enumerate() {
            if free_mask[i % free_mask.len()] {
                vm.free(entry.0)?;
            } else {
                survivors.push(entry);
            }
        }
        for &(addr, size, fill) in &survivors {
            let mut buf = vec![0u8; size as usize];
            vm.read(addr, &mut buf)?;
            prop_assert!(buf.iter().all(|&b| b == fill),
                "block at {addr} corrupted after frees");
        }
    }

    /// The heap recycles: alloc/free cycles at one size always succeed
    /// and the freed space is fully reusable.
    #[test]
    fn alloc_free_cycles_do_not_leak(size in 1..2048u32, cycles in 1..40usize) {
        let mut vm = vm();
        let first = vm.alloc(size)?;
        vm.free(first)?;
        for _ in 0..cycles {
            let addr = vm.alloc(size)?;
            prop_assert_eq!(addr, first);
            vm.free(addr)?;
        }
        prop_assert_eq!(vm.stats().mem_used, 0);
    }
}
