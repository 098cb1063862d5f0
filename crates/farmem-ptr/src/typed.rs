//! Typed access to a virtual memory pool.

use smallvec::SmallVec;

use farmem_alloc::{AllocError, VirtMem};
use farmem_core::Store;

use crate::{Storable, VPtr, VSlice};

/// Encoded-value scratch buffer; spills to the heap only for values
/// larger than a cache line.
type Scratch = SmallVec<[u8; 64]>;

/// Byte span of a slice view, rejected before any buffer is sized if
/// it cannot fit in the pool. Hand-built views can claim arbitrary
/// element counts.
fn span_of<S: Store, T: Storable>(
    vm: &VirtMem<S>,
    slice: &VSlice<T>,
) -> Result<usize, AllocError> {
    let bytes = slice.byte_len();
    if bytes > u64::from(vm.pool_size()) {
        return Err(AllocError::OutOfBounds {
            addr: slice.ptr().addr(),
            len: usize::try_from(bytes).unwrap_or(usize::MAX),
            pool_size: vm.pool_size(),
        });
    }
    Ok(bytes as usize)
}

/// Typed allocation and access on top of [`VirtMem`].
///
/// Everything here is a thin layer over the byte interface: values are
/// encoded through [`Storable`] and moved with
/// [`read`](VirtMem::read)/[`write`](VirtMem::write). The pointer
/// types only make the addresses self-describing; they grant no access
/// of their own.
pub trait TypedVm {
    /// Allocate room for one `T`, uninitialized.
    ///
    /// The bytes are whatever the pool held; read them only after a
    /// [`put`](Self::put).
    fn alloc_typed<T: Storable>(&mut self) -> Result<VPtr<T>, AllocError>;

    /// Allocate room for one `T` and store `value` into it.
    fn alloc_init<T: Storable>(&mut self, value: &T) -> Result<VPtr<T>, AllocError>;

    /// Free an allocation made with [`alloc_typed`](Self::alloc_typed)
    /// or [`alloc_init`](Self::alloc_init). Freeing a null pointer is a
    /// no-op.
    fn free_typed<T>(&mut self, ptr: VPtr<T>) -> Result<(), AllocError>;

    /// Load the value `ptr` points at.
    fn get<T: Storable>(&mut self, ptr: VPtr<T>) -> Result<T, AllocError>;

    /// Store `value` where `ptr` points.
    fn put<T: Storable>(&mut self, ptr: VPtr<T>, value: &T) -> Result<(), AllocError>;

    /// Allocate an array of `len` elements, uninitialized.
    fn alloc_slice<T: Storable>(&mut self, len: u32) -> Result<VSlice<T>, AllocError>;

    /// Free an allocation made with [`alloc_slice`](Self::alloc_slice).
    fn free_slice<T>(&mut self, slice: VSlice<T>) -> Result<(), AllocError>;

    /// Load element `index`. Panics if `index` is out of bounds.
    fn get_at<T: Storable>(&mut self, slice: VSlice<T>, index: u32) -> Result<T, AllocError>;

    /// Store `value` at element `index`. Panics if `index` is out of
    /// bounds.
    fn put_at<T: Storable>(
        &mut self,
        slice: VSlice<T>,
        index: u32,
        value: &T,
    ) -> Result<(), AllocError>;

    /// Load the whole slice into a `Vec`.
    fn read_slice<T: Storable>(&mut self, slice: VSlice<T>) -> Result<Vec<T>, AllocError>;

    /// Store `values` over the whole slice. Panics if `values.len()`
    /// differs from the slice length.
    fn write_slice<T: Storable>(&mut self, slice: VSlice<T>, values: &[T])
        -> Result<(), AllocError>;
}

impl<S: Store> TypedVm for VirtMem<S> {
    fn alloc_typed<T: Storable>(&mut self) -> Result<VPtr<T>, AllocError> {
        let addr = self.alloc(T::SIZE as u32)?;
        Ok(VPtr::new(addr))
    }

    fn alloc_init<T: Storable>(&mut self, value: &T) -> Result<VPtr<T>, AllocError> {
        let ptr = self.alloc_typed()?;
        self.put(ptr, value)?;
        Ok(ptr)
    }

    fn free_typed<T>(&mut self, ptr: VPtr<T>) -> Result<(), AllocError> {
        self.free(ptr.addr())
    }

    fn get<T: Storable>(&mut self, ptr: VPtr<T>) -> Result<T, AllocError> {
        let mut buf = Scratch::from_elem(0, T::SIZE);
        self.read(ptr.addr(), &mut buf)?;
        Ok(T::from_bytes(&buf))
    }

    fn put<T: Storable>(&mut self, ptr: VPtr<T>, value: &T) -> Result<(), AllocError> {
        let mut buf = Scratch::from_elem(0, T::SIZE);
        value.to_bytes(&mut buf);
        self.write(ptr.addr(), &buf)
    }

    fn alloc_slice<T: Storable>(&mut self, len: u32) -> Result<VSlice<T>, AllocError> {
        let bytes = u64::from(len) * T::SIZE as u64;
        if bytes > u64::from(u32::MAX) {
            return Err(AllocError::OutOfMemory {
                requested: u32::MAX,
                pool_size: self.pool_size(),
            });
        }
        let addr = self.alloc(bytes as u32)?;
        Ok(VSlice::new(VPtr::new(addr), len))
    }

    fn free_slice<T>(&mut self, slice: VSlice<T>) -> Result<(), AllocError> {
        self.free(slice.ptr().addr())
    }

    fn get_at<T: Storable>(&mut self, slice: VSlice<T>, index: u32) -> Result<T, AllocError> {
        self.get(slice.element(index))
    }

    fn put_at<T: Storable>(
        &mut self,
        slice: VSlice<T>,
        index: u32,
        value: &T,
    ) -> Result<(), AllocError> {
        self.put(slice.element(index), value)
    }

    fn read_slice<T: Storable>(&mut self, slice: VSlice<T>) -> Result<Vec<T>, AllocError> {
        let mut raw = vec![0u8; span_of(self, &slice)?];
        self.read(slice.ptr().addr(), &mut raw)?;
        Ok((0..slice.len() as usize)
            .map(|i| T::from_bytes(&raw[i * T::SIZE..(i + 1) * T::SIZE]))
            .collect())
    }

    fn write_slice<T: Storable>(
        &mut self,
        slice: VSlice<T>,
        values: &[T],
    ) -> Result<(), AllocError> {
        assert!(
            values.len() == slice.len() as usize,
            "value count {} does not match slice length {}",
            values.len(),
            slice.len()
        );
        let mut raw = vec![0u8; span_of(self, &slice)?];
        for (i, value) in values.iter().enumerate() {
            value.to_bytes(&mut raw[i * T::SIZE..(i + 1) * T::SIZE]);
        }
        self.write(slice.ptr().addr(), &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmem_alloc::VmConfig;
    use farmem_core::VAddr;
    use farmem_store::MemStore;

    const POOL: u32 = 16 * 1024;

    fn vm() -> VirtMem<MemStore> {
        VirtMem::open(MemStore::new(POOL), VmConfig::tiny(POOL)).unwrap()
    }

    #[test]
    fn scalar_round_trip() {
        let mut vm = vm();
        let p = vm.alloc_init(&0xCAFE_F00Du32).unwrap();
        assert_eq!(vm.get(p).unwrap(), 0xCAFE_F00D);
        vm.put(p, &7u32).unwrap();
        assert_eq!(vm.get(p).unwrap(), 7);
        vm.free_typed(p).unwrap();
    }

    #[test]
    fn null_access_is_an_error() {
        let mut vm = vm();
        assert!(matches!(
            vm.get::<u32>(VPtr::NULL),
            Err(AllocError::NullAccess)
        ));
    }

    #[test]
    fn slice_indexed_access() {
        let mut vm = vm();
        let s = vm.alloc_slice::<u16>(100).unwrap();
        for i in 0..100u32 {
            vm.put_at(s, i, &(i as u16 * 3)).unwrap();
        }
        assert_eq!(vm.get_at(s, 99).unwrap(), 297);
        let all = vm.read_slice(s).unwrap();
        assert_eq!(all.len(), 100);
        assert!(all.iter().enumerate().all(|(i, &v)| v == i as u16 * 3));
        vm.free_slice(s).unwrap();
    }

    #[test]
    fn write_slice_stores_all_elements() {
        let mut vm = vm();
        let s = vm.alloc_slice::<i64>(32).unwrap();
        let values: Vec<i64> = (0..32).map(|i| -1000 * i).collect();
        vm.write_slice(s, &values).unwrap();
        assert_eq!(vm.read_slice(s).unwrap(), values);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn indexed_access_checks_bounds() {
        let mut vm = vm();
        let s = vm.alloc_slice::<u16>(4).unwrap();
        let _ = vm.get_at(s, 4);
    }

    #[test]
    fn oversized_slice_views_are_rejected() {
        let mut vm = vm();
        // u32::MAX u64 elements describe far more bytes than any pool
        // address can reach; the view is refused, not wrapped.
        let s: VSlice<u64> = VSlice::new(VPtr::new(VAddr::from(8)), u32::MAX);
        assert!(matches!(
            vm.read_slice(s),
            Err(AllocError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn free_leaves_the_callers_pointer_untouched() {
        let mut vm = vm();
        let p = vm.alloc_init(&5u32).unwrap();
        vm.free_typed(p).unwrap();
        // Pointers are Copy; freeing consumes one copy and the others
        // keep their address, which simply becomes reusable.
        assert!(!p.is_null());
        let q = vm.alloc_typed::<u32>().unwrap();
        assert_eq!(q, p);
    }

    #[test]
    fn arrays_store_inline() {
        let mut vm = vm();
        let p = vm.alloc_init(&[1u32, 2, 3, 4]).unwrap();
        assert_eq!(vm.get(p).unwrap(), [1u32, 2, 3, 4]);
    }
}
