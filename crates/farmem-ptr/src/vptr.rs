//! Typed virtual pointers.

use std::fmt;
use std::marker::PhantomData;

use farmem_core::VAddr;

use crate::Storable;

/// A typed pointer into a pool.
///
/// Carries a [`VAddr`] plus the pointee type; all actual access goes
/// through [`TypedVm`](crate::TypedVm) against the allocator that
/// issued it. Pointers are plain data: `Copy`, comparable, storable in
/// the pool themselves, and meaningless against any other pool.
pub struct VPtr<T> {
    addr: VAddr,
    _pointee: PhantomData<fn() -> T>,
}

impl<T> VPtr<T> {
    /// The null pointer.
    pub const NULL: Self = Self {
        addr: VAddr::NULL,
        _pointee: PhantomData,
    };

    /// Type an address.
    pub fn new(addr: VAddr) -> Self {
        Self {
            addr,
            _pointee: PhantomData,
        }
    }

    /// The untyped address.
    pub fn addr(self) -> VAddr {
        self.addr
    }

    /// Whether this is the null pointer.
    pub fn is_null(self) -> bool {
        self.addr.is_null()
    }
}

impl<T: Storable> VPtr<T> {
    /// Pointer `count` elements further on (or back, if negative).
    pub fn offset(self, count: i64) -> Self {
        Self::new(self.addr.offset(count * T::SIZE as i64))
    }

    /// Pointer to the `i`th element after this one.
    pub fn index(self, i: u32) -> Self {
        self.offset(i64::from(i))
    }

    /// Signed element distance from `other` to `self`. Meaningful only
    /// for pointers into the same allocation, like raw pointer
    /// subtraction.
    pub fn diff(self, other: Self) -> i64 {
        (i64::from(self.addr.raw()) - i64::from(other.addr.raw())) / T::SIZE as i64
    }
}

// Manual impls: derived ones would demand the bounds on T, which a
// pointer does not need.
impl<T> Clone for VPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for VPtr<T> {}

impl<T> PartialEq for VPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl<T> Eq for VPtr<T> {}

impl<T> PartialOrd for VPtr<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for VPtr<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.addr.cmp(&other.addr)
    }
}

impl<T> fmt::Debug for VPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VPtr<{}>({})", std::any::type_name::<T>(), self.addr)
    }
}

impl<T> Default for VPtr<T> {
    fn default() -> Self {
        Self::NULL
    }
}

/// A typed, length-carrying region of a pool.
///
/// The element count travels with the pointer, so indexed access can
/// be bounds-checked. Produced by
/// [`TypedVm::alloc_slice`](crate::TypedVm::alloc_slice).
pub struct VSlice<T> {
    ptr: VPtr<T>,
    len: u32,
}

impl<T> VSlice<T> {
    /// Build a slice view from a pointer and an element count.
    pub fn new(ptr: VPtr<T>, len: u32) -> Self {
        Self { ptr, len }
    }

    /// Pointer to the first element.
    pub fn ptr(&self) -> VPtr<T> {
        self.ptr
    }

    /// Element count.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether the slice has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T: Storable> VSlice<T> {
    /// Pointer to element `index`. Panics if `index` is out of bounds.
    pub fn element(&self, index: u32) -> VPtr<T> {
        assert!(
            index < self.len,
            "index {index} out of bounds for slice of {} elements",
            self.len
        );
        self.ptr.offset(i64::from(index))
    }

    /// Total encoded size of the slice in bytes.
    ///
    /// Returned as `u64`: a hand-built view over a large element count
    /// can describe more bytes than a pool address can reach, and the
    /// accessors reject such views instead of wrapping.
    pub fn byte_len(&self) -> u64 {
        u64::from(self.len) * T::SIZE as u64
    }
}

impl<T> Clone for VSlice<T> {
    fn clone(&self) -> Self {
        Self {
            ptr: self.ptr,
            len: self.len,
        }
    }
}

impl<T> Copy for VSlice<T> {}

impl<T> fmt::Debug for VSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VSlice<{}>({}, len {})",
            std::any::type_name::<T>(),
            self.ptr.addr(),
            self.len
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_pointer_is_null() {
        let p: VPtr<u32> = VPtr::NULL;
        assert!(p.is_null());
        assert_eq!(p, VPtr::default());
    }

    #[test]
    fn offset_scales_by_element_size() {
        let p: VPtr<u32> = VPtr::new(VAddr::from(100));
        assert_eq!(p.offset(3).addr(), VAddr::from(112));
        assert_eq!(p.offset(-2).addr(), VAddr::from(92));
        assert_eq!(p.index(3), p.offset(3));
    }

    #[test]
    fn diff_counts_elements() {
        let p: VPtr<u32> = VPtr::new(VAddr::from(100));
        let q = p.offset(5);
        assert_eq!(q.diff(p), 5);
        assert_eq!(p.diff(q), -5);
        assert!(p < q);
    }

    #[test]
    fn slice_element_addresses() {
        let s: VSlice<u16> = VSlice::new(VPtr::new(VAddr::from(64)), 4);
        assert_eq!(s.element(0).addr(), VAddr::from(64));
        assert_eq!(s.element(3).addr(), VAddr::from(70));
        assert_eq!(s.byte_len(), 8);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn slice_element_checks_bounds() {
        let s: VSlice<u16> = VSlice::new(VPtr::new(VAddr::from(64)), 4);
        let _ = s.element(4);
    }

    #[test]
    fn byte_len_does_not_wrap_for_huge_slices() {
        let s: VSlice<u64> = VSlice::new(VPtr::new(VAddr::from(8)), u32::MAX);
        assert_eq!(s.byte_len(), u64::from(u32::MAX) * 8);
    }

    #[test]
    fn pointers_are_copy_without_bounds_on_t() {
        struct NotClone;
        let p: VPtr<NotClone> = VPtr::new(VAddr::from(8));
        let q = p;
        assert_eq!(p, q);
    }
}
