//! Value encoding for pool storage.

use farmem_core::VAddr;

use crate::VPtr;

/// A value that can be stored in a pool.
///
/// Encoding is explicit and little-endian, never a memory dump: a pool
/// written on one machine reads back the same values on any other,
/// regardless of word size or native endianness. [`SIZE`](Self::SIZE)
/// is the exact encoded size; the slices passed to
/// [`to_bytes`](Self::to_bytes) and [`from_bytes`](Self::from_bytes)
/// are always exactly that long.
///
/// Implement it for your own types by encoding each field in order:
///
/// ```
/// use farmem_ptr::Storable;
///
/// struct Reading { when: u32, value: i16 }
///
/// impl Storable for Reading {
///     const SIZE: usize = 6;
///
///     fn to_bytes(&self, buf: &mut [u8]) {
///         buf[..4].copy_from_slice(&self.when.to_le_bytes());
///         buf[4..].copy_from_slice(&self.value.to_le_bytes());
///     }
///
///     fn from_bytes(buf: &[u8]) -> Self {
///         Reading {
///             when: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
///             value: i16::from_le_bytes([buf[4], buf[5]]),
///         }
///     }
/// }
/// ```
pub trait Storable: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Encode `self` into `buf`; `buf.len()` equals [`SIZE`](Self::SIZE).
    fn to_bytes(&self, buf: &mut [u8]);

    /// Decode a value from `buf`; `buf.len()` equals [`SIZE`](Self::SIZE).
    fn from_bytes(buf: &[u8]) -> Self;
}

macro_rules! storable_int {
    ($($t:ty),*) => {$(
        impl Storable for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn to_bytes(&self, buf: &mut [u8]) {
                buf.copy_from_slice(&self.to_le_bytes());
            }

            fn from_bytes(buf: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(buf);
                <$t>::from_le_bytes(raw)
            }
        }
    )*};
}

storable_int!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl Storable for bool {
    const SIZE: usize = 1;

    fn to_bytes(&self, buf: &mut [u8]) {
        buf[0] = u8::from(*self);
    }

    fn from_bytes(buf: &[u8]) -> Self {
        buf[0] != 0
    }
}

impl<T: Storable, const N: usize> Storable for [T; N] {
    const SIZE: usize = T::SIZE * N;

    fn to_bytes(&self, buf: &mut [u8]) {
        for (i, item) in self.iter().enumerate() {
            item.to_bytes(&mut buf[i * T::SIZE..(i + 1) * T::SIZE]);
        }
    }

    fn from_bytes(buf: &[u8]) -> Self {
        std::array::from_fn(|i| T::from_bytes(&buf[i * T::SIZE..(i + 1) * T::SIZE]))
    }
}

impl Storable for VAddr {
    const SIZE: usize = 4;

    fn to_bytes(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.raw().to_le_bytes());
    }

    fn from_bytes(buf: &[u8]) -> Self {
        VAddr::from(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
    }
}

// Pointers are themselves storable, so linked structures can live
// entirely inside the pool.
impl<T> Storable for VPtr<T> {
    const SIZE: usize = 4;

    fn to_bytes(&self, buf: &mut [u8]) {
        self.addr().to_bytes(buf);
    }

    fn from_bytes(buf: &[u8]) -> Self {
        VPtr::new(VAddr::from_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_encode_little_endian() {
        let mut buf = [0u8; 4];
        0x0102_0304u32.to_bytes(&mut buf);
        assert_eq!(buf, [4, 3, 2, 1]);
        assert_eq!(u32::from_bytes(&buf), 0x0102_0304);
    }

    #[test]
    fn signed_values_round_trip() {
        let mut buf = [0u8; 8];
        (-1234567890123i64).to_bytes(&mut buf);
        assert_eq!(i64::from_bytes(&buf), -1234567890123);
    }

    #[test]
    fn floats_round_trip() {
        let mut buf = [0u8; 8];
        std::f64::consts::PI.to_bytes(&mut buf);
        assert_eq!(f64::from_bytes(&buf), std::f64::consts::PI);
    }

    #[test]
    fn bool_is_one_byte() {
        let mut buf = [9u8; 1];
        true.to_bytes(&mut buf);
        assert_eq!(buf, [1]);
        assert!(bool::from_bytes(&buf));
        false.to_bytes(&mut buf);
        assert!(!bool::from_bytes(&buf));
    }

    #[test]
    fn arrays_encode_elementwise() {
        let arr: [u16; 3] = [1, 2, 0x0304];
        assert_eq!(<[u16; 3]>::SIZE, 6);
        let mut buf = [0u8; 6];
        arr.to_bytes(&mut buf);
        assert_eq!(buf, [1, 0, 2, 0, 4, 3]);
        assert_eq!(<[u16; 3]>::from_bytes(&buf), arr);
    }

    #[test]
    fn pointers_round_trip() {
        let p: VPtr<u64> = VPtr::new(VAddr::from(0xDEAD));
        let mut buf = [0u8; 4];
        p.to_bytes(&mut buf);
        assert_eq!(VPtr::<u64>::from_bytes(&buf), p);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn integers_round_trip(v in any::<u64>()) {
                let mut buf = [0u8; 8];
                v.to_bytes(&mut buf);
                prop_assert_eq!(u64::from_bytes(&buf), v);
            }

            #[test]
            fn signed_round_trip(v in any::<i32>()) {
                let mut buf = [0u8; 4];
                v.to_bytes(&mut buf);
                prop_assert_eq!(i32::from_bytes(&buf), v);
            }

            #[test]
            fn floats_round_trip_bit_exact(bits in any::<u64>()) {
                // Via the bit pattern so NaN payloads count too.
                let v = f64::from_bits(bits);
                let mut buf = [0u8; 8];
                v.to_bytes(&mut buf);
                prop_assert_eq!(f64::from_bytes(&buf).to_bits(), bits);
            }

            #[test]
            fn arrays_round_trip(arr in any::<[i16; 5]>()) {
                let mut buf = [0u8; 10];
                arr.to_bytes(&mut buf);
                prop_assert_eq!(<[i16; 5]>::from_bytes(&buf), arr);
            }

            #[test]
            fn pointer_encoding_is_its_address(raw in any::<u32>()) {
                let p: VPtr<u32> = VPtr::new(VAddr::from(raw));
                let mut buf = [0u8; 4];
                p.to_bytes(&mut buf);
                prop_assert_eq!(buf, raw.to_le_bytes());
                prop_assert_eq!(VPtr::<u32>::from_bytes(&buf), p);
            }
        }
    }
}
