//! On-pool block headers for the free-list heap.
//!
//! Every heap block starts with an 8-byte header: the pool address of
//! the next free block and the block size counted in 8-byte units.
//! Headers are stored little-endian so a pool written through one
//! backend reads back identically through another host.

/// Size of a block header in bytes. Also the heap granule: block sizes
/// are counted in units of this.
pub(crate) const HEADER_BYTES: u32 = 8;

/// First usable pool offset. Keeping the heap off offset zero reserves
/// address 0 for null pointers.
pub(crate) const START_OFFSET: u32 = 8;

/// Pseudo-address of the in-RAM free list head. It is never stored to
/// the pool (real block addresses are multiples of 8, so 1 cannot
/// collide) and never coalesces with real blocks.
pub(crate) const BASE: u32 = 1;

/// Minimum number of blocks the heap watermark grows by at a time.
pub(crate) const MIN_GROW_BLOCKS: u32 = 16;

/// A heap block header.
///
/// For a block on the free list, `next` links the circular
/// address-sorted list. For an allocated block only `size` is
/// meaningful; it is read back at free time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Header {
    /// Pool address of the next free block (or [`BASE`]).
    pub next: u32,
    /// Block size in units of [`HEADER_BYTES`], header included.
    pub size: u32,
}

impl Header {
    pub(crate) fn encode(self) -> [u8; HEADER_BYTES as usize] {
        let mut out = [0u8; HEADER_BYTES as usize];
        out[..4].copy_from_slice(&self.next.to_le_bytes());
        out[4..].copy_from_slice(&self.size.to_le_bytes());
        out
    }

    pub(crate) fn decode(buf: &[u8]) -> Self {
        Self {
            next: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            size: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let h = Header {
            next: 0x0102_0304,
            size: 42,
        };
        assert_eq!(Header::decode(&h.encode()), h);
    }

    #[test]
    fn encoding_is_little_endian() {
        let h = Header { next: 1, size: 2 };
        assert_eq!(h.encode(), [1, 0, 0, 0, 2, 0, 0, 0]);
    }
}
