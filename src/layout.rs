//! Geometry of the segment sequence.
//!
//! Storage is an ordered list of segments whose capacities double:
//!
//! ```text
//! segment   capacity     first id (base)
//! -------   ----------   ---------------
//!    0      1024         0
//!    1      2048         1024
//!    2      4096         3072
//!    k      1024 * 2^k   1024 * (2^k - 1)
//! ```
//!
//! A global id is mapped back to its segment by inverting the cumulative sum:
//!
//! ```text
//! k      = floor(log2((id >> 10) + 1))
//! offset = id - 1024 * (2^k - 1)
//! ```
//!
//! Everything here is pure arithmetic, so it is usable from the lookup path.

/// Log2 of the capacity of the very first segment.
pub const SEGMENT0_BITS: u32 = 10;

/// Capacity of the very first segment.
pub const SEGMENT0_CAPACITY: usize = 1 << SEGMENT0_BITS;

/// Number of segments needed to cover the whole `u32` id space.
///
/// The first 22 segments hold `2^32 - 1024` slots, the 23rd covers the rest.
pub const MAX_SEGMENTS: usize = (u32::BITS - SEGMENT0_BITS + 1) as usize;

/// Capacity of segment `k`, or `None` if it does not fit in `usize`.
#[inline]
pub const fn segment_capacity(k: usize) -> Option<usize> {
    if k >= MAX_SEGMENTS {
        return None;
    }
    1usize.checked_shl(k as u32 + SEGMENT0_BITS)
}

/// Global id of the first slot of segment `k`.
///
/// # Panics
///
/// Panics if `k >= MAX_SEGMENTS`.
#[inline]
pub const fn segment_base(k: usize) -> u64 {
    assert!(k < MAX_SEGMENTS, "Segment index out of range");
    base_of(k)
}

/// `segment_base` without the range check; `k` must be below `MAX_SEGMENTS`.
#[inline]
const fn base_of(k: usize) -> u64 {
    ((1u64 << k) - 1) << SEGMENT0_BITS
}

/// Segment index and in-segment offset of the global id `id`.
#[inline]
pub const fn locate(id: u32) -> (usize, usize) {
    let k = ((id >> SEGMENT0_BITS) + 1).ilog2() as usize;
    // `(id >> 10) + 1 <= 2^22`, so `k < MAX_SEGMENTS` always holds here.
    let offset = id as u64 - base_of(k);
    (k, offset as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(SEGMENT0_CAPACITY, 1024);
        assert_eq!(MAX_SEGMENTS, 23);
    }

    #[test]
    fn test_segment_capacity() {
        assert_eq!(segment_capacity(0), Some(1024));
        assert_eq!(segment_capacity(1), Some(2048));
        assert_eq!(segment_capacity(5), Some(32768));
        assert_eq!(segment_capacity(MAX_SEGMENTS), None);
    }

    #[test]
    fn test_segment_base() {
        assert_eq!(segment_base(0), 0);
        assert_eq!(segment_base(1), 1024);
        assert_eq!(segment_base(2), 3072);
        assert_eq!(segment_base(3), 7168);
        assert_eq!(segment_base(MAX_SEGMENTS - 1), (1u64 << 32) - 1024);
    }

    #[test]
    #[should_panic(expected = "Segment index out of range")]
    fn test_segment_base_out_of_range() {
        segment_base(MAX_SEGMENTS);
    }

    #[test]
    #[should_panic(expected = "Segment index out of range")]
    fn test_segment_base_far_out_of_range() {
        segment_base(64);
    }

    #[test]
    fn test_locate_boundaries() {
        assert_eq!(locate(0), (0, 0));
        assert_eq!(locate(1), (0, 1));
        assert_eq!(locate(1023), (0, 1023));
        assert_eq!(locate(1024), (1, 0));
        assert_eq!(locate(3071), (1, 2047));
        assert_eq!(locate(3072), (2, 0));
        assert_eq!(locate(7167), (2, 4095));
        assert_eq!(locate(7168), (3, 0));
    }

    #[test]
    fn test_locate_top_of_id_space() {
        assert_eq!(locate(u32::MAX - 1), (MAX_SEGMENTS - 1, 1022));
        assert_eq!(locate(u32::MAX), (MAX_SEGMENTS - 1, 1023));
    }

    #[test]
    fn test_locate_is_inverse_of_base() {
        for k in 0..12 {
            let base = segment_base(k) as u32;
            let cap = segment_capacity(k).unwrap() as u32;
            assert_eq!(locate(base), (k, 0));
            assert_eq!(locate(base + cap - 1), (k, cap as usize - 1));
        }
    }
}
