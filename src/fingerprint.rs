//! Cheap 16-bit fingerprint of a blob.
//!
//! The fingerprint is a pre-filter for the dedup scan: two blobs with
//! different fingerprints are never equal, two blobs with equal fingerprints
//! still have to be compared byte by byte.
//!
//! ```text
//! a = XOR over i of (data[i] << (i mod 16))
//! fingerprint = (a & 0xFFFF) ^ (a >> 16)
//! ```

/// Fingerprint of `data`.
///
/// Each byte is shifted left by its position modulo 16 and XOR-ed into a
/// 32-bit accumulator, whose halves are then folded together.
///
/// # Examples
///
/// ```
/// use unwind_cache::fingerprint::fingerprint;
///
/// assert_eq!(fingerprint(&[]), 0);
/// assert_eq!(fingerprint(&[0x41]), 0x41);
/// assert_eq!(fingerprint(&[0x41, 0x41]), 0x41 ^ 0x82);
/// ```
#[inline]
pub fn fingerprint(data: &[u8]) -> u16 {
    let mut a: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        a ^= (byte as u32) << (i & 0xF);
    }
    ((a & 0xFFFF) ^ (a >> 16)) as u16
}
