//! Fixed-capacity storage segment.
//!
//! A segment is a struct-of-arrays: all fingerprints first, then all entry
//! references, both of the same capacity.
//!
//! ```text
//! fingerprints: [f0 f1 f2 ... f(n-1)]      u16 each, scanned linearly
//! entries:      [e0 e1 e2 ... e(n-1)]      pointer to an owned Entry
//! ```
//!
//! Keeping the fingerprints contiguous makes the dedup scan touch a tight
//! region of memory, and only follow an entry reference on a fingerprint hit.
//!
//! A segment never grows, shrinks or moves. Slots are written once; a slot
//! whose entry reference is still null is simply not published yet.

use std::mem::size_of;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU16, Ordering};

/// The cache's own copy of a blob.
#[derive(Debug)]
pub struct Entry {
    data: Box<[u8]>,
}

impl Entry {
    /// Copy `data` into a new entry.
    pub fn new(data: &[u8]) -> Self {
        Self { data: data.into() }
    }

    /// Get the stored bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the number of stored bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes owned by this entry, header included.
    pub fn footprint(&self) -> usize {
        size_of::<Self>() + self.data.len()
    }
}

pub struct Segment {
    fingerprints: Box<[AtomicU16]>,
    entries: Box<[AtomicPtr<Entry>]>,
}

impl Segment {
    /// Create a new empty segment with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            fingerprints: (0..capacity).map(|_| AtomicU16::new(0)).collect(),
            entries: (0..capacity).map(|_| AtomicPtr::new(ptr::null_mut())).collect(),
        }
    }

    /// Get the number of slots.
    pub fn capacity(&self) -> usize {
        self.fingerprints.len()
    }

    /// Number of bytes owned by the two slot arrays.
    pub fn storage_bytes(&self) -> usize {
        self.capacity() * (size_of::<AtomicU16>() + size_of::<AtomicPtr<Entry>>())
    }

    /// Find an entry byte-equal to `data` among the first `filled` slots.
    ///
    /// Returns the in-segment offset of the match.
    pub fn find(&self, fingerprint: u16, data: &[u8], filled: usize) -> Option<usize> {
        let filled = filled.min(self.capacity());
        for (offset, fp) in self.fingerprints[..filled].iter().enumerate() {
            if fp.load(Ordering::Relaxed) != fingerprint {
                continue;
            }
            if let Some(entry) = self.entry(offset) {
                if entry.data() == data {
                    return Some(offset);
                }
            }
        }
        None
    }

    /// Get the entry at `offset`, if that slot is published.
    pub fn entry(&self, offset: usize) -> Option<&Entry> {
        let ptr = self.entries.get(offset)?.load(Ordering::Acquire);
        // SAFETY: non-null pointers come from `Box::into_raw` in `publish` and
        // stay valid until the segment is dropped.
        unsafe { ptr.as_ref() }
    }

    /// Get the entry at `offset` without any checks.
    ///
    /// # Safety
    ///
    /// `offset` must be below the capacity, and the slot must be published.
    #[inline]
    pub unsafe fn entry_unchecked(&self, offset: usize) -> &Entry {
        let ptr = unsafe { self.entries.get_unchecked(offset) }.load(Ordering::Acquire);
        unsafe { &*ptr }
    }

    /// Write the slot at `offset`.
    ///
    /// The fingerprint goes first; the entry reference is stored with release
    /// ordering, so a reader that sees it also sees the entry's bytes.
    ///
    /// Each slot must be published at most once.
    pub(crate) fn publish(&self, offset: usize, fingerprint: u16, entry: Box<Entry>) {
        debug_assert!(
            self.entries[offset].load(Ordering::Relaxed).is_null(),
            "Slot {} is already published",
            offset
        );
        self.fingerprints[offset].store(fingerprint, Ordering::Relaxed);
        self.entries[offset].store(Box::into_raw(entry), Ordering::Release);
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        for slot in self.entries.iter_mut() {
            let ptr = std::mem::replace(slot.get_mut(), ptr::null_mut());
            if !ptr.is_null() {
                // SAFETY: the pointer came from `Box::into_raw` and is dropped once.
                drop(unsafe { Box::from_raw(ptr) });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;

    fn publish(segment: &Segment, offset: usize, data: &[u8]) {
        segment.publish(offset, fingerprint(data), Box::new(Entry::new(data)));
    }

    #[test]
    fn test_entry() {
        let entry = Entry::new(b"abc");
        assert_eq!(entry.data(), b"abc");
        assert_eq!(entry.len(), 3);
        assert!(!entry.is_empty());
        assert_eq!(entry.footprint(), size_of::<Entry>() + 3);
        assert!(Entry::new(&[]).is_empty());
    }

    #[test]
    fn test_new_segment_is_empty() {
        let segment = Segment::new(16);
        assert_eq!(segment.capacity(), 16);
        assert_eq!(segment.storage_bytes(), 16 * (2 + size_of::<usize>()));
        assert!(segment.entry(0).is_none());
        assert!(segment.entry(16).is_none());
        assert_eq!(segment.find(0, &[], 16), None);
    }

    #[test]
    fn test_publish_and_find() {
        let segment = Segment::new(4);
        publish(&segment, 0, b"foo");
        publish(&segment, 1, b"bar");

        assert_eq!(segment.find(fingerprint(b"foo"), b"foo", 2), Some(0));
        assert_eq!(segment.find(fingerprint(b"bar"), b"bar", 2), Some(1));
        assert_eq!(segment.find(fingerprint(b"baz"), b"baz", 2), None);
        assert_eq!(segment.entry(1).map(Entry::data), Some(&b"bar"[..]));
        assert_eq!(unsafe { segment.entry_unchecked(0) }.data(), b"foo");
    }

    #[test]
    fn test_find_respects_filled() {
        let segment = Segment::new(4);
        publish(&segment, 0, b"foo");
        publish(&segment, 1, b"bar");

        assert_eq!(segment.find(fingerprint(b"bar"), b"bar", 1), None);
        assert_eq!(segment.find(fingerprint(b"bar"), b"bar", 100), Some(1));
    }

    #[test]
    fn test_find_resolves_fingerprint_collision() {
        let a = [0x01, 0x00, 0x00];
        let mut b = [0u8; 17];
        b[16] = 0x01;
        assert_eq!(fingerprint(&a), fingerprint(&b));

        let segment = Segment::new(4);
        publish(&segment, 0, &a);
        assert_eq!(segment.find(fingerprint(&b), &b, 1), None);
        publish(&segment, 1, &b);
        assert_eq!(segment.find(fingerprint(&b), &b, 2), Some(1));
        assert_eq!(segment.find(fingerprint(&a), &a, 2), Some(0));
    }

    #[test]
    #[should_panic]
    fn test_publish_out_of_range() {
        let segment = Segment::new(2);
        publish(&segment, 2, b"x");
    }
}
