//! Deduplicating blob cache with a signal-safe read path.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ BlobCache                                                        │
//! │   segments[0]  ──► Segment (1024 slots)   sealed                 │
//! │   segments[1]  ──► Segment (2048 slots)   sealed                 │
//! │   segments[2]  ──► Segment (4096 slots)   tail (partially used)  │
//! │   segments[3]  ──► null                                          │
//! │   ...                                                            │
//! │   count: 3500      (ids 0..3500 are issued)                      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A segment is *sealed* once the next one is published: it is full and is
//! never written again. Inserts scan sealed segments without the lock, then
//! take the lock to scan the tail and append.
//!
//! # Publication
//!
//! The insert path writes, in order: the new segment pointer (if growing),
//! the slot's fingerprint, the slot's entry pointer, and finally the count.
//! Every pointer and the count are stored with release ordering and loaded
//! with acquire ordering, so whoever sees an id also sees its bytes.
//!
//! # Signal safety
//!
//! [`BlobCache::lookup`] and [`BlobCache::lookup_unchecked`] only do
//! arithmetic and atomic loads: no allocation, no lock, no logging. They may
//! be called from a signal handler that interrupted an insert, including one
//! holding the insertion lock.

use std::fmt::Debug;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicUsize, Ordering};

use log::{debug, trace};
use parking_lot::Mutex;

use crate::fingerprint::fingerprint;
use crate::id::BlobId;
use crate::layout::{locate, segment_capacity, MAX_SEGMENTS};
use crate::segment::{Entry, Segment};
use crate::stats::{CacheStats, Counters};

pub struct BlobCache {
    /// Published segments, in order. The slot after the last published one is
    /// always null; the extra trailing slot guarantees this even when full.
    segments: [AtomicPtr<Segment>; MAX_SEGMENTS + 1],
    /// Number of issued ids.
    count: AtomicU32,
    bytes_used: AtomicUsize,
    segment_bytes: AtomicUsize,
    counters: Counters,
    /// Serializes the tail scan and the append.
    lock: Mutex<()>,
}

impl BlobCache {
    /// Create a new empty cache. No memory is allocated until the first insert.
    ///
    /// This is a `const fn`, so a cache can live in a `static` and be reached
    /// from a signal handler.
    pub const fn new() -> Self {
        Self {
            segments: [const { AtomicPtr::new(ptr::null_mut()) }; MAX_SEGMENTS + 1],
            count: AtomicU32::new(0),
            bytes_used: AtomicUsize::new(0),
            segment_bytes: AtomicUsize::new(0),
            counters: Counters::new(),
            lock: parking_lot::const_mutex(()),
        }
    }
}

impl Default for BlobCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for BlobCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("segments", &self.segment_count())
            .field("bytes_used", &self.bytes_used())
            .finish()
    }
}

impl BlobCache {
    fn segment(&self, k: usize) -> Option<&Segment> {
        let ptr = self.segments[k].load(Ordering::Acquire);
        // SAFETY: published segments are only freed by reset, which requires
        // that no reference into the cache is alive.
        unsafe { ptr.as_ref() }
    }

    fn is_published(&self, k: usize) -> bool {
        !self.segments[k].load(Ordering::Acquire).is_null()
    }

    fn hit(&self, index: usize) -> BlobId {
        self.counters.record_hit();
        let id = BlobId::from_raw(index as u32);
        trace!("insert: hit {}", id);
        id
    }

    /// Allocate and publish segment `k`.
    ///
    /// Must be called with the insertion lock held.
    fn grow(&self, k: usize) -> &Segment {
        let capacity = match segment_capacity(k) {
            Some(capacity) => capacity,
            None => panic!("Segment limit exhausted: segment {} is out of range", k),
        };

        let segment = Box::new(Segment::new(capacity));
        self.segment_bytes.fetch_add(segment.storage_bytes(), Ordering::Relaxed);

        let ptr = Box::into_raw(segment);
        self.segments[k].store(ptr, Ordering::Release);
        debug!("grow: segment {} with {} slots", k, capacity);

        // SAFETY: just published, freed only by reset.
        unsafe { &*ptr }
    }

    /// Insert a blob and return its id.
    ///
    /// If a byte-equal blob is already stored, its id is returned and nothing
    /// is copied. Otherwise `data` is copied into the cache and gets the next
    /// id.
    ///
    /// The cost is linear in the number of stored blobs (fingerprint-filtered).
    ///
    /// Not signal-safe: may allocate and may block on the insertion lock.
    ///
    /// # Panics
    ///
    /// Panics if `u32::MAX` distinct blobs are already stored, or if the
    /// segment sequence is exhausted.
    ///
    /// # Examples
    ///
    /// ```
    /// use unwind_cache::cache::BlobCache;
    ///
    /// let cache = BlobCache::new();
    /// let a = cache.insert(&[0x41]);
    /// let b = cache.insert(&[0x42]);
    /// assert_eq!(a.raw(), 0);
    /// assert_eq!(b.raw(), 1);
    /// assert_eq!(cache.insert(&[0x41]), a);
    /// ```
    pub fn insert(&self, data: &[u8]) -> BlobId {
        let hash = fingerprint(data);

        let mut k = 0;
        let mut base = 0;

        // Sealed segments are immutable, scan them without the lock.
        while self.is_published(k + 1) {
            let Some(segment) = self.segment(k) else {
                break;
            };
            if let Some(offset) = segment.find(hash, data, segment.capacity()) {
                return self.hit(base + offset);
            }
            base += segment.capacity();
            k += 1;
        }

        let _guard = self.lock.lock();
        let count = self.count.load(Ordering::Relaxed) as usize;

        // More segments may have been published since the lock-free scan.
        let mut tail = None;
        while k < MAX_SEGMENTS {
            let Some(segment) = self.segment(k) else {
                break;
            };
            let filled = (count - base).min(segment.capacity());
            if let Some(offset) = segment.find(hash, data, filled) {
                return self.hit(base + offset);
            }
            if filled < segment.capacity() {
                tail = Some((segment, filled));
                break;
            }
            base += segment.capacity();
            k += 1;
        }

        if count >= BlobId::MAX_COUNT as usize {
            panic!("Blob id space exhausted: {} blobs are stored", count);
        }

        let (segment, offset) = match tail {
            Some(tail) => tail,
            None => (self.grow(k), 0),
        };
        debug_assert_eq!(base + offset, count);

        let entry = Box::new(Entry::new(data));
        let footprint = entry.footprint();
        segment.publish(offset, hash, entry);
        self.bytes_used.fetch_add(footprint, Ordering::Relaxed);

        // Publish the id only after the slot is fully written.
        self.count.store(count as u32 + 1, Ordering::Release);
        self.counters.record_miss();

        let id = BlobId::from_raw(count as u32);
        trace!("insert: new {} ({} bytes, fingerprint {:#06x})", id, data.len(), hash);
        id
    }

    /// Get the bytes of the blob with the given id.
    ///
    /// Returns `None` if `id` has not been issued (yet). Signal-safe: one
    /// extra atomic load compared to [`lookup_unchecked`][Self::lookup_unchecked].
    ///
    /// # Examples
    ///
    /// ```
    /// use unwind_cache::cache::BlobCache;
    /// use unwind_cache::id::BlobId;
    ///
    /// let cache = BlobCache::new();
    /// let id = cache.insert(b"unwind ops");
    /// assert_eq!(cache.lookup(id), Some(&b"unwind ops"[..]));
    /// assert_eq!(cache.lookup(BlobId::from_raw(1)), None);
    /// ```
    #[inline]
    pub fn lookup(&self, id: BlobId) -> Option<&[u8]> {
        if id.raw() >= self.count.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: ids below the published count were issued by `insert`.
        Some(unsafe { self.lookup_unchecked(id) })
    }

    /// Get the bytes of the blob with the given id, without validating it.
    ///
    /// Signal-safe: only arithmetic and two atomic loads.
    ///
    /// # Safety
    ///
    /// `id` must have been returned by [`insert`][Self::insert] on this cache,
    /// with no reset in between.
    #[inline]
    pub unsafe fn lookup_unchecked(&self, id: BlobId) -> &[u8] {
        let (k, offset) = locate(id.raw());
        let ptr = unsafe { self.segments.get_unchecked(k) }.load(Ordering::Acquire);
        let segment = unsafe { &*ptr };
        unsafe { segment.entry_unchecked(offset) }.data()
    }

    /// Free every blob and segment, and return to the empty state.
    ///
    /// Ids restart at 0 afterwards.
    pub fn reset(&mut self) {
        // SAFETY: `&mut self` rules out concurrent inserts, lookups and
        // outstanding slices.
        unsafe { self.reset_unchecked() }
    }

    /// Same as [`reset`][Self::reset], for caches shared through a `static`.
    ///
    /// # Safety
    ///
    /// No insert or lookup may run concurrently (including from a signal
    /// handler), and no slice previously returned by a lookup may be used
    /// afterwards.
    pub unsafe fn reset_unchecked(&self) {
        let count = self.count.swap(0, Ordering::AcqRel);

        let mut released = 0;
        for slot in &self.segments {
            let ptr = slot.swap(ptr::null_mut(), Ordering::AcqRel);
            if ptr.is_null() {
                break;
            }
            // SAFETY: published by `grow` via `Box::into_raw`, unpublished above.
            drop(unsafe { Box::from_raw(ptr) });
            released += 1;
        }

        self.bytes_used.store(0, Ordering::Relaxed);
        self.segment_bytes.store(0, Ordering::Relaxed);
        self.counters.clear();

        if released > 0 {
            debug!("reset: released {} blobs in {} segments", count, released);
        }
    }
}

impl Drop for BlobCache {
    fn drop(&mut self) {
        self.reset();
    }
}

impl BlobCache {
    /// Get the number of issued ids.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the number of allocated segments.
    pub fn segment_count(&self) -> usize {
        (0..MAX_SEGMENTS).take_while(|&k| self.is_published(k)).count()
    }

    /// Get the total number of slots in allocated segments.
    pub fn capacity(&self) -> usize {
        (0..MAX_SEGMENTS)
            .map_while(|k| self.segment(k))
            .map(Segment::capacity)
            .sum()
    }

    /// Cumulative bytes owned by stored entries.
    pub fn bytes_used(&self) -> usize {
        self.bytes_used.load(Ordering::Relaxed)
    }

    /// Bytes owned by the slot arrays of allocated segments.
    pub fn segment_bytes(&self) -> usize {
        self.segment_bytes.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            segments: self.segment_count(),
            capacity: self.capacity(),
            bytes_used: self.bytes_used(),
            segment_bytes: self.segment_bytes(),
            hits: self.counters.hits(),
            misses: self.counters.misses(),
        }
    }

    /// Iterate over all issued ids and their bytes, in id order.
    ///
    /// Blobs inserted while iterating are not visited.
    pub fn iter(&self) -> impl Iterator<Item = (BlobId, &[u8])> + '_ {
        let count = self.count.load(Ordering::Acquire);
        (0..count).map(move |raw| {
            let id = BlobId::from_raw(raw);
            // SAFETY: `raw` is below a count loaded with acquire ordering.
            (id, unsafe { self.lookup_unchecked(id) })
        })
    }
}
