use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Insert outcome counters.
///
/// Updated only on the insert path, so relaxed ordering is enough.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl Counters {
    pub(crate) const fn new() -> Self {
        Self {
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub(crate) fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    pub(crate) fn clear(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of the cache state, as returned by
/// [`BlobCache::stats`][crate::cache::BlobCache::stats].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct CacheStats {
    /// Number of issued ids.
    pub entries: usize,
    /// Number of allocated segments.
    pub segments: usize,
    /// Total slots in allocated segments.
    pub capacity: usize,
    /// Bytes owned by stored entries.
    pub bytes_used: usize,
    /// Bytes owned by segment slot arrays.
    pub segment_bytes: usize,
    /// Inserts answered by an existing entry.
    pub hits: usize,
    /// Inserts that created a new entry.
    pub misses: usize,
}

impl CacheStats {
    /// Fraction of inserts that were deduplicated.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl Display for CacheStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "entries={} segments={} capacity={} bytes_used={} segment_bytes={} hits={} misses={} hit_rate={:.1}%",
            self.entries,
            self.segments,
            self.capacity,
            self.bytes_used,
            self.segment_bytes,
            self.hits,
            self.misses,
            self.hit_rate() * 100.0
        )
    }
}
