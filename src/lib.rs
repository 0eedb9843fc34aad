//! # unwind-cache: deduplicated unwind descriptors with signal-safe lookup
//!
//! **`unwind-cache`** stores opaque binary blobs (typically stack-unwind descriptors emitted
//! by a code generator), deduplicates them by content, and hands back a small dense integer id
//! for each distinct blob. The id can later be exchanged for the original bytes through a read
//! path that is safe to run from a signal handler.
//!
//! ## Key Features
//!
//! - **Content addressing**: byte-equal blobs always get the same [`BlobId`][crate::id::BlobId].
//!   A cheap 16-bit [fingerprint][crate::fingerprint] filters candidates before the exact comparison.
//! - **Dense ids**: the `n`-th distinct blob gets id `n`, so ids fit in compact `u32` fields.
//! - **Stable storage**: blobs live in geometrically growing [segments][crate::segment] that are
//!   never moved or freed until an explicit reset, so growth never invalidates a lookup.
//! - **Signal-safe lookup**: no allocation, no lock, no blocking call. Just arithmetic and atomic loads.
//! - **Explicit state**: a [`BlobCache`][crate::cache::BlobCache] is a plain value, `const`-constructible
//!   for use in a `static`.
//!
//! ## Basic Usage
//!
//! ```rust
//! use unwind_cache::cache::BlobCache;
//!
//! let mut cache = BlobCache::new();
//!
//! // 1. Insert some descriptors
//! let a = cache.insert(&[0x41]);
//! let b = cache.insert(&[0x42]);
//! assert_eq!(a.raw(), 0);
//! assert_eq!(b.raw(), 1);
//!
//! // 2. Same content, same id
//! assert_eq!(cache.insert(&[0x41]), a);
//!
//! // 3. Get the bytes back (this part is signal-safe)
//! assert_eq!(cache.lookup(b), Some(&[0x42][..]));
//!
//! // 4. Start over
//! cache.reset();
//! assert_eq!(cache.insert(&[0x42]).raw(), 0);
//! ```
//!
//! ## Core Components
//!
//! - **[`cache`]**: The [`BlobCache`][crate::cache::BlobCache] engine: insert, lookup and reset.
//! - **[`layout`]**: Segment geometry and the id → (segment, offset) mapping.
//! - **[`segment`]**: Fixed-capacity struct-of-arrays storage blocks.
//! - **[`fingerprint`]**: The 16-bit pre-filter hash.

pub mod cache;
pub mod fingerprint;
pub mod id;
pub mod layout;
pub mod segment;
pub mod stats;
