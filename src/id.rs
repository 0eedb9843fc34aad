use std::fmt::{Display, Formatter};

/// Identifier of a blob stored in a [`BlobCache`][crate::cache::BlobCache].
///
/// Ids are dense: the `n`-th distinct blob inserted since the last reset gets
/// id `n`. The raw `u32` is meant to be stored in compact metadata records and
/// turned back into a `BlobId` with [`BlobId::from_raw`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlobId(u32);

impl BlobId {
    /// Upper bound (exclusive) on the number of ids a cache can issue.
    pub const MAX_COUNT: u32 = u32::MAX;

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Return the internal representation of the id.
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<BlobId> for u32 {
    fn from(id: BlobId) -> Self {
        id.raw()
    }
}

impl Display for BlobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
