/// Per-category lock array installed on share objects.
///
/// The native library calls the share locking callbacks with a resource
/// category whenever any attached handle touches that category's cached
/// state. Categories are a closed set with stable indices mirroring the
/// native library's lock-data order.
use serde::{Deserialize, Serialize};

use crate::locks::alloc::{self, allocate_locks};
use crate::locks::raw::RawBinaryLock;
use crate::observability::metrics::metrics;
use crate::types::{CoordResult, LockKind};

/// Shared-resource categories protected by a share object's lock array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareCategory {
    /// The share object's own bookkeeping
    Share,
    /// Cookie jar
    Cookie,
    /// DNS cache
    Dns,
    /// SSL session cache
    SslSession,
    /// Connection reuse pool
    Connect,
    /// Public suffix list data
    Psl,
}

impl ShareCategory {
    pub const COUNT: usize = 6;

    pub const ALL: [ShareCategory; Self::COUNT] = [
        ShareCategory::Share,
        ShareCategory::Cookie,
        ShareCategory::Dns,
        ShareCategory::SslSession,
        ShareCategory::Connect,
        ShareCategory::Psl,
    ];

    /// Stable array index for this category.
    pub fn index(self) -> usize {
        match self {
            ShareCategory::Share => 0,
            ShareCategory::Cookie => 1,
            ShareCategory::Dns => 2,
            ShareCategory::SslSession => 3,
            ShareCategory::Connect => 4,
            ShareCategory::Psl => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShareCategory::Share => "share",
            ShareCategory::Cookie => "cookie",
            ShareCategory::Dns => "dns",
            ShareCategory::SslSession => "ssl_session",
            ShareCategory::Connect => "connect",
            ShareCategory::Psl => "psl",
        }
    }
}

/// Fixed set of binary locks, one per [`ShareCategory`]. Size is fixed at
/// construction and the array is never resized.
#[derive(Debug)]
pub struct ShareLockArray {
    // Always ShareCategory::COUNT entries; built all-or-nothing.
    locks: Vec<RawBinaryLock>,
}

impl ShareLockArray {
    /// Allocate one lock per category. Either every category's lock exists
    /// or the array does not.
    pub fn new() -> CoordResult<Self> {
        Self::build_with(&mut alloc::system_factory)
    }

    pub(crate) fn build_with(
        factory: &mut dyn FnMut(usize) -> Option<RawBinaryLock>,
    ) -> CoordResult<Self> {
        let locks = allocate_locks(LockKind::Share, ShareCategory::COUNT, factory)?;
        Ok(Self { locks })
    }

    /// Block until the category's lock is free, then take it.
    /// Non-reentrant: a thread must not lock a category it already holds.
    pub fn lock(&self, category: ShareCategory) {
        let lock = &self.locks[category.index()];
        if lock.is_held() {
            metrics().share_lock_contentions.inc();
        }
        lock.lock();
        metrics().share_lock_acquisitions.inc();
    }

    /// Release the category's lock. The category must be held.
    pub fn unlock(&self, category: ShareCategory) {
        self.locks[category.index()].unlock();
    }

    /// Observation only; the answer may be stale by the time it returns.
    pub fn is_held(&self, category: ShareCategory) -> bool {
        self.locks[category.index()].is_held()
    }
}
