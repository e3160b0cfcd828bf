/// Share objects: cached-resource containers attached to multiple handles.
///
/// A share object owns the full per-category lock array and exposes the
/// locking callback pair the binding registers with the native library.
/// The callbacks run on whatever native thread touches the shared cache;
/// they never involve the execution lock, only the category mutexes.
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, trace};

use crate::locks::share_array::{ShareCategory, ShareLockArray};
use crate::observability::events::{self, CoordEventKind};
use crate::types::{CoordResult, NativeRef};

/// Access mode the native library reports when taking a share lock. A
/// single mutex per category serves both modes, so the mode is recorded for
/// diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareAccess {
    Shared,
    Exclusive,
}

#[derive(Debug)]
pub struct ShareHandle {
    native: Mutex<Option<NativeRef>>,
    locks: ShareLockArray,
}

impl ShareHandle {
    /// Create a share object together with its full lock array. Partial
    /// lock allocation is rolled back and reported; the share object does
    /// not exist without every category's lock.
    pub fn new() -> CoordResult<Arc<Self>> {
        let locks = ShareLockArray::new()?;
        let native = NativeRef::allocate();
        events::emit(
            CoordEventKind::ShareConstructed,
            format!("native {:#x}", native.raw()),
        );
        debug!("share object created (native {:#x})", native.raw());
        Ok(Arc::new(Self {
            native: Mutex::new(Some(native)),
            locks,
        }))
    }

    /// Locking callback registered with the native library. Blocks until
    /// the category's lock is taken.
    pub fn lock_hook(&self, category: ShareCategory, access: ShareAccess) {
        trace!("share lock {} ({:?})", category.as_str(), access);
        self.locks.lock(category);
    }

    /// Unlocking callback registered with the native library. The category
    /// must be held.
    pub fn unlock_hook(&self, category: ShareCategory) {
        trace!("share unlock {}", category.as_str());
        self.locks.unlock(category);
    }

    pub fn lock_array(&self) -> &ShareLockArray {
        &self.locks
    }

    pub fn native_ref(&self) -> Option<NativeRef> {
        *self.native.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
