/// Shared type definitions and closed enums for the coordination layer
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Which fixed lock structure an allocation failure occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockKind {
    /// Per-share category lock array
    Share,
    /// Process-wide crypto lock table
    Crypto,
    /// Per-call-site crypto mutex created through the callback table
    CryptoCallSite,
}

/// Errors surfaced by the coordination layer.
///
/// Contract violations (a broken mutual-exclusion invariant, unlocking a
/// free lock, releasing a lock held by a different context) are not errors:
/// they panic, because calling code cannot meaningfully recover from them.
#[derive(Debug, Error)]
pub enum CoordError {
    /// A lock structure could not be fully allocated. Everything allocated
    /// by the failing call has already been rolled back.
    #[error("allocation of {kind:?} lock {failed_index} of {requested} failed")]
    LockAllocation {
        kind: LockKind,
        failed_index: usize,
        requested: usize,
    },

    /// A blocking operation is already running on this entity.
    #[error("a blocking operation is already in progress on this {entity}")]
    OperationInProgress { entity: &'static str },

    /// The native resource behind a handle has been closed.
    #[error("native handle is closed")]
    HandleClosed,

    /// The handle already has an owning multi handle.
    #[error("handle is already attached to a multi handle")]
    AlreadyAttached,

    /// The handle is not attached to this multi handle.
    #[error("handle is not attached to this multi handle")]
    NotAttached,

    /// The crypto lock table is already installed; reinstalling requires a
    /// full teardown first.
    #[error("crypto lock table is already installed")]
    CryptoAlreadyInstalled,
}

pub type CoordResult<T> = std::result::Result<T, CoordError>;

static NEXT_NATIVE_REF: AtomicU64 = AtomicU64::new(1);

/// Opaque reference to a resource owned by the native library (an easy,
/// multi, or share handle on the native side). Always non-null when
/// present; absence is modeled as `Option<NativeRef>` on the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeRef(NonZeroU64);

impl NativeRef {
    /// Wrap a raw native reference value. `None` for the null reference.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// A fresh process-unique reference, standing in for the value a native
    /// init call returns.
    pub fn allocate() -> Self {
        let raw = NEXT_NATIVE_REF.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    pub fn raw(self) -> u64 {
        self.0.get()
    }
}
