/// Structured callback table for the gcrypt-style backend.
///
/// Instead of sizing a lock table up front, this backend registers a fixed
/// table of four mutex operations and drives every internal lock through
/// them, one opaque slot per call site. The operations speak the backend's
/// C-shaped protocol: zero for success, negative for failure.
use std::sync::{Arc, Mutex, PoisonError};

use log::info;

use crate::locks::raw::RawBinaryLock;
use crate::observability::events::{self, CoordEventKind};
use crate::observability::metrics::metrics;

pub const CB_SUCCESS: i32 = 0;
pub const CB_FAILURE: i32 = -1;

// Mutex construction cannot fail here, unlike the allocator the original
// protocol was written against; tests force the failure path through this
// flag to exercise the negative-result contract. Thread-local so parallel
// tests cannot see each other's forced failures.
#[cfg(test)]
thread_local! {
    static FORCE_CREATE_FAILURE: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// One call site's mutex slot. The library owns one per internal lock and
/// passes it to every table operation.
#[derive(Debug, Default)]
pub struct MutexSlot {
    lock: Mutex<Option<Arc<RawBinaryLock>>>,
}

impl MutexSlot {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(None),
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn install(&self, lock: Arc<RawBinaryLock>) {
        let mut slot = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        debug_assert!(slot.is_none(), "call-site mutex created twice");
        *slot = Some(lock);
    }

    fn take(&self) -> Option<Arc<RawBinaryLock>> {
        self.lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn get(&self) -> Option<Arc<RawBinaryLock>> {
        self.lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Four-operation table registered with the backend's thread-callback
/// entry point.
#[derive(Debug, Clone, Copy)]
pub struct ThreadCallbackTable {
    pub create: fn(&MutexSlot) -> i32,
    pub destroy: fn(&MutexSlot) -> i32,
    pub lock: fn(&MutexSlot) -> i32,
    pub unlock: fn(&MutexSlot) -> i32,
}

static CALLBACK_TABLE: ThreadCallbackTable = ThreadCallbackTable {
    create: mutex_create,
    destroy: mutex_destroy,
    lock: mutex_lock,
    unlock: mutex_unlock,
};

fn mutex_create(slot: &MutexSlot) -> i32 {
    #[cfg(test)]
    if FORCE_CREATE_FAILURE.with(|flag| flag.get()) {
        return CB_FAILURE;
    }

    slot.install(Arc::new(RawBinaryLock::new()));
    metrics().active_call_site_locks.inc();
    CB_SUCCESS
}

fn mutex_destroy(slot: &MutexSlot) -> i32 {
    if slot.take().is_some() {
        metrics().active_call_site_locks.dec();
    }
    CB_SUCCESS
}

fn mutex_lock(slot: &MutexSlot) -> i32 {
    match slot.get() {
        Some(lock) => {
            lock.lock();
            metrics().crypto_lock_acquisitions.inc();
            CB_SUCCESS
        }
        None => panic!("lock on a call-site mutex that was never created"),
    }
}

fn mutex_unlock(slot: &MutexSlot) -> i32 {
    match slot.get() {
        Some(lock) => {
            lock.unlock();
            CB_SUCCESS
        }
        None => panic!("unlock on a call-site mutex that was never created"),
    }
}

/// Publish the table for the binding to register with the backend's
/// thread-callback entry point. Nothing is sized up front; the library
/// creates call-site mutexes through `create` as it needs them.
pub fn init() -> &'static ThreadCallbackTable {
    events::emit(CoordEventKind::CryptoTableInstalled, "callback table");
    info!("crypto thread-callback table published");
    &CALLBACK_TABLE
}

/// Teardown for this backend is a no-op by contract: the library owns the
/// call-site slots and destroys them through the table.
pub fn cleanup() {}

pub fn callback_table() -> &'static ThreadCallbackTable {
    &CALLBACK_TABLE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_create_lock_unlock_destroy_cycle() {
        let table = callback_table();
        let slot = MutexSlot::new();

        assert_eq!((table.create)(&slot), CB_SUCCESS);
        assert!(slot.is_allocated());
        assert_eq!((table.lock)(&slot), CB_SUCCESS);
        assert_eq!((table.unlock)(&slot), CB_SUCCESS);
        assert_eq!((table.destroy)(&slot), CB_SUCCESS);
        assert!(!slot.is_allocated());
    }

    #[test]
    fn test_destroy_without_create_is_tolerated() {
        let table = callback_table();
        let slot = MutexSlot::new();
        assert_eq!((table.destroy)(&slot), CB_SUCCESS);
    }

    #[test]
    fn test_create_failure_signals_negative_result() {
        let table = callback_table();
        let slot = MutexSlot::new();

        FORCE_CREATE_FAILURE.with(|flag| flag.set(true));
        let status = (table.create)(&slot);
        FORCE_CREATE_FAILURE.with(|flag| flag.set(false));

        assert_eq!(status, CB_FAILURE);
        assert!(!slot.is_allocated());
    }

    #[test]
    #[should_panic(expected = "never created")]
    fn test_lock_without_create_panics() {
        let table = callback_table();
        let slot = MutexSlot::new();
        let _ = (table.lock)(&slot);
    }

    #[test]
    fn test_one_slot_serializes_two_threads() {
        let table = callback_table();
        let slot = Arc::new(MutexSlot::new());
        assert_eq!((table.create)(&slot), CB_SUCCESS);
        assert_eq!((table.lock)(&slot), CB_SUCCESS);

        let (tx, rx) = mpsc::channel();
        let contender = Arc::clone(&slot);
        let worker = thread::spawn(move || {
            let table = callback_table();
            tx.send("attempt").unwrap();
            (table.lock)(&contender);
            tx.send("entered").unwrap();
            (table.unlock)(&contender);
        });

        assert_eq!(rx.recv().unwrap(), "attempt");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!((table.unlock)(&slot), CB_SUCCESS);
        assert_eq!(rx.recv().unwrap(), "entered");
        worker.join().unwrap();

        assert_eq!((table.destroy)(&slot), CB_SUCCESS);
    }
}
