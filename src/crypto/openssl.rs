/// Indexed global lock table for the OpenSSL-style backend.
///
/// The library reports how many locks it needs at startup; its internals
/// then address them by index through a process-wide locking callback, and
/// identify threads through a companion id callback. The table is one
/// process-wide singleton with an explicit init/cleanup lifecycle: either
/// fully absent or fully populated, never partial, and reinitializable
/// after a full teardown.
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info};

use crate::locks::alloc::{self, allocate_locks};
use crate::locks::raw::RawBinaryLock;
use crate::observability::events::{self, CoordEventKind};
use crate::observability::metrics::metrics;
use crate::types::{CoordError, CoordResult, LockKind};

/// Lock-or-unlock discriminant the library passes to the locking hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOp {
    Lock,
    Unlock,
}

#[derive(Debug)]
struct CryptoLockTable {
    // Entries are shared so a hook can move off the table lock before
    // blocking on an entry; cleanup never races a hook by contract, the
    // sharing just keeps the dispatch window short.
    locks: Vec<Arc<RawBinaryLock>>,
}

static CRYPTO_TABLE: RwLock<Option<CryptoLockTable>> = RwLock::new(None);

/// Build the table with `lock_count` mutexes and publish it.
///
/// Allocation is all-or-nothing: a mid-allocation failure rolls back every
/// lock built by this call and leaves the singleton empty. Initializing
/// while a table is installed fails; reinit requires a full [`cleanup`].
pub fn init(lock_count: usize) -> CoordResult<()> {
    init_with(lock_count, &mut alloc::system_factory)
}

pub(crate) fn init_with(
    lock_count: usize,
    factory: &mut dyn FnMut(usize) -> Option<RawBinaryLock>,
) -> CoordResult<()> {
    let mut table = CRYPTO_TABLE.write().unwrap_or_else(PoisonError::into_inner);
    if table.is_some() {
        return Err(CoordError::CryptoAlreadyInstalled);
    }

    let locks = allocate_locks(LockKind::Crypto, lock_count, factory)?;
    *table = Some(CryptoLockTable {
        locks: locks.into_iter().map(Arc::new).collect(),
    });

    metrics().crypto_tables_installed.inc();
    events::emit(
        CoordEventKind::CryptoTableInstalled,
        format!("{} locks", lock_count),
    );
    info!("crypto lock table installed ({} locks)", lock_count);
    Ok(())
}

/// Tear the table down: every mutex is freed and the singleton reset to
/// empty. Cleanup with no table installed is explicitly a no-op, tolerating
/// ambiguous shutdown ordering between the binding and the runtime.
pub fn cleanup() {
    let mut table = CRYPTO_TABLE.write().unwrap_or_else(PoisonError::into_inner);
    match table.take() {
        Some(removed) => {
            events::emit(
                CoordEventKind::CryptoTableTornDown,
                format!("{} locks", removed.locks.len()),
            );
            info!("crypto lock table removed ({} locks)", removed.locks.len());
        }
        None => debug!("crypto cleanup with no table installed; nothing to do"),
    }
}

/// Locking callback for the library: lock or unlock `table[index]`.
///
/// Dispatch with no table installed, or with an out-of-range index, means
/// the library is running against callbacks whose table is gone; both are
/// protocol violations and panic.
pub fn locking_hook(op: HookOp, index: usize) {
    let lock = {
        let table = CRYPTO_TABLE.read().unwrap_or_else(PoisonError::into_inner);
        let Some(table) = table.as_ref() else {
            panic!("crypto locking hook invoked with no table installed");
        };
        match table.locks.get(index) {
            Some(lock) => Arc::clone(lock),
            None => panic!(
                "crypto lock index {} out of range ({} locks)",
                index,
                table.locks.len()
            ),
        }
    };

    match op {
        HookOp::Lock => {
            lock.lock();
            metrics().crypto_lock_acquisitions.inc();
        }
        HookOp::Unlock => lock.unlock(),
    }
}

/// Thread-identity callback for the library: a unique opaque identifier
/// for the calling OS thread.
pub fn thread_id_hook() -> u64 {
    #[cfg(target_os = "linux")]
    return (unsafe { libc::syscall(libc::SYS_gettid) }) as u64;

    #[cfg(all(unix, not(target_os = "linux")))]
    return unsafe { libc::pthread_self() as u64 };

    #[cfg(not(unix))]
    {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        hasher.finish()
    }
}

/// Whether a table is currently installed.
pub fn is_installed() -> bool {
    CRYPTO_TABLE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// Size of the installed table, if any.
pub fn installed_lock_count() -> Option<usize> {
    CRYPTO_TABLE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|table| table.locks.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc, Mutex};
    use std::thread;
    use std::time::Duration;

    // The table is process-global; tests that touch it take this lock so
    // they cannot interleave, and each leaves the table empty.
    static TABLE_TESTS: Mutex<()> = Mutex::new(());

    fn serial() -> std::sync::MutexGuard<'static, ()> {
        TABLE_TESTS.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[test]
    fn test_init_cleanup_init_cycle() {
        let _serial = serial();

        init(8).unwrap();
        assert!(is_installed());
        assert_eq!(installed_lock_count(), Some(8));

        cleanup();
        assert!(!is_installed());
        assert_eq!(installed_lock_count(), None);

        // A fresh init after full teardown must succeed.
        init(4).unwrap();
        assert_eq!(installed_lock_count(), Some(4));
        cleanup();
    }

    #[test]
    fn test_double_init_is_rejected() {
        let _serial = serial();

        init(2).unwrap();
        assert!(matches!(
            init(2).unwrap_err(),
            CoordError::CryptoAlreadyInstalled
        ));
        // The installed table is untouched by the failed reinit.
        assert_eq!(installed_lock_count(), Some(2));
        cleanup();
    }

    #[test]
    fn test_double_cleanup_is_a_noop() {
        let _serial = serial();

        init(2).unwrap();
        cleanup();
        cleanup();
        assert!(!is_installed());
    }

    #[test]
    fn test_failed_allocation_leaves_table_empty() {
        let _serial = serial();

        let mut built = 0usize;
        let mut factory = |index: usize| {
            if index == 5 {
                None
            } else {
                built += 1;
                Some(RawBinaryLock::new())
            }
        };

        let err = init_with(8, &mut factory).unwrap_err();
        match err {
            CoordError::LockAllocation {
                kind,
                failed_index,
                requested,
            } => {
                assert_eq!(kind, LockKind::Crypto);
                assert_eq!(failed_index, 5);
                assert_eq!(requested, 8);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Rollback: only the locks before the failure were ever built, and
        // no table was published.
        assert_eq!(built, 5);
        assert!(!is_installed());

        // A healthy init afterwards succeeds.
        init(3).unwrap();
        assert_eq!(installed_lock_count(), Some(3));
        cleanup();
    }

    #[test]
    fn test_locking_hook_serializes_an_index() {
        let _serial = serial();
        init(4).unwrap();

        locking_hook(HookOp::Lock, 1);

        let (tx, rx) = mpsc::channel();
        let contender = thread::spawn(move || {
            tx.send("attempt").unwrap();
            locking_hook(HookOp::Lock, 1);
            tx.send("entered").unwrap();
            locking_hook(HookOp::Unlock, 1);
        });

        assert_eq!(rx.recv().unwrap(), "attempt");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        locking_hook(HookOp::Unlock, 1);
        assert_eq!(rx.recv().unwrap(), "entered");
        contender.join().unwrap();

        // Distinct indices stay independent.
        locking_hook(HookOp::Lock, 0);
        locking_hook(HookOp::Lock, 3);
        locking_hook(HookOp::Unlock, 3);
        locking_hook(HookOp::Unlock, 0);

        cleanup();
    }

    #[test]
    #[should_panic(expected = "no table installed")]
    fn test_hook_without_table_panics() {
        let _serial = serial();
        cleanup();
        locking_hook(HookOp::Lock, 0);
    }

    #[test]
    fn test_thread_id_is_stable_per_thread_and_distinct() {
        let here = thread_id_hook();
        assert_eq!(here, thread_id_hook());

        let there = thread::spawn(thread_id_hook).join().unwrap();
        assert_ne!(here, there);
    }
}
