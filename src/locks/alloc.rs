/// All-or-nothing allocation for fixed lock structures.
///
/// The native protocols install either a complete table or nothing: a
/// half-built table must never be observable. The factory seam exists
/// because the original allocator these structures came from can fail per
/// lock; `Mutex::new` cannot, so tests inject failure through the factory.
use log::warn;

use crate::locks::raw::RawBinaryLock;
use crate::observability::events::{self, CoordEventKind};
use crate::observability::metrics::metrics;
use crate::types::{CoordError, CoordResult, LockKind};

/// Build `count` locks, or nothing.
///
/// On the first factory failure every lock already built by this call is
/// dropped and the error names the failing index.
pub(crate) fn allocate_locks(
    kind: LockKind,
    count: usize,
    factory: &mut dyn FnMut(usize) -> Option<RawBinaryLock>,
) -> CoordResult<Vec<RawBinaryLock>> {
    let mut locks = Vec::with_capacity(count);
    for index in 0..count {
        match factory(index) {
            Some(lock) => locks.push(lock),
            None => {
                warn!(
                    "{:?} lock allocation failed at {} of {}; rolling back {} locks",
                    kind,
                    index,
                    count,
                    locks.len()
                );
                metrics().allocation_failures.inc();
                events::emit(
                    CoordEventKind::AllocationRollback,
                    format!("{:?} lock {} of {}", kind, index, count),
                );
                drop(locks);
                return Err(CoordError::LockAllocation {
                    kind,
                    failed_index: index,
                    requested: count,
                });
            }
        }
    }
    Ok(locks)
}

pub(crate) fn system_factory(_index: usize) -> Option<RawBinaryLock> {
    Some(RawBinaryLock::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_full_set() {
        let locks = allocate_locks(LockKind::Crypto, 8, &mut system_factory).unwrap();
        assert_eq!(locks.len(), 8);
    }

    #[test]
    fn test_allocate_zero_is_empty() {
        let locks = allocate_locks(LockKind::Crypto, 0, &mut system_factory).unwrap();
        assert!(locks.is_empty());
    }

    #[test]
    fn test_failure_at_index_rolls_back() {
        let mut built = 0usize;
        let mut factory = |index: usize| {
            if index == 3 {
                None
            } else {
                built += 1;
                Some(RawBinaryLock::new())
            }
        };

        let err = allocate_locks(LockKind::Share, 6, &mut factory).unwrap_err();
        match err {
            CoordError::LockAllocation {
                kind,
                failed_index,
                requested,
            } => {
                assert_eq!(kind, LockKind::Share);
                assert_eq!(failed_index, 3);
                assert_eq!(requested, 6);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Exactly the locks before the failing index were ever built.
        assert_eq!(built, 3);
    }

    #[test]
    fn test_failure_at_first_index_builds_nothing() {
        let mut factory = |_: usize| None;
        let err = allocate_locks(LockKind::Crypto, 4, &mut factory).unwrap_err();
        match err {
            CoordError::LockAllocation { failed_index, .. } => assert_eq!(failed_index, 0),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
