/// Binary lock for native callback protocols.
///
/// A `MutexGuard` cannot model these locks: the native library locks a
/// resource in one callback invocation and unlocks it in a later one, so the
/// two halves never share a stack frame. The lock is therefore plain state
/// behind a mutex/condvar pair: free or held, non-reentrant, no timeout.
use std::sync::{Condvar, Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct RawBinaryLock {
    held: Mutex<bool>,
    freed: Condvar,
}

impl RawBinaryLock {
    pub fn new() -> Self {
        Self {
            held: Mutex::new(false),
            freed: Condvar::new(),
        }
    }

    /// Block until the lock is free, then take it.
    ///
    /// Non-reentrant: a thread locking a lock it already holds blocks
    /// forever, exactly as the native protocols specify.
    pub fn lock(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while *held {
            held = self.freed.wait(held).unwrap_or_else(PoisonError::into_inner);
        }
        *held = true;
    }

    /// Release the lock.
    ///
    /// Unlocking a lock that is not held means the callback sequencing
    /// around it is corrupt; that is a protocol violation and panics.
    pub fn unlock(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !*held {
            panic!("unlock of a free lock");
        }
        *held = false;
        drop(held);
        self.freed.notify_one();
    }

    /// Observation only; the answer may be stale by the time it returns.
    pub fn is_held(&self) -> bool {
        *self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_lock_unlock_cycle() {
        let lock = RawBinaryLock::new();
        assert!(!lock.is_held());
        lock.lock();
        assert!(lock.is_held());
        lock.unlock();
        assert!(!lock.is_held());
    }

    #[test]
    #[should_panic(expected = "unlock of a free lock")]
    fn test_unlock_free_lock_panics() {
        let lock = RawBinaryLock::new();
        lock.unlock();
    }

    #[test]
    fn test_unlock_spans_stack_frames() {
        fn take(lock: &RawBinaryLock) {
            lock.lock();
        }
        fn release(lock: &RawBinaryLock) {
            lock.unlock();
        }
        let lock = RawBinaryLock::new();
        take(&lock);
        release(&lock);
        assert!(!lock.is_held());
    }

    #[test]
    fn test_second_locker_blocks_until_unlock() {
        let lock = Arc::new(RawBinaryLock::new());
        lock.lock();

        let (tx, rx) = mpsc::channel();
        let contender = Arc::clone(&lock);
        let worker = thread::spawn(move || {
            tx.send("attempt").unwrap();
            contender.lock();
            tx.send("entered").unwrap();
            contender.unlock();
        });

        assert_eq!(rx.recv().unwrap(), "attempt");
        // The contender must still be parked while we hold the lock.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        lock.unlock();
        assert_eq!(rx.recv().unwrap(), "entered");
        worker.join().unwrap();
    }
}
