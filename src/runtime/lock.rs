/// The managed runtime's global execution lock and the runtime facade that
/// owns it.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use log::{debug, info};

use crate::observability::metrics::metrics;
use crate::runtime::context::{ContextId, ExecutionContext};

/// The single lock serializing all managed-object access across threads.
///
/// One holder at a time, identified by context id. A thread suspends
/// (releases) immediately before a blocking native call and does not touch
/// managed state again until it reacquires, either at the call's return or
/// inside a callback.
#[derive(Debug)]
pub struct ExecutionLock {
    holder: Mutex<Option<ContextId>>,
    released: Condvar,
}

impl ExecutionLock {
    pub(crate) fn new() -> Self {
        Self {
            holder: Mutex::new(None),
            released: Condvar::new(),
        }
    }

    /// Block until the lock is free, then hold it for `context`.
    ///
    /// Non-reentrant: acquiring while already holding blocks forever, just
    /// as the runtime's own lock would.
    pub fn acquire(&self, context: &ExecutionContext) {
        let mut holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        if holder.is_some() {
            metrics().execution_lock_contentions.inc();
        }
        while holder.is_some() {
            holder = self
                .released
                .wait(holder)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *holder = Some(context.id());
        metrics().execution_lock_acquisitions.inc();
    }

    /// Release the lock held by `context`.
    ///
    /// Must be called exactly once per successful acquire. Releasing a lock
    /// held by a different context, or by nobody, means the caller's context
    /// bookkeeping is corrupt; continuing would let two threads into managed
    /// state at once, so this panics.
    pub fn release(&self, context: &ExecutionContext) {
        let mut holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        match *holder {
            Some(current) if current == context.id() => *holder = None,
            Some(current) => panic!(
                "execution lock released by {} but held by {}",
                context.id(),
                current
            ),
            None => panic!(
                "execution lock released by {} but not held",
                context.id()
            ),
        }
        drop(holder);
        self.released.notify_one();
    }

    /// Whether any context currently holds the lock. Observation only.
    pub fn is_held(&self) -> bool {
        self.holder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The current holder, if any. Observation only.
    pub fn holder(&self) -> Option<ContextId> {
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The managed runtime this binding serves: one global execution lock plus
/// the authority to mint context tokens for threads entering the binding.
///
/// Handles keep shared references to their runtime, so construction hands
/// out an `Arc` directly.
#[derive(Debug)]
pub struct Runtime {
    lock: ExecutionLock,
    next_context: AtomicU64,
}

impl Runtime {
    pub fn new() -> Arc<Self> {
        info!("coordination runtime created");
        Arc::new(Self {
            lock: ExecutionLock::new(),
            next_context: AtomicU64::new(1),
        })
    }

    /// Mint the context token for the managed thread about to perform
    /// blocking operations through this runtime.
    pub fn attach_thread(&self) -> Arc<ExecutionContext> {
        let id = ContextId::from_raw(self.next_context.fetch_add(1, Ordering::Relaxed));
        let context = Arc::new(ExecutionContext::new(id));
        debug!(
            "thread '{}' attached as {}",
            context.thread_name(),
            context.id()
        );
        context
    }

    pub fn execution_lock(&self) -> &ExecutionLock {
        &self.lock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_acquire_release_leaves_lock_free() {
        let runtime = Runtime::new();
        let context = runtime.attach_thread();
        let lock = runtime.execution_lock();

        lock.acquire(&context);
        assert!(lock.is_held());
        assert_eq!(lock.holder(), Some(context.id()));
        lock.release(&context);
        assert!(!lock.is_held());
        assert_eq!(lock.holder(), None);
    }

    #[test]
    fn test_contexts_get_unique_ids() {
        let runtime = Runtime::new();
        let a = runtime.attach_thread();
        let b = runtime.attach_thread();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    #[should_panic(expected = "but not held")]
    fn test_release_unheld_lock_panics() {
        let runtime = Runtime::new();
        let context = runtime.attach_thread();
        runtime.execution_lock().release(&context);
    }

    #[test]
    #[should_panic(expected = "but held by")]
    fn test_release_by_wrong_context_panics() {
        let runtime = Runtime::new();
        let owner = runtime.attach_thread();
        let intruder = runtime.attach_thread();
        let lock = runtime.execution_lock();
        lock.acquire(&owner);
        lock.release(&intruder);
    }

    #[test]
    fn test_second_acquirer_blocks_until_release() {
        let runtime = Runtime::new();
        let first = runtime.attach_thread();
        runtime.execution_lock().acquire(&first);

        let (tx, rx) = mpsc::channel();
        let rt = Arc::clone(&runtime);
        let worker = thread::spawn(move || {
            let second = rt.attach_thread();
            tx.send("attempt").unwrap();
            rt.execution_lock().acquire(&second);
            tx.send("entered").unwrap();
            rt.execution_lock().release(&second);
        });

        assert_eq!(rx.recv().unwrap(), "attempt");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        runtime.execution_lock().release(&first);
        assert_eq!(rx.recv().unwrap(), "entered");
        worker.join().unwrap();
        assert!(!runtime.execution_lock().is_held());
    }
}
