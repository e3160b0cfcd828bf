/// RAII brackets that move the global execution lock across the native
/// boundary.
///
/// Two faces of one discipline: [`BlockingSection`] suspends the managed
/// thread for the duration of a blocking native call, and [`ContextGuard`]
/// resumes its context for the duration of one callback. Both release on
/// every exit path, including unwinds.
use std::marker::PhantomData;
use std::sync::Arc;

use log::{debug, trace};

use crate::observability::events::{self, CoordEventKind};
use crate::observability::metrics::metrics;
use crate::runtime::context::{ContextSlot, ExecutionContext};
use crate::runtime::lock::{ExecutionLock, Runtime};
use crate::types::{CoordError, CoordResult, NativeRef};

/// Anything that can carry a suspended context: an easy handle or a multi
/// handle. The guards and the resolver work through this seam.
pub trait ContextCarrier {
    /// The native resource backing this carrier, if still open.
    fn native_ref(&self) -> Option<NativeRef>;

    /// The carrier's own-context slot.
    fn context_slot(&self) -> &ContextSlot;

    /// The runtime whose execution lock brackets this carrier's operations.
    fn runtime(&self) -> &Arc<Runtime>;

    /// Short name for logs and errors.
    fn kind(&self) -> &'static str;

    /// The suspended context owning this carrier right now, if any.
    fn resolve_context(&self) -> Option<Arc<ExecutionContext>>;
}

/// Bracket for one blocking native call.
///
/// Entering stores the calling thread's context in the carrier's slot and
/// releases the global execution lock, so other managed threads can run
/// while this one blocks in native I/O. Dropping the section reacquires the
/// lock and clears the slot; this covers success, native error, and unwinds
/// out of callback code alike.
#[derive(Debug)]
pub struct BlockingSection<'a> {
    slot: &'a ContextSlot,
    lock: &'a ExecutionLock,
    context: Arc<ExecutionContext>,
    entity: &'static str,
}

impl<'a> BlockingSection<'a> {
    /// Suspend `context` into the carrier's slot and release the execution
    /// lock. The calling thread must hold the lock with `context`.
    ///
    /// Fails with `HandleClosed` when the carrier has no native resource
    /// and with `OperationInProgress` when a blocking operation is already
    /// running on it.
    pub fn enter<C: ContextCarrier>(
        carrier: &'a C,
        context: &Arc<ExecutionContext>,
    ) -> CoordResult<Self> {
        if carrier.native_ref().is_none() {
            return Err(CoordError::HandleClosed);
        }
        if !carrier.context_slot().set_if_vacant(Arc::clone(context)) {
            return Err(CoordError::OperationInProgress {
                entity: carrier.kind(),
            });
        }

        // Slot first, release second: a callback thread that resolves the
        // slot early still blocks on the lock until the release below.
        let lock = carrier.runtime().execution_lock();
        lock.release(context);

        metrics().contexts_suspended.inc();
        metrics().active_suspended.inc();
        events::emit(
            CoordEventKind::ContextSuspended,
            format!("{} on {}", context.id(), carrier.kind()),
        );
        debug!("{} suspended on this {}", context.id(), carrier.kind());

        Ok(Self {
            slot: carrier.context_slot(),
            lock,
            context: Arc::clone(context),
            entity: carrier.kind(),
        })
    }

    /// The suspended context this section carries.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Reacquire the lock and clear the slot. Equivalent to dropping the
    /// section; named for call sites that want the resume point visible.
    pub fn finish(self) {}
}

impl Drop for BlockingSection<'_> {
    fn drop(&mut self) {
        self.lock.acquire(&self.context);
        let cleared = self.slot.clear();
        debug_assert!(
            cleared.map_or(false, |c| c.id() == self.context.id()),
            "context slot no longer carried the suspended context for this {}",
            self.entity
        );
        metrics().active_suspended.dec();
        metrics().contexts_resumed.inc();
        events::emit(
            CoordEventKind::ContextResumed,
            format!("{} on {}", self.context.id(), self.entity),
        );
        debug!("{} resumed on this {}", self.context.id(), self.entity);
    }
}

/// Lock guard for one callback's worth of managed-object access.
///
/// `None` from [`ContextGuard::acquire`] means the carrier is not inside a
/// blocking operation and no lock action was taken; the callback must not
/// touch managed state in that case. The guard stays on the acquiring
/// thread (`!Send`): the lock must be released where it was taken.
#[derive(Debug)]
pub struct ContextGuard<'a> {
    lock: &'a ExecutionLock,
    context: Arc<ExecutionContext>,
    _not_send: PhantomData<*mut ()>,
}

impl<'a> ContextGuard<'a> {
    /// Resolve the carrier's owning context and block until the execution
    /// lock is held for it.
    pub fn acquire<C: ContextCarrier>(carrier: &'a C) -> Option<Self> {
        let context = match carrier.resolve_context() {
            Some(context) => context,
            None => {
                metrics().callback_guards_denied.inc();
                trace!(
                    "callback outside a blocking operation on this {}; no lock taken",
                    carrier.kind()
                );
                return None;
            }
        };

        let lock = carrier.runtime().execution_lock();
        lock.acquire(&context);
        metrics().callback_guards.inc();
        trace!("callback guard entered for {}", context.id());

        Some(Self {
            lock,
            context,
            _not_send: PhantomData,
        })
    }

    /// The context this guard resumed.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Release the lock. Equivalent to dropping the guard.
    pub fn release(self) {}
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(&self.context);
        trace!("callback guard exited for {}", self.context.id());
    }
}
