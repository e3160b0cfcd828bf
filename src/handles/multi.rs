/// The multi-transfer handle: aggregates attached easy handles and carries
/// the context for multi-transfer blocking operations.
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use crate::handles::easy::Handle;
use crate::handles::resolve;
use crate::runtime::context::{ContextSlot, ExecutionContext};
use crate::runtime::guard::ContextCarrier;
use crate::runtime::lock::Runtime;
use crate::types::{CoordError, CoordResult, NativeRef};

#[derive(Debug)]
pub struct MultiHandle {
    native: Mutex<Option<NativeRef>>,
    own_context: ContextSlot,
    runtime: Arc<Runtime>,
}

impl MultiHandle {
    /// Create a multi handle backed by a fresh native resource.
    pub fn new(runtime: &Arc<Runtime>) -> Arc<Self> {
        let native = NativeRef::allocate();
        debug!("multi handle created (native {:#x})", native.raw());
        Arc::new(Self {
            native: Mutex::new(Some(native)),
            own_context: ContextSlot::new(),
            runtime: Arc::clone(runtime),
        })
    }

    /// Attach `handle` to this multi handle.
    ///
    /// The handle keeps a strong back-reference until it is detached, which
    /// is what the resolver follows for multi-transfer operations. Fails if
    /// either side is closed, if the handle is already attached somewhere,
    /// or if a blocking operation is running on either side.
    pub fn attach(self: &Arc<Self>, handle: &Arc<Handle>) -> CoordResult<()> {
        debug_assert!(
            Arc::ptr_eq(&self.runtime, handle.runtime()),
            "handle and multi handle belong to different runtimes"
        );
        if self.native_ref().is_none() || handle.native_ref().is_none() {
            return Err(CoordError::HandleClosed);
        }
        if handle.current_context().is_some() {
            return Err(CoordError::OperationInProgress { entity: "handle" });
        }
        if self.own_context.is_set() {
            return Err(CoordError::OperationInProgress {
                entity: "multi handle",
            });
        }
        handle.set_owning_multi(Arc::clone(self))?;
        debug!("handle attached to multi handle");
        Ok(())
    }

    /// Detach `handle` from this multi handle.
    pub fn detach(self: &Arc<Self>, handle: &Arc<Handle>) -> CoordResult<()> {
        if self.own_context.is_set() {
            return Err(CoordError::OperationInProgress {
                entity: "multi handle",
            });
        }
        if handle.current_context().is_some() {
            return Err(CoordError::OperationInProgress { entity: "handle" });
        }
        handle.clear_owning_multi(self)?;
        debug!("handle detached from multi handle");
        Ok(())
    }

    /// Drop the native resource reference. Panics if a multi-transfer
    /// blocking operation is still carrying a context on this handle.
    pub fn close(&self) {
        if self.own_context.is_set() {
            panic!("multi handle closed during a blocking operation");
        }
        let mut native = self.native.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(native) = native.take() {
            debug!("multi handle closed (native {:#x})", native.raw());
        }
    }

    pub fn native_ref(&self) -> Option<NativeRef> {
        *self.native.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The context in this multi handle's own slot, if a multi-transfer
    /// blocking operation is running on it.
    pub fn current_context(&self) -> Option<Arc<ExecutionContext>> {
        self.own_context.get()
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }
}

impl ContextCarrier for MultiHandle {
    fn native_ref(&self) -> Option<NativeRef> {
        MultiHandle::native_ref(self)
    }

    fn context_slot(&self) -> &ContextSlot {
        &self.own_context
    }

    fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    fn kind(&self) -> &'static str {
        "multi handle"
    }

    fn resolve_context(&self) -> Option<Arc<ExecutionContext>> {
        resolve::resolve_multi(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_and_detach() {
        let runtime = Runtime::new();
        let multi = MultiHandle::new(&runtime);
        let handle = Handle::new(&runtime);

        multi.attach(&handle).unwrap();
        assert!(handle
            .owning_multi()
            .map_or(false, |m| Arc::ptr_eq(&m, &multi)));

        multi.detach(&handle).unwrap();
        assert!(handle.owning_multi().is_none());
    }

    #[test]
    fn test_double_attach_is_rejected() {
        let runtime = Runtime::new();
        let first = MultiHandle::new(&runtime);
        let second = MultiHandle::new(&runtime);
        let handle = Handle::new(&runtime);

        first.attach(&handle).unwrap();
        let err = second.attach(&handle).unwrap_err();
        assert!(matches!(err, CoordError::AlreadyAttached));
        // Still attached to the first multi handle.
        assert!(handle
            .owning_multi()
            .map_or(false, |m| Arc::ptr_eq(&m, &first)));
    }

    #[test]
    fn test_detach_from_wrong_multi_is_rejected() {
        let runtime = Runtime::new();
        let owner = MultiHandle::new(&runtime);
        let stranger = MultiHandle::new(&runtime);
        let handle = Handle::new(&runtime);

        owner.attach(&handle).unwrap();
        let err = stranger.detach(&handle).unwrap_err();
        assert!(matches!(err, CoordError::NotAttached));
        owner.detach(&handle).unwrap();
    }

    #[test]
    fn test_detach_unattached_is_rejected() {
        let runtime = Runtime::new();
        let multi = MultiHandle::new(&runtime);
        let handle = Handle::new(&runtime);
        assert!(matches!(
            multi.detach(&handle).unwrap_err(),
            CoordError::NotAttached
        ));
    }

    #[test]
    fn test_attach_closed_handle_is_rejected() {
        let runtime = Runtime::new();
        let multi = MultiHandle::new(&runtime);
        let handle = Handle::new(&runtime);
        handle.close();
        assert!(matches!(
            multi.attach(&handle).unwrap_err(),
            CoordError::HandleClosed
        ));
    }

    #[test]
    fn test_attach_during_multi_operation_is_rejected() {
        let runtime = Runtime::new();
        let context = runtime.attach_thread();
        let multi = MultiHandle::new(&runtime);
        let handle = Handle::new(&runtime);

        runtime.execution_lock().acquire(&context);
        let section =
            crate::runtime::guard::BlockingSection::enter(&*multi, &context).unwrap();

        let err = multi.attach(&handle).unwrap_err();
        assert!(matches!(
            err,
            CoordError::OperationInProgress {
                entity: "multi handle"
            }
        ));

        section.finish();
        runtime.execution_lock().release(&context);
    }
}
