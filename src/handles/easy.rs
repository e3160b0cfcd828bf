/// The single-transfer handle: one native easy resource wrapped by one
/// managed object.
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use crate::handles::multi::MultiHandle;
use crate::handles::resolve;
use crate::runtime::context::{ContextSlot, ExecutionContext};
use crate::runtime::guard::ContextCarrier;
use crate::runtime::lock::Runtime;
use crate::types::{CoordError, CoordResult, NativeRef};

/// A handle is exclusively owned by one managed object. Its own-context
/// slot is set while a single-transfer blocking operation runs on it; while
/// it is attached to a multi handle, multi-transfer operations carry the
/// context on the multi handle instead, never both at once.
#[derive(Debug)]
pub struct Handle {
    native: Mutex<Option<NativeRef>>,
    own_context: ContextSlot,
    multi: Mutex<Option<Arc<MultiHandle>>>,
    runtime: Arc<Runtime>,
}

impl Handle {
    /// Create a handle backed by a fresh native resource.
    pub fn new(runtime: &Arc<Runtime>) -> Arc<Self> {
        let native = NativeRef::allocate();
        debug!("handle created (native {:#x})", native.raw());
        Arc::new(Self {
            native: Mutex::new(Some(native)),
            own_context: ContextSlot::new(),
            multi: Mutex::new(None),
            runtime: Arc::clone(runtime),
        })
    }

    /// Drop the native resource reference.
    ///
    /// Closing while a blocking operation carries a context on this handle
    /// would leave a context pointing at nothing; that is a programming
    /// error and panics.
    pub fn close(&self) {
        if self.own_context.is_set() {
            panic!("handle closed during a blocking operation");
        }
        let mut native = self.native.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(native) = native.take() {
            debug!("handle closed (native {:#x})", native.raw());
        }
    }

    pub fn native_ref(&self) -> Option<NativeRef> {
        *self.native.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The multi handle this handle is attached to, if any.
    pub fn owning_multi(&self) -> Option<Arc<MultiHandle>> {
        self.multi
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The context in this handle's own slot, if a single-transfer blocking
    /// operation is running on it.
    pub fn current_context(&self) -> Option<Arc<ExecutionContext>> {
        self.own_context.get()
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub(crate) fn set_owning_multi(&self, multi: Arc<MultiHandle>) -> CoordResult<()> {
        let mut slot = self.multi.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(CoordError::AlreadyAttached);
        }
        *slot = Some(multi);
        Ok(())
    }

    pub(crate) fn clear_owning_multi(&self, multi: &Arc<MultiHandle>) -> CoordResult<()> {
        let mut slot = self.multi.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(current) if Arc::ptr_eq(current, multi) => {
                *slot = None;
                Ok(())
            }
            _ => Err(CoordError::NotAttached),
        }
    }
}

impl ContextCarrier for Handle {
    fn native_ref(&self) -> Option<NativeRef> {
        Handle::native_ref(self)
    }

    fn context_slot(&self) -> &ContextSlot {
        &self.own_context
    }

    fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    fn kind(&self) -> &'static str {
        "handle"
    }

    fn resolve_context(&self) -> Option<Arc<ExecutionContext>> {
        resolve::resolve(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_handle_is_open_and_idle() {
        let runtime = Runtime::new();
        let handle = Handle::new(&runtime);
        assert!(handle.native_ref().is_some());
        assert!(handle.current_context().is_none());
        assert!(handle.owning_multi().is_none());
    }

    #[test]
    fn test_close_drops_native_ref() {
        let runtime = Runtime::new();
        let handle = Handle::new(&runtime);
        handle.close();
        assert!(handle.native_ref().is_none());
        // Closing an already closed handle stays a no-op.
        handle.close();
        assert!(handle.native_ref().is_none());
    }

    #[test]
    #[should_panic(expected = "closed during a blocking operation")]
    fn test_close_during_blocking_operation_panics() {
        let runtime = Runtime::new();
        let context = runtime.attach_thread();
        let handle = Handle::new(&runtime);

        runtime.execution_lock().acquire(&context);
        let _section = crate::runtime::guard::BlockingSection::enter(&*handle, &context).unwrap();
        handle.close();
    }
}
