/// Execution-context tokens and the slots that carry them.
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Identifier for an execution context, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Opaque token identifying one suspended managed thread.
///
/// A token is referenced, never duplicated: the `Arc` clones held by a
/// handle slot and by the thread itself all name the same suspended thread.
/// Token identity is the id, not the allocation.
#[derive(Debug)]
pub struct ExecutionContext {
    id: ContextId,
    thread_name: String,
}

impl ExecutionContext {
    pub(crate) fn new(id: ContextId) -> Self {
        let thread_name = std::thread::current()
            .name()
            .unwrap_or("unnamed")
            .to_string();
        Self { id, thread_name }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Name of the managed thread this token was minted on.
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }
}

impl PartialEq for ExecutionContext {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ExecutionContext {}

/// Interior-mutable holder for the "own context" field on a handle or multi
/// handle.
///
/// The owning managed thread writes the slot around its blocking calls;
/// native callback threads read it through the resolver while that thread
/// is suspended. No two entities ever write one slot concurrently.
#[derive(Debug, Default)]
pub struct ContextSlot {
    inner: Mutex<Option<Arc<ExecutionContext>>>,
}

impl ContextSlot {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Store a context if the slot is vacant. Returns false (and stores
    /// nothing) when a context is already present.
    pub(crate) fn set_if_vacant(&self, context: Arc<ExecutionContext>) -> bool {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(context);
        true
    }

    /// Take the stored context out of the slot.
    pub(crate) fn clear(&self) -> Option<Arc<ExecutionContext>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn get(&self) -> Option<Arc<ExecutionContext>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_set(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
