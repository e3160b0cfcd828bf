//! The managed runtime's execution lock, the context tokens that identify
//! its suspended threads, and the RAII guards that move the lock across the
//! native boundary.

pub mod context;
pub mod guard;
pub mod lock;

pub use context::{ContextId, ContextSlot, ExecutionContext};
pub use guard::{BlockingSection, ContextCarrier, ContextGuard};
pub use lock::{ExecutionLock, Runtime};
