/// Which suspended context owns an executing handle.
///
/// Native callbacks resolve this before touching managed state; the answer
/// decides which suspended thread gets resumed. The checks mirror the
/// single-transfer/multi-transfer mutual exclusion: observing both slots
/// set, or a context on a closed handle, means handle bookkeeping is
/// corrupt, and the debug assertions catch it where it happens.
use std::sync::Arc;

use crate::handles::easy::Handle;
use crate::handles::multi::MultiHandle;
use crate::runtime::context::ExecutionContext;

/// The context owning `handle`, if it is inside a blocking operation.
///
/// The handle's own slot wins (single-transfer mode); otherwise the owning
/// multi handle's slot (multi-transfer mode); otherwise none.
pub fn resolve(handle: &Handle) -> Option<Arc<ExecutionContext>> {
    if let Some(context) = handle.current_context() {
        debug_assert!(
            handle.native_ref().is_some(),
            "context carried by a closed handle"
        );
        if let Some(multi) = handle.owning_multi() {
            debug_assert!(
                multi.current_context().is_none(),
                "handle and its owning multi handle both carry a context"
            );
        }
        return Some(context);
    }

    if let Some(multi) = handle.owning_multi() {
        if let Some(context) = multi.current_context() {
            debug_assert!(
                multi.native_ref().is_some(),
                "context carried by a closed multi handle"
            );
            debug_assert!(
                handle.native_ref().is_some(),
                "attached handle lost its native resource mid-operation"
            );
            return Some(context);
        }
    }

    None
}

/// The context owning `multi`, if a multi-transfer blocking operation is
/// running on it.
pub fn resolve_multi(multi: &MultiHandle) -> Option<Arc<ExecutionContext>> {
    let context = multi.current_context()?;
    debug_assert!(
        multi.native_ref().is_some(),
        "context carried by a closed multi handle"
    );
    Some(context)
}
