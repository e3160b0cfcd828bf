//! The entities the binding wraps native resources in: easy handles, multi
//! handles, and share objects, plus resolution of which suspended context
//! owns an executing handle.

pub mod easy;
pub mod multi;
pub mod resolve;
pub mod share;

pub use easy::Handle;
pub use multi::MultiHandle;
pub use resolve::{resolve, resolve_multi};
pub use share::{ShareAccess, ShareHandle};
