//! Lock primitives shared by the share-object and crypto shims.
//!
//! Everything here is built on one binary lock type whose unlock may come
//! from a different stack frame than the matching lock, because the native
//! callback protocols lock in one invocation and unlock in a later one.

pub mod alloc;
pub mod raw;
pub mod share_array;

pub use raw::RawBinaryLock;
pub use share_array::{ShareCategory, ShareLockArray};
