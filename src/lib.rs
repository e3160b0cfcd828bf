//! gilbridge: Thread coordination for a managed-runtime binding over a
//! native transfer library
//!
//! A binding that wraps blocking native transfer calls must release its
//! runtime's global execution lock while a call blocks, reacquire it for
//! every callback, and never lose track of which suspended thread a handle
//! belongs to. This crate is that coordination layer.
//!
//! # Architecture
//!
//! The crate is organized by coordination concern:
//!
//! ## Runtime ([`runtime`])
//! - [`runtime::lock`]: The global execution lock and the per-process runtime
//! - [`runtime::context`]: Context identity for managed threads and the slots
//!   that carry a suspended context
//! - [`runtime::guard`]: RAII brackets for blocking calls and callbacks
//!
//! ## Handles ([`handles`])
//! - [`handles::easy`]: Single-transfer handles
//! - [`handles::multi`]: Multi handles that drive attached easy handles
//! - [`handles::resolve`]: Which suspended context owns an executing handle
//! - [`handles::share`]: Share objects and their category lock hooks
//!
//! ## Locks ([`locks`])
//! - [`locks::raw`]: The binary lock primitive, releasable from any thread
//! - [`locks::alloc`]: All-or-nothing lock table allocation
//! - [`locks::share_array`]: Category-indexed lock array for share objects
//!
//! ## Crypto ([`crypto`])
//! - Build-time selected TLS backend locking: an indexed lock table
//!   (`crypto-openssl`) or a four-function callback table (`crypto-gnutls`)
//!
//! ## Observability ([`observability`])
//! - [`observability::events`]: Structured lifecycle events
//! - [`observability::metrics`]: Lock traffic counters and Prometheus export
//!
//! ## Testing Infrastructure ([`testing`])
//! - [`testing::contention`]: Multi-threaded contention proof harnesses
//!
//! # Design Principles
//!
//! 1. **Slot before release** - The owning context is visible to callback
//!    threads before the execution lock opens
//! 2. **Every exit path restores** - Brackets reacquire the lock and clear
//!    the slot on success, native error, and unwind alike
//! 3. **All-or-nothing allocation** - A lock table that fails to build
//!    releases every lock it already built
//! 4. **Contracts panic, observations assert** - Caller protocol violations
//!    abort loudly; internal consistency checks compile out of release builds
//! 5. **One backend per build** - The two crypto locking variants are
//!    mutually exclusive at compile time

// Shared identifiers and error types
pub mod types;

// Lock primitives
pub mod locks;

// Execution lock and RAII brackets
pub mod runtime;

// Handle entities and context resolution
pub mod handles;

// TLS backend lock installation
#[cfg(any(feature = "crypto-openssl", feature = "crypto-gnutls"))]
pub mod crypto;

// Observability
pub mod observability;

// Testing Infrastructure
pub mod testing;

// Re-export commonly used types for convenience
pub use handles::{resolve, resolve_multi, Handle, MultiHandle, ShareAccess, ShareHandle};
pub use locks::{RawBinaryLock, ShareCategory, ShareLockArray};
pub use runtime::{
    BlockingSection, ContextCarrier, ContextGuard, ContextId, ContextSlot, ExecutionContext,
    ExecutionLock, Runtime,
};
pub use types::{CoordError, CoordResult, LockKind, NativeRef};
