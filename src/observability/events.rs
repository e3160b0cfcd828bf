// Structured coordination events
//
// Purpose: leave an auditable trail of lifecycle transitions that matter
// when debugging a deadlock report after the fact.
//
// Events always go to the `log` facade at a kind-appropriate level. When a
// sink is installed they are additionally serialized as JSON lines, one
// event per line, so external tooling can replay the session.

use std::io::Write;
use std::sync::{Mutex, OnceLock, PoisonError};

use chrono::{DateTime, Utc};
use log::Level;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle transitions worth recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordEventKind {
    /// A managed thread released the execution lock around a blocking call
    ContextSuspended,
    /// A suspended thread reacquired the execution lock
    ContextResumed,
    /// A share handle and its category lock array came up
    ShareConstructed,
    /// A crypto lock table was installed
    CryptoTableInstalled,
    /// A crypto lock table was torn down
    CryptoTableTornDown,
    /// A partial lock allocation was released in full
    AllocationRollback,
}

impl CoordEventKind {
    /// Log level this kind maps to on the `log` facade.
    pub fn level(&self) -> Level {
        match self {
            CoordEventKind::AllocationRollback => Level::Warn,
            CoordEventKind::ShareConstructed
            | CoordEventKind::CryptoTableInstalled
            | CoordEventKind::CryptoTableTornDown => Level::Info,
            CoordEventKind::ContextSuspended | CoordEventKind::ContextResumed => Level::Debug,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoordEventKind::ContextSuspended => "context_suspended",
            CoordEventKind::ContextResumed => "context_resumed",
            CoordEventKind::ShareConstructed => "share_constructed",
            CoordEventKind::CryptoTableInstalled => "crypto_table_installed",
            CoordEventKind::CryptoTableTornDown => "crypto_table_torn_down",
            CoordEventKind::AllocationRollback => "allocation_rollback",
        }
    }
}

/// One recorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordEvent {
    pub kind: CoordEventKind,
    pub timestamp: DateTime<Utc>,
    pub session_id: Uuid,
    pub thread: String,
    pub details: String,
}

impl CoordEvent {
    fn new(kind: CoordEventKind, details: String) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            session_id: session_id(),
            thread: std::thread::current()
                .name()
                .unwrap_or("unnamed")
                .to_string(),
            details,
        }
    }
}

static SESSION_ID: OnceLock<Uuid> = OnceLock::new();

/// Stable identifier for this process run, stamped on every event.
pub fn session_id() -> Uuid {
    *SESSION_ID.get_or_init(Uuid::new_v4)
}

static EVENT_SINK: OnceLock<Mutex<Box<dyn Write + Send>>> = OnceLock::new();

/// Install a writer that receives every event as a JSON line.
///
/// Only the first installation wins; returns false if a sink was
/// already in place.
pub fn init_event_sink(sink: Box<dyn Write + Send>) -> bool {
    EVENT_SINK.set(Mutex::new(sink)).is_ok()
}

/// Record a coordination event.
pub fn emit(kind: CoordEventKind, details: impl Into<String>) {
    let event = CoordEvent::new(kind, details.into());

    log::log!(
        kind.level(),
        "[{}] {}: {}",
        event.thread,
        kind.as_str(),
        event.details
    );

    if let Some(sink) = EVENT_SINK.get() {
        match serde_json::to_string(&event) {
            Ok(line) => {
                let mut writer = sink.lock().unwrap_or_else(PoisonError::into_inner);
                if let Err(err) = writeln!(writer, "{}", line) {
                    log::warn!("event sink write failed: {}", err);
                }
            }
            Err(err) => {
                log::warn!("event serialization failed: {}", err);
            }
        }
    }
}
