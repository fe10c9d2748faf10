//! Append-only interaction log
//!
//! Single-writer discipline: every append takes the log lock, so an index
//! is never issued twice and concurrent fan-out branches see one total
//! order. Entries are never mutated or removed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

use super::bus::{EntryFilter, FilteredReceiver, IndexedEntry, LogBus};
use super::types::{LogEntry, LogIndex};

/// Shared reference to InteractionLog
pub type SharedInteractionLog = Arc<InteractionLog>;

/// Ordered event log of one protocol run
pub struct InteractionLog {
    entries: Mutex<Vec<LogEntry>>,
    bus: LogBus,
}

impl InteractionLog {
    pub fn new() -> Self {
        Self::with_bus(LogBus::new())
    }

    pub fn with_bus(bus: LogBus) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            bus,
        }
    }

    /// Create a shared reference to this log
    pub fn shared(self) -> SharedInteractionLog {
        Arc::new(self)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an entry and return its index
    pub fn append(&self, entry: LogEntry) -> LogIndex {
        let mut entries = self.lock();
        let index = entries.len();
        debug!(index, kind = entry.kind(), "Log append");
        // Published under the lock so subscribers observe log order.
        self.bus.publish(index, &entry);
        entries.push(entry);
        index
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, index: LogIndex) -> Option<LogEntry> {
        self.lock().get(index).cloned()
    }

    /// Copy of every entry appended so far
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Subscribe to entries appended from now on
    pub fn subscribe(&self) -> broadcast::Receiver<IndexedEntry> {
        self.bus.subscribe()
    }

    pub fn subscribe_filtered(&self, filter: EntryFilter) -> FilteredReceiver {
        self.bus.subscribe_filtered(filter)
    }

    /// Check the request/response correlation invariant
    pub fn validate(&self) -> Vec<LogViolation> {
        validate_entries(&self.lock())
    }
}

impl Default for InteractionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// A breach of the request/response correlation invariant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogViolation {
    #[error("response at {index} names request {request_index}, which is not earlier in the log")]
    ResponseBeforeRequest {
        index: LogIndex,
        request_index: LogIndex,
    },

    #[error("response at {index} names entry {request_index}, which is not a matching request")]
    MismatchedRequest {
        index: LogIndex,
        request_index: LogIndex,
    },

    #[error("response at {index} answers async request {request_index}")]
    ResponseToAsync {
        index: LogIndex,
        request_index: LogIndex,
    },

    #[error("response at {index} duplicates response at {first} for request {request_index}")]
    DuplicateResponse {
        index: LogIndex,
        request_index: LogIndex,
        first: LogIndex,
    },
}

/// Report every violation in a captured log. Requests still awaiting a
/// response are not violations; see `LogStats::pending_requests`.
pub fn validate_entries(entries: &[LogEntry]) -> Vec<LogViolation> {
    let mut violations = Vec::new();
    let mut answered: HashMap<LogIndex, LogIndex> = HashMap::new();

    for (index, entry) in entries.iter().enumerate() {
        let Some(request_index) = entry.request_index() else {
            continue;
        };

        if request_index >= index {
            violations.push(LogViolation::ResponseBeforeRequest {
                index,
                request_index,
            });
            continue;
        }

        let request = &entries[request_index];
        let kinds_match = matches!(
            (request, entry),
            (
                LogEntry::InteractRequest { .. },
                LogEntry::InteractResponse { .. }
            ) | (
                LogEntry::SchedulerRequest { .. },
                LogEntry::SchedulerResponse { .. }
            )
        );
        if !kinds_match {
            violations.push(LogViolation::MismatchedRequest {
                index,
                request_index,
            });
            continue;
        }

        if !request.awaits_response() {
            violations.push(LogViolation::ResponseToAsync {
                index,
                request_index,
            });
            continue;
        }

        if let Some(&first) = answered.get(&request_index) {
            violations.push(LogViolation::DuplicateResponse {
                index,
                request_index,
                first,
            });
        } else {
            answered.insert(request_index, index);
        }
    }

    violations
}
