//! Ordered event log for debate runs
//!
//! Every boundary crossing of a run (participant interaction, scheduler
//! request, participant allocation) is appended here. The log is the
//! observable record of a run and the input to replay.
//!
//! # Components
//!
//! 1. **Entry Types** (`types.rs`): the closed set of log entries and the
//!    protocol payloads they carry.
//!
//! 2. **Interaction Log** (`log.rs`): append-only, single-writer storage
//!    with snapshot reads and invariant validation.
//!
//! 3. **Log Bus** (`bus.rs`): Tokio broadcast of each appended entry for
//!    live observers.
//!
//! 4. **History** (`history.rs`): statistics and replay-prefix helpers.
//!
//! # Correlation
//!
//! ```text
//!  index  entry
//!  ─────  ─────────────────────────────────────────────
//!    0    SchedulerRequest  { async: false, Allocate }
//!    1    ParticipantAllocated
//!    2    SchedulerResponse { request_index: 0 }
//!    3    InteractRequest   { participant, template }
//!    4    InteractResponse  { request_index: 3 }
//! ```

pub mod bus;
pub mod history;
pub mod log;
pub mod types;

pub use bus::{EntryFilter, FilteredReceiver, IndexedEntry, LogBus, DEFAULT_BUS_CAPACITY};
pub use history::{interaction_responses, prefix_with_responses, LogStats};
pub use log::{validate_entries, InteractionLog, LogViolation, SharedInteractionLog};
pub use types::{
    LogEntry, LogIndex, Participant, ParticipantId, Prompt, Response, RoleHint,
    SchedulerMessage, SchedulerReply, SubAnswer, Template,
};
