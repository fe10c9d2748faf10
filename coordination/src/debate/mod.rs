//! Debate protocol - recursive adjudication over a workspace tree
//!
//! Two experts answer a question, a judge either rules between them or
//! splits the question into subquestions that are debated recursively.
//!
//! # Workspace Flow
//!
//! ```text
//! Opened → Adjudicating → [judge response]
//!              ▲               │
//!              │               ├─ Verdict   → Resolved (answer written)
//!              │               ├─ Decompose → Decomposed
//!              │               │                 │ fan out children
//!              └───────────────┼─────────────────┘ (same path, more context)
//!                              └─ Answer    → Aborted (protocol violation)
//! ```
//!
//! Child paths are `<parent>.subquestions[k]`, with `k` continuing from the
//! parent's existing child count on every revisit.

pub mod projection;
pub mod protocol;
pub mod workspace;

pub use projection::{InMemoryProjection, NoopProjection, StateProjection};
pub use protocol::DebateProtocol;
pub use workspace::{
    child_path, TransitionError, WorkspaceArena, WorkspacePhase, WorkspaceRecord,
    WorkspaceTransition,
};
