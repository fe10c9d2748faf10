//! Debate Coordination Library
//!
//! This library provides:
//! - An ordered, append-only interaction log with live observation
//! - A runner that turns every protocol step into a logged request/response
//! - A judge scheduler with reuse weighting and a LIFO wait chain
//! - The recursive debate protocol (honest vs. malicious expert, judge
//!   verdict or decomposition)
//! - A replay responder that re-executes a captured log prefix
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use debate_coordination::{DebateConfig, DebateProtocol, ScriptedResponder};
//!
//! # async fn run() -> debate_coordination::DebateResult<()> {
//! let responder = Arc::new(ScriptedResponder::always_verdict(true));
//! let protocol = DebateProtocol::from_config(DebateConfig::from_env(), responder)?;
//! let answer = protocol.start("Is the sky blue?").await?;
//! println!("{} ({} log entries)", answer, protocol.log().len());
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod debate;
pub mod error;
pub mod events;
pub mod replay;
pub mod responders;
pub mod runner;
pub mod scheduler;

// Re-export key engine types
pub use config::DebateConfig;
pub use error::{AllocationError, DebateError, DebateResult};
pub use runner::InteractionRunner;

// Re-export key debate types
pub use debate::{
    DebateProtocol, InMemoryProjection, NoopProjection, StateProjection, WorkspaceArena,
    WorkspacePhase, WorkspaceRecord,
};

// Re-export key event types
pub use events::{
    InteractionLog, LogEntry, LogStats, Participant, Prompt, Response, RoleHint,
    SchedulerMessage, SchedulerReply, SharedInteractionLog, SubAnswer, Template,
};

// Re-export scheduler types
pub use scheduler::{
    AgentSource, ConstantScorer, PoolAgentSource, ReuseScorer, Scheduler, SharedScheduler,
};

// Re-export responder types
pub use replay::ReplayResponder;
pub use responders::{ChannelResponder, InteractionTicket, JudgePolicy, Responder, ScriptedResponder};
