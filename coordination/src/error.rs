//! Error types for the debate engine.
//!
//! Every failure is surfaced to the nearest await point and re-surfaced
//! upward until it reaches the caller of `DebateProtocol::start`. Nothing
//! in the engine retries.

use crate::debate::workspace::TransitionError;
use crate::events::{Response, SchedulerReply};

/// Result type alias for engine operations
pub type DebateResult<T> = Result<T, DebateError>;

/// Failure to obtain a participant for a role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    /// The agent source has handed out every participant it has.
    #[error("participant pool exhausted (capacity {capacity})")]
    PoolExhausted { capacity: usize },

    /// The agent source is exhausted and no judge can be reused or freed:
    /// none was ever allocated, or the scorer excluded every idle judge
    /// while none was working.
    #[error("agent source exhausted and no judge can be reused or freed")]
    NoJudgeToReuse,
}

/// Errors raised while running a debate
#[derive(Debug, thiserror::Error)]
pub enum DebateError {
    /// A response of a variant that is not valid at this step. The
    /// offending response is the payload.
    #[error("protocol violation: unexpected response {0}")]
    ProtocolViolation(Response),

    #[error("allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    /// The external responder could not deliver a response.
    #[error("responder failed: {0}")]
    Responder(String),

    /// A blocked judge request lost its continuation before a judge freed up.
    #[error("judge wait abandoned before a judge was handed off")]
    WaitAbandoned,

    #[error("unexpected scheduler reply: {0:?}")]
    UnexpectedSchedulerReply(SchedulerReply),

    /// An allocation was sent down the fire-and-forget path.
    #[error("scheduler message {0} needs a reply and cannot be sent asynchronously")]
    NotANotification(&'static str),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("unknown workspace: {0}")]
    UnknownWorkspace(String),

    #[error("workspace {0} is already open")]
    DuplicateWorkspace(String),

    #[error("workspace {0} already has a final answer")]
    AlreadyResolved(String),

    #[error("workspace {path} exceeds maximum decomposition depth {max_depth}")]
    DepthExceeded { path: String, max_depth: usize },

    #[error("configuration error: {0}")]
    Config(String),
}

impl DebateError {
    /// Whether this error carries a response that arrived out of protocol.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation(_))
    }

    /// The offending response, for protocol violations.
    pub fn unexpected_response(&self) -> Option<&Response> {
        match self {
            Self::ProtocolViolation(response) => Some(response),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_violation_carries_response() {
        let err = DebateError::ProtocolViolation(Response::Verdict { chose_first: true });
        assert!(err.is_protocol_violation());
        assert_eq!(
            err.unexpected_response(),
            Some(&Response::Verdict { chose_first: true })
        );
        assert!(err.to_string().contains("verdict"));
    }

    #[test]
    fn test_allocation_error_converts() {
        let err: DebateError = AllocationError::PoolExhausted { capacity: 3 }.into();
        assert!(!err.is_protocol_violation());
        assert_eq!(
            err.to_string(),
            "allocation failed: participant pool exhausted (capacity 3)"
        );
    }
}
