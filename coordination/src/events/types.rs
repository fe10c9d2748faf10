//! Event log entry types
//!
//! The log is a closed tagged union of five entry kinds. Entries are
//! indexed by position and the position is the correlation id: a
//! response names the index of the request it answers.

use serde::{Deserialize, Serialize};

/// Position of an entry in the interaction log
pub type LogIndex = usize;

/// Identifier assigned by the agent source, in allocation order
pub type ParticipantId = usize;

/// What kind of participant the scheduler is asked for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleHint {
    /// Expert arguing for the true answer
    Honest,
    /// Expert trying to mislead the judge
    Malicious,
    /// Judge for one workspace; the path feeds contamination avoidance
    Judge { workspace: String },
}

impl RoleHint {
    /// Whether this role draws from the shared, reusable judge pool
    pub fn is_contended(&self) -> bool {
        matches!(self, Self::Judge { .. })
    }

    /// Workspace path for judge hints
    pub fn workspace(&self) -> Option<&str> {
        match self {
            Self::Judge { workspace } => Some(workspace),
            _ => None,
        }
    }

    pub fn role_name(&self) -> &'static str {
        match self {
            Self::Honest => "honest",
            Self::Malicious => "malicious",
            Self::Judge { .. } => "judge",
        }
    }
}

impl std::fmt::Display for RoleHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Judge { workspace } => write!(f, "judge({})", workspace),
            other => write!(f, "{}", other.role_name()),
        }
    }
}

/// A human or agent bound to a role. Identity is the allocation index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    /// Hint the participant was first allocated under
    pub role: RoleHint,
}

impl Participant {
    pub fn new(id: ParticipantId, role: RoleHint) -> Self {
        Self { id, role }
    }
}

impl std::fmt::Display for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}:{}", self.id, self.role.role_name())
    }
}

/// Which screen the external responder should present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    /// An expert writes an answer to a question
    ProduceAnswer,
    /// A judge picks an answer or asks subquestions
    Adjudicate,
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProduceAnswer => write!(f, "produce_answer"),
            Self::Adjudicate => write!(f, "adjudicate"),
        }
    }
}

/// A subquestion together with its recursively resolved answer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubAnswer {
    pub question: String,
    pub answer: String,
}

/// Payload shown to a participant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prompt {
    ProduceAnswer {
        question: String,
        /// Present for the malicious expert so it can stay consistent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        honest_answer: Option<String>,
    },
    Adjudicate {
        question: String,
        honest_answer: String,
        malicious_answer: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        prior_sub_qa: Vec<SubAnswer>,
    },
}

impl Prompt {
    pub fn question(&self) -> &str {
        match self {
            Self::ProduceAnswer { question, .. } | Self::Adjudicate { question, .. } => question,
        }
    }
}

/// What a participant sent back. Exactly one per interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    Decompose { subquestions: Vec<String> },
    Verdict { chose_first: bool },
    Answer { text: String },
}

impl Response {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decompose { .. } => "decompose",
            Self::Verdict { .. } => "verdict",
            Self::Answer { .. } => "answer",
        }
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decompose { subquestions } => {
                write!(f, "decompose({} subquestions)", subquestions.len())
            }
            Self::Verdict { chose_first: true } => write!(f, "verdict(first)"),
            Self::Verdict { chose_first: false } => write!(f, "verdict(second)"),
            Self::Answer { text } => write!(f, "answer({:?})", text),
        }
    }
}

/// Message handled by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "snake_case")]
pub enum SchedulerMessage {
    /// Who fills this role
    Allocate { hint: RoleHint },
    /// The participant started an interaction
    UserWorking { participant: Participant },
    /// The participant finished judging a workspace
    UserWorkedOn {
        participant: Participant,
        workspace: String,
    },
}

impl SchedulerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Allocate { .. } => "allocate",
            Self::UserWorking { .. } => "user_working",
            Self::UserWorkedOn { .. } => "user_worked_on",
        }
    }

    /// State-update messages that need no reply
    pub fn is_notification(&self) -> bool {
        !matches!(self, Self::Allocate { .. })
    }

    pub fn participant_id(&self) -> Option<ParticipantId> {
        match self {
            Self::Allocate { .. } => None,
            Self::UserWorking { participant } | Self::UserWorkedOn { participant, .. } => {
                Some(participant.id)
            }
        }
    }
}

/// Scheduler answer to a non-async request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum SchedulerReply {
    Allocated { participant: Participant },
    Ack,
}

/// One entry of the append-only interaction log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    InteractRequest {
        participant: Participant,
        template: Template,
        payload: Prompt,
    },
    InteractResponse {
        request_index: LogIndex,
        response: Response,
    },
    SchedulerRequest {
        #[serde(rename = "async")]
        is_async: bool,
        message: SchedulerMessage,
    },
    SchedulerResponse {
        request_index: LogIndex,
        response: SchedulerReply,
    },
    /// The agent source produced a fresh participant
    ParticipantAllocated {
        participant: ParticipantId,
        role_hint: RoleHint,
    },
}

impl LogEntry {
    /// Get the entry kind as a string
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InteractRequest { .. } => "interact_request",
            Self::InteractResponse { .. } => "interact_response",
            Self::SchedulerRequest { .. } => "scheduler_request",
            Self::SchedulerResponse { .. } => "scheduler_response",
            Self::ParticipantAllocated { .. } => "participant_allocated",
        }
    }

    /// Index of the request this entry answers, for response entries
    pub fn request_index(&self) -> Option<LogIndex> {
        match self {
            Self::InteractResponse { request_index, .. }
            | Self::SchedulerResponse { request_index, .. } => Some(*request_index),
            _ => None,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Self::InteractRequest { .. } | Self::SchedulerRequest { .. }
        )
    }

    /// Requests that must eventually get exactly one response
    pub fn awaits_response(&self) -> bool {
        match self {
            Self::InteractRequest { .. } => true,
            Self::SchedulerRequest { is_async, .. } => !is_async,
            _ => false,
        }
    }

    /// Participant the entry is about, if any
    pub fn participant_id(&self) -> Option<ParticipantId> {
        match self {
            Self::InteractRequest { participant, .. } => Some(participant.id),
            Self::SchedulerRequest { message, .. } => message.participant_id(),
            Self::SchedulerResponse {
                response: SchedulerReply::Allocated { participant },
                ..
            } => Some(participant.id),
            Self::ParticipantAllocated { participant, .. } => Some(*participant),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serialization() {
        let entry = LogEntry::SchedulerRequest {
            is_async: true,
            message: SchedulerMessage::UserWorking {
                participant: Participant::new(
                    2,
                    RoleHint::Judge {
                        workspace: "root".to_string(),
                    },
                ),
            },
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"type\":\"scheduler_request\""));
        assert!(json.contains("\"async\":true"));

        let parsed: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_entry_accessors() {
        let request = LogEntry::InteractRequest {
            participant: Participant::new(0, RoleHint::Honest),
            template: Template::ProduceAnswer,
            payload: Prompt::ProduceAnswer {
                question: "Q".to_string(),
                honest_answer: None,
            },
        };
        assert!(request.is_request());
        assert!(request.awaits_response());
        assert_eq!(request.participant_id(), Some(0));
        assert_eq!(request.request_index(), None);

        let notification = LogEntry::SchedulerRequest {
            is_async: true,
            message: SchedulerMessage::UserWorking {
                participant: Participant::new(1, RoleHint::Malicious),
            },
        };
        assert!(notification.is_request());
        assert!(!notification.awaits_response());

        let response = LogEntry::InteractResponse {
            request_index: 4,
            response: Response::Answer {
                text: "42".to_string(),
            },
        };
        assert_eq!(response.request_index(), Some(4));
        assert_eq!(response.kind(), "interact_response");
    }

    #[test]
    fn test_role_hint_contention() {
        assert!(!RoleHint::Honest.is_contended());
        assert!(!RoleHint::Malicious.is_contended());

        let judge = RoleHint::Judge {
            workspace: "root.subquestions[0]".to_string(),
        };
        assert!(judge.is_contended());
        assert_eq!(judge.workspace(), Some("root.subquestions[0]"));
        assert_eq!(judge.to_string(), "judge(root.subquestions[0])");
    }

    #[test]
    fn test_response_display() {
        assert_eq!(
            Response::Decompose {
                subquestions: vec!["a".to_string(), "b".to_string()]
            }
            .to_string(),
            "decompose(2 subquestions)"
        );
        assert_eq!(
            Response::Verdict { chose_first: false }.to_string(),
            "verdict(second)"
        );
    }

    #[test]
    fn test_prompt_omits_empty_fields() {
        let prompt = Prompt::Adjudicate {
            question: "Q".to_string(),
            honest_answer: "a".to_string(),
            malicious_answer: "b".to_string(),
            prior_sub_qa: Vec::new(),
        };
        let json = serde_json::to_string(&prompt).unwrap();
        assert!(!json.contains("prior_sub_qa"));
        assert_eq!(prompt.question(), "Q");
    }
}
