//! External responders - whoever answers participant interactions.
//!
//! The engine only sees the `Responder` trait. Two in-process
//! implementations ship with the crate:
//!
//! - `ScriptedResponder`: deterministic answers for simulations and tests
//! - `ChannelResponder`: forwards each interaction as a ticket over a
//!   channel so an out-of-band driver (a UI adapter, a test harness) can
//!   answer it whenever it likes

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{DebateError, DebateResult};
use crate::events::{LogIndex, Participant, Prompt, Response, Template};

/// Answers an interaction. Must eventually resolve or the run stalls.
#[async_trait]
pub trait Responder: Send + Sync {
    /// `log_index` is the position of the request entry. It is exposed for
    /// out-of-band correlation only; replay matches on template and payload.
    async fn respond(
        &self,
        participant: &Participant,
        template: Template,
        log_index: LogIndex,
        payload: &Prompt,
    ) -> DebateResult<Response>;
}

/// How a scripted judge rules once its script queue is empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JudgePolicy {
    /// Always send this response
    Always(Response),
    /// On a first visit, split questions shallower than `depth` into
    /// `fan_out` subquestions named `<question>/<k>`; otherwise rule.
    /// Depth counts the `/` separators in the question.
    DecomposeUntil {
        depth: usize,
        fan_out: usize,
        chose_first: bool,
    },
}

impl JudgePolicy {
    fn rule(&self, payload: &Prompt) -> Response {
        match self {
            Self::Always(response) => response.clone(),
            Self::DecomposeUntil {
                depth,
                fan_out,
                chose_first,
            } => {
                let (question, first_visit) = match payload {
                    Prompt::Adjudicate {
                        question,
                        prior_sub_qa,
                        ..
                    } => (question.as_str(), prior_sub_qa.is_empty()),
                    other => (other.question(), true),
                };

                if first_visit && *fan_out > 0 && question.matches('/').count() < *depth {
                    Response::Decompose {
                        subquestions: (0..*fan_out)
                            .map(|k| format!("{}/{}", question, k))
                            .collect(),
                    }
                } else {
                    Response::Verdict {
                        chose_first: *chose_first,
                    }
                }
            }
        }
    }
}

/// Expert behaviour override: participant and question in, response out
pub type ExpertFn = Arc<dyn Fn(&Participant, &str) -> Response + Send + Sync>;

/// Deterministic responder
///
/// Experts answer `"<role> answer to <question>"` unless overridden.
/// Judges pop the script queue first and fall back to the policy.
pub struct ScriptedResponder {
    judge_script: Mutex<VecDeque<Response>>,
    judge_policy: JudgePolicy,
    expert: Option<ExpertFn>,
    calls: AtomicUsize,
}

impl ScriptedResponder {
    pub fn new(judge_policy: JudgePolicy) -> Self {
        Self {
            judge_script: Mutex::new(VecDeque::new()),
            judge_policy,
            expert: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Judges always rule for the given side
    pub fn always_verdict(chose_first: bool) -> Self {
        Self::new(JudgePolicy::Always(Response::Verdict { chose_first }))
    }

    /// Judge responses consumed in call order before the policy applies
    pub fn with_judge_script(self, script: Vec<Response>) -> Self {
        *self
            .judge_script
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = script.into();
        self
    }

    pub fn with_expert(mut self, expert: ExpertFn) -> Self {
        self.expert = Some(expert);
        self
    }

    /// Interactions answered so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn expert_response(&self, participant: &Participant, question: &str) -> Response {
        match &self.expert {
            Some(expert) => expert(participant, question),
            None => Response::Answer {
                text: format!("{} answer to {}", participant.role.role_name(), question),
            },
        }
    }

    fn judge_response(&self, payload: &Prompt) -> Response {
        let scripted = self
            .judge_script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        scripted.unwrap_or_else(|| self.judge_policy.rule(payload))
    }
}

#[async_trait]
impl Responder for ScriptedResponder {
    async fn respond(
        &self,
        participant: &Participant,
        template: Template,
        log_index: LogIndex,
        payload: &Prompt,
    ) -> DebateResult<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = match template {
            Template::ProduceAnswer => self.expert_response(participant, payload.question()),
            Template::Adjudicate => self.judge_response(payload),
        };
        debug!(log_index, participant = %participant, %response, "Scripted response");
        Ok(response)
    }
}

/// One interaction waiting for an out-of-band answer
#[derive(Debug)]
pub struct InteractionTicket {
    pub participant: Participant,
    pub template: Template,
    pub log_index: LogIndex,
    pub payload: Prompt,
    reply: oneshot::Sender<Response>,
}

impl InteractionTicket {
    /// Answer the interaction. Returns false when the run is gone.
    pub fn reply(self, response: Response) -> bool {
        self.reply.send(response).is_ok()
    }
}

/// Responder that hands every interaction to a channel consumer
#[derive(Clone)]
pub struct ChannelResponder {
    sender: mpsc::UnboundedSender<InteractionTicket>,
}

impl ChannelResponder {
    /// Create the responder and the ticket stream it feeds
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<InteractionTicket>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Responder for ChannelResponder {
    async fn respond(
        &self,
        participant: &Participant,
        template: Template,
        log_index: LogIndex,
        payload: &Prompt,
    ) -> DebateResult<Response> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(InteractionTicket {
                participant: participant.clone(),
                template,
                log_index,
                payload: payload.clone(),
                reply,
            })
            .map_err(|_| DebateError::Responder("ticket consumer is gone".to_string()))?;

        response.await.map_err(|_| {
            DebateError::Responder(format!("ticket {} dropped without a reply", log_index))
        })
    }
}
