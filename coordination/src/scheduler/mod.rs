//! Judge scheduler - decides who fills each role
//!
//! Expert roles are delegated straight to the external agent source. The
//! judge role is contended: a fresh participant is tried first and, when
//! the source is exhausted, a previously allocated judge is reused.
//!
//! # Reuse policy
//!
//! ```text
//! weight(judge) = -inf   judge is currently working
//!                 +inf   judge already worked this exact workspace
//!                 score  otherwise (pluggable `ReuseScorer`)
//!
//! max weight -inf  →  park the request on the wait chain (LIFO) while
//!                     some judge is working, otherwise fail
//! ```
//!
//! A `UserWorkedOn` notification frees its judge and, if a request is
//! parked, hands the judge to the newest one without weighing again. A
//! handed-off judge stays unavailable, so no other request can pick it up
//! before the waiter resumes.

pub mod scoring;
pub mod state;
pub mod wait_chain;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{AllocationError, DebateError, DebateResult};
use crate::events::{
    LogEntry, Participant, ParticipantId, RoleHint, SchedulerMessage, SchedulerReply,
    SharedInteractionLog,
};

pub use scoring::{ConstantScorer, ReuseScorer};
pub use state::{JudgeSelection, SchedulerState};
pub use wait_chain::WaitChain;

/// Source of fresh participants (connected humans, spawned agents)
#[async_trait]
pub trait AgentSource: Send + Sync {
    /// Produce a new participant for the role, or fail when none is left
    async fn acquire(&self, hint: &RoleHint) -> Result<Participant, AllocationError>;
}

/// Fixed-size pool handing out ids `0..capacity` in order
#[derive(Debug)]
pub struct PoolAgentSource {
    capacity: usize,
    next_id: AtomicUsize,
}

impl PoolAgentSource {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Participants handed out so far
    pub fn issued(&self) -> usize {
        self.next_id.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentSource for PoolAgentSource {
    async fn acquire(&self, hint: &RoleHint) -> Result<Participant, AllocationError> {
        let capacity = self.capacity;
        self.next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                (next < capacity).then_some(next + 1)
            })
            .map(|id| Participant::new(id, hint.clone()))
            .map_err(|_| AllocationError::PoolExhausted { capacity })
    }
}

/// Shared reference to Scheduler
pub type SharedScheduler = Arc<Scheduler>;

/// Resource allocator for one protocol run
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    agents: Arc<dyn AgentSource>,
    scorer: Arc<dyn ReuseScorer>,
    log: SharedInteractionLog,
}

impl Scheduler {
    /// Create a scheduler with the placeholder reuse scorer
    pub fn new(agents: Arc<dyn AgentSource>, log: SharedInteractionLog) -> Self {
        Self {
            state: Mutex::new(SchedulerState::new()),
            agents,
            scorer: Arc::new(ConstantScorer::default()),
            log,
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn ReuseScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Create a shared reference to this scheduler
    pub fn shared(self) -> SharedScheduler {
        Arc::new(self)
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle a message that expects a reply
    pub async fn handle(&self, message: SchedulerMessage) -> DebateResult<SchedulerReply> {
        match message {
            SchedulerMessage::Allocate { hint } => {
                let participant = self.allocate(hint).await?;
                Ok(SchedulerReply::Allocated { participant })
            }
            notification => {
                self.notify(notification)?;
                Ok(SchedulerReply::Ack)
            }
        }
    }

    /// Apply a state-update notification
    pub fn notify(&self, message: SchedulerMessage) -> DebateResult<()> {
        match message {
            SchedulerMessage::UserWorking { participant } => {
                debug!(participant = %participant, "Participant working");
                self.lock().mark_working(participant.id);
                Ok(())
            }
            SchedulerMessage::UserWorkedOn {
                participant,
                workspace,
            } => {
                let mut state = self.lock();
                let new_workspace = state.mark_worked_on(participant.id, &workspace);
                debug!(
                    participant = %participant,
                    workspace = %workspace,
                    new_workspace,
                    "Participant finished workspace"
                );

                if !state.wait_chain().is_empty() {
                    let id = participant.id;
                    if state.wait_chain_mut().hand_off(participant).is_none() {
                        // Busy from the moment of hand-off, before the waiter resumes
                        state.mark_working(id);
                        info!(
                            participant = id,
                            still_waiting = state.wait_chain().len(),
                            "Freed judge handed to waiting request"
                        );
                    }
                }
                Ok(())
            }
            SchedulerMessage::Allocate { .. } => Err(DebateError::NotANotification("allocate")),
        }
    }

    async fn allocate(&self, hint: RoleHint) -> DebateResult<Participant> {
        let workspace = match &hint {
            RoleHint::Judge { workspace } => workspace.clone(),
            _ => {
                let participant = self.agents.acquire(&hint).await?;
                self.record_fresh(&participant);
                return Ok(participant);
            }
        };

        let exhausted = match self.agents.acquire(&hint).await {
            Ok(judge) => {
                self.lock().register_judge(judge.clone());
                self.record_fresh(&judge);
                return Ok(judge);
            }
            Err(e) => e,
        };
        debug!(workspace = %workspace, reason = %exhausted, "No fresh judge, weighing reuse");

        let parked = {
            let mut state = self.lock();
            match state.select_judge(&workspace, self.scorer.as_ref()) {
                JudgeSelection::Reuse(judge) => {
                    info!(participant = %judge, workspace = %workspace, "Reusing judge");
                    return Ok(judge);
                }
                JudgeSelection::Empty => {
                    warn!(workspace = %workspace, "No judge to reuse");
                    return Err(AllocationError::NoJudgeToReuse.into());
                }
                JudgeSelection::AllBusy => state.wait_chain_mut().register(),
            }
        };

        info!(workspace = %workspace, "All judges busy, waiting for one to free up");
        let judge = parked.await.map_err(|_| DebateError::WaitAbandoned)?;
        info!(participant = %judge, workspace = %workspace, "Judge handed off");
        Ok(judge)
    }

    fn record_fresh(&self, participant: &Participant) {
        info!(participant = %participant, "Participant allocated");
        self.log.append(LogEntry::ParticipantAllocated {
            participant: participant.id,
            role_hint: participant.role.clone(),
        });
    }

    /// Judges in allocation order
    pub fn judges(&self) -> Vec<Participant> {
        self.lock().judges().to_vec()
    }

    pub fn is_available(&self, participant: ParticipantId) -> bool {
        self.lock().is_available(participant)
    }

    pub fn worked_on(&self, participant: ParticipantId) -> BTreeSet<String> {
        self.lock()
            .worked_on(participant)
            .cloned()
            .unwrap_or_default()
    }

    /// Requests currently parked on the wait chain
    pub fn waiting(&self) -> usize {
        self.lock().wait_chain().len()
    }
}
