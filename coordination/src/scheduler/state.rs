//! Scheduler state: the judge pool, availability, and work history.

use std::collections::{BTreeSet, HashMap};

use crate::events::{Participant, ParticipantId};

use super::scoring::ReuseScorer;
use super::wait_chain::WaitChain;

/// Outcome of weighing the judge pool for a workspace
#[derive(Debug, Clone, PartialEq)]
pub enum JudgeSelection {
    /// Highest-weighted available judge
    Reuse(Participant),
    /// Every eligible judge is working; one will be freed by `UserWorkedOn`
    AllBusy,
    /// No judge can ever be handed out: none was allocated, or the scorer
    /// excluded every judge and none is working
    Empty,
}

/// Mutable state of one scheduler, created fresh per run
#[derive(Debug, Default)]
pub struct SchedulerState {
    /// Judges in allocation order
    judges: Vec<Participant>,
    worked_on: HashMap<ParticipantId, BTreeSet<String>>,
    available: HashMap<ParticipantId, bool>,
    wait_chain: WaitChain,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly allocated judge to the reuse pool
    pub fn register_judge(&mut self, judge: Participant) {
        self.available.insert(judge.id, true);
        self.judges.push(judge);
    }

    pub fn mark_working(&mut self, participant: ParticipantId) {
        self.available.insert(participant, false);
    }

    /// Mark available again and record the workspace. Returns whether the
    /// workspace was new to this participant's history.
    pub fn mark_worked_on(&mut self, participant: ParticipantId, workspace: &str) -> bool {
        self.available.insert(participant, true);
        self.worked_on
            .entry(participant)
            .or_default()
            .insert(workspace.to_string())
    }

    /// Participants the scheduler has never heard of count as available
    pub fn is_available(&self, participant: ParticipantId) -> bool {
        self.available.get(&participant).copied().unwrap_or(true)
    }

    pub fn worked_on(&self, participant: ParticipantId) -> Option<&BTreeSet<String>> {
        self.worked_on.get(&participant)
    }

    pub fn judges(&self) -> &[Participant] {
        &self.judges
    }

    pub fn wait_chain(&self) -> &WaitChain {
        &self.wait_chain
    }

    pub fn wait_chain_mut(&mut self) -> &mut WaitChain {
        &mut self.wait_chain
    }

    /// Reuse weight of a judge for a workspace
    pub fn judge_weight(
        &self,
        judge: &Participant,
        workspace: &str,
        scorer: &dyn ReuseScorer,
    ) -> f64 {
        if !self.is_available(judge.id) {
            return f64::NEG_INFINITY;
        }

        match self.worked_on.get(&judge.id) {
            Some(history) if history.contains(workspace) => f64::INFINITY,
            Some(history) => scorer.score(judge, history, workspace),
            None => scorer.score(judge, &BTreeSet::new(), workspace),
        }
    }

    /// Pick the judge with the maximum weight; ties go to the earliest
    /// allocated judge.
    pub fn select_judge(&self, workspace: &str, scorer: &dyn ReuseScorer) -> JudgeSelection {

        let mut best: Option<(&Participant, f64)> = None;
        for judge in &self.judges {
            let weight = self.judge_weight(judge, workspace, scorer);
            // NaN never wins
            let better = match best {
                None => weight > f64::NEG_INFINITY,
                Some((_, best_weight)) => weight > best_weight,
            };
            if better {
                best = Some((judge, weight));
            }
        }

        match best {
            Some((judge, _)) => JudgeSelection::Reuse(judge.clone()),
            None if self.judges.iter().any(|j| !self.is_available(j.id)) => {
                JudgeSelection::AllBusy
            }
            None => JudgeSelection::Empty,
        }
    }
}
