//! Workspace tree - phases, transitions, and append-only child addressing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DebateError, DebateResult};
use crate::events::{ParticipantId, SubAnswer};

/// Phase of one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkspacePhase {
    /// Created, experts not yet judged.
    Opened,
    /// A judge has been requested or is ruling.
    Adjudicating,
    /// The judge split the question; children are being answered.
    Decomposed,
    /// Final answer set.
    Resolved,
    /// The branch failed.
    Aborted,
}

impl WorkspacePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Aborted)
    }

    /// Valid transitions from this phase.
    pub fn valid_transitions(self) -> &'static [WorkspacePhase] {
        match self {
            Self::Opened => &[Self::Adjudicating, Self::Aborted],
            Self::Adjudicating => &[Self::Decomposed, Self::Resolved, Self::Aborted],
            Self::Decomposed => &[Self::Adjudicating, Self::Aborted],
            Self::Resolved | Self::Aborted => &[],
        }
    }
}

impl std::fmt::Display for WorkspacePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::Adjudicating => write!(f, "adjudicating"),
            Self::Decomposed => write!(f, "decomposed"),
            Self::Resolved => write!(f, "resolved"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// A phase transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceTransition {
    pub from: WorkspacePhase,
    pub to: WorkspacePhase,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Error for invalid workspace transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition for {path}: {from} → {to}")]
pub struct TransitionError {
    pub path: String,
    pub from: WorkspacePhase,
    pub to: WorkspacePhase,
}

/// One node of the adjudication tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub path: String,
    pub question: String,
    /// Distance from the root workspace.
    pub depth: usize,
    pub parent: Option<String>,
    pub honest_answer: Option<String>,
    pub malicious_answer: Option<String>,
    /// Most recent judge assigned to this workspace.
    pub judge: Option<ParticipantId>,
    /// Child paths in creation order, accumulated across visits.
    pub children: Vec<String>,
    /// Answered subquestions fed back to the judge.
    pub sub_answers: Vec<SubAnswer>,
    pub final_answer: Option<String>,
    pub phase: WorkspacePhase,
    pub transitions: Vec<WorkspaceTransition>,
    pub opened_at: DateTime<Utc>,
}

impl WorkspaceRecord {
    fn new(path: String, question: String, depth: usize, parent: Option<String>) -> Self {
        Self {
            path,
            question,
            depth,
            parent,
            honest_answer: None,
            malicious_answer: None,
            judge: None,
            children: Vec::new(),
            sub_answers: Vec::new(),
            final_answer: None,
            phase: WorkspacePhase::Opened,
            transitions: Vec::new(),
            opened_at: Utc::now(),
        }
    }

    /// Number of times a judge was requested for this workspace.
    pub fn visits(&self) -> usize {
        self.transitions
            .iter()
            .filter(|t| t.to == WorkspacePhase::Adjudicating)
            .count()
    }

    fn transition(&mut self, to: WorkspacePhase, reason: &str) -> Result<(), TransitionError> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(TransitionError {
                path: self.path.clone(),
                from: self.phase,
                to,
            });
        }

        self.transitions.push(WorkspaceTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.phase = to;
        Ok(())
    }
}

/// Path of the `index`-th child of `parent`.
pub fn child_path(parent: &str, index: usize) -> String {
    format!("{}.subquestions[{}]", parent, index)
}

/// All workspaces of one run, keyed by path.
///
/// Child indices continue from the parent's current child count, so a path
/// is never issued twice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceArena {
    records: BTreeMap<String, WorkspaceRecord>,
    /// Paths in creation order.
    order: Vec<String>,
}

impl WorkspaceArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, record: WorkspaceRecord) -> DebateResult<()> {
        if self.records.contains_key(&record.path) {
            return Err(DebateError::DuplicateWorkspace(record.path));
        }
        self.order.push(record.path.clone());
        self.records.insert(record.path.clone(), record);
        Ok(())
    }

    fn record_mut(&mut self, path: &str) -> DebateResult<&mut WorkspaceRecord> {
        self.records
            .get_mut(path)
            .ok_or_else(|| DebateError::UnknownWorkspace(path.to_string()))
    }

    pub fn open_root(&mut self, path: &str, question: &str) -> DebateResult<()> {
        self.insert(WorkspaceRecord::new(
            path.to_string(),
            question.to_string(),
            0,
            None,
        ))
    }

    /// Open one child per question under `parent`, returning their paths
    /// in question order.
    pub fn open_children(&mut self, parent: &str, questions: &[String]) -> DebateResult<Vec<String>> {
        let (first_index, depth) = {
            let record = self.record_mut(parent)?;
            (record.children.len(), record.depth + 1)
        };

        let paths: Vec<String> = (0..questions.len())
            .map(|k| child_path(parent, first_index + k))
            .collect();
        for (path, question) in paths.iter().zip(questions) {
            self.insert(WorkspaceRecord::new(
                path.clone(),
                question.clone(),
                depth,
                Some(parent.to_string()),
            ))?;
        }

        self.record_mut(parent)?.children.extend(paths.iter().cloned());
        Ok(paths)
    }

    pub fn record_answers(&mut self, path: &str, honest: &str, malicious: &str) -> DebateResult<()> {
        let record = self.record_mut(path)?;
        record.honest_answer = Some(honest.to_string());
        record.malicious_answer = Some(malicious.to_string());
        Ok(())
    }

    pub fn assign_judge(&mut self, path: &str, judge: ParticipantId) -> DebateResult<()> {
        self.record_mut(path)?.judge = Some(judge);
        Ok(())
    }

    pub fn record_sub_answers(&mut self, path: &str, answers: &[SubAnswer]) -> DebateResult<()> {
        self.record_mut(path)?
            .sub_answers
            .extend(answers.iter().cloned());
        Ok(())
    }

    pub fn transition(&mut self, path: &str, to: WorkspacePhase, reason: &str) -> DebateResult<()> {
        self.record_mut(path)?.transition(to, reason)?;
        Ok(())
    }

    /// Set the final answer. A workspace resolves at most once.
    pub fn resolve(&mut self, path: &str, answer: &str) -> DebateResult<()> {
        let record = self.record_mut(path)?;
        if record.final_answer.is_some() {
            return Err(DebateError::AlreadyResolved(path.to_string()));
        }
        record.transition(WorkspacePhase::Resolved, "verdict")?;
        record.final_answer = Some(answer.to_string());
        Ok(())
    }

    /// Mark a failed branch. Terminal workspaces are left alone; returns
    /// whether the workspace was aborted by this call.
    pub fn abort(&mut self, path: &str, reason: &str) -> bool {
        match self.records.get_mut(path) {
            Some(record) if !record.phase.is_terminal() => {
                record.transition(WorkspacePhase::Aborted, reason).is_ok()
            }
            _ => false,
        }
    }

    pub fn get(&self, path: &str) -> Option<&WorkspaceRecord> {
        self.records.get(path)
    }

    /// Paths in creation order.
    pub fn paths(&self) -> &[String] {
        &self.order
    }

    pub fn records(&self) -> impl Iterator<Item = &WorkspaceRecord> {
        self.order.iter().filter_map(|path| self.records.get(path))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
