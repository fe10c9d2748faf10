//! Recursive adjudication built from the runner's primitives.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::json;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::DebateConfig;
use crate::error::{DebateError, DebateResult};
use crate::events::{
    InteractionLog, LogBus, LogEntry, Participant, Prompt, Response, RoleHint, SchedulerMessage,
    SharedInteractionLog, SubAnswer, Template,
};
use crate::responders::Responder;
use crate::runner::InteractionRunner;
use crate::scheduler::{PoolAgentSource, Scheduler, SharedScheduler};

use super::projection::{NoopProjection, StateProjection};
use super::workspace::{WorkspaceArena, WorkspacePhase};

/// The two experts of a run. Every workspace reuses them.
#[derive(Debug, Clone)]
struct Experts {
    honest: Participant,
    malicious: Participant,
}

/// Competing answers to one workspace question.
#[derive(Debug, Clone)]
struct ExpertAnswers {
    honest: String,
    malicious: String,
}

/// One debate run over a topic question
pub struct DebateProtocol {
    run_id: Uuid,
    runner: InteractionRunner,
    projection: Arc<dyn StateProjection>,
    workspaces: Mutex<WorkspaceArena>,
    config: DebateConfig,
}

impl DebateProtocol {
    pub fn new(
        runner: InteractionRunner,
        projection: Arc<dyn StateProjection>,
        config: DebateConfig,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            runner,
            projection,
            workspaces: Mutex::new(WorkspaceArena::new()),
            config,
        }
    }

    /// Wire a fresh log, a pool-backed scheduler, and the given responder
    pub fn from_config(config: DebateConfig, responder: Arc<dyn Responder>) -> DebateResult<Self> {
        config.validate()?;

        let log = InteractionLog::with_bus(LogBus::with_capacity(config.bus_capacity)).shared();
        let scheduler =
            Scheduler::new(Arc::new(PoolAgentSource::new(config.pool_capacity)), log.clone())
                .shared();
        let runner = InteractionRunner::new(log, scheduler, responder);
        Ok(Self::new(runner, Arc::new(NoopProjection), config))
    }

    pub fn with_projection(mut self, projection: Arc<dyn StateProjection>) -> Self {
        self.projection = projection;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &DebateConfig {
        &self.config
    }

    pub fn log(&self) -> &SharedInteractionLog {
        self.runner.log()
    }

    /// Snapshot of the event log
    pub fn entries(&self) -> Vec<LogEntry> {
        self.runner.log().snapshot()
    }

    pub fn scheduler(&self) -> &SharedScheduler {
        self.runner.scheduler()
    }

    /// Snapshot of the workspace tree
    pub fn workspaces(&self) -> WorkspaceArena {
        self.lock_workspaces().clone()
    }

    fn lock_workspaces(&self) -> MutexGuard<'_, WorkspaceArena> {
        self.workspaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer a topic question, returning the root workspace's final answer
    pub async fn start(&self, topic: &str) -> DebateResult<String> {
        let span = info_span!("debate", run_id = %self.run_id, root = %self.config.root_path);

        async move {
            let root = self.config.root_path.clone();
            self.lock_workspaces().open_root(&root, topic)?;
            info!(topic, "Debate started");

            let honest = self.runner.allocate(RoleHint::Honest).await?;
            let honest_answer = self.ask_expert(&honest, topic, None).await?;
            let malicious = self.runner.allocate(RoleHint::Malicious).await?;
            let malicious_answer = self
                .ask_expert(&malicious, topic, Some(&honest_answer))
                .await?;

            let experts = Experts { honest, malicious };
            let answers = ExpertAnswers {
                honest: honest_answer,
                malicious: malicious_answer,
            };
            let answer = self
                .adjudicate(root, topic.to_string(), &experts, answers)
                .await?;

            info!(answer = %answer, entries = self.runner.log().len(), "Debate resolved");
            Ok(answer)
        }
        .instrument(span)
        .await
    }

    /// Ask an expert for an answer; anything but `Answer` is a violation
    async fn ask_expert(
        &self,
        expert: &Participant,
        question: &str,
        honest_answer: Option<&str>,
    ) -> DebateResult<String> {
        let payload = Prompt::ProduceAnswer {
            question: question.to_string(),
            honest_answer: honest_answer.map(str::to_string),
        };

        match self
            .runner
            .interact(expert, Template::ProduceAnswer, payload)
            .await?
        {
            Response::Answer { text } => Ok(text),
            other => {
                warn!(participant = %expert, response = %other, "Expert sent a non-answer");
                Err(DebateError::ProtocolViolation(other))
            }
        }
    }

    /// Adjudicate a workspace until its judge rules. Failed branches are
    /// marked aborted before the error propagates.
    fn adjudicate<'a>(
        &'a self,
        path: String,
        question: String,
        experts: &'a Experts,
        answers: ExpertAnswers,
    ) -> BoxFuture<'a, DebateResult<String>> {
        async move {
            let result = self
                .run_workspace(&path, &question, experts, &answers)
                .await;
            if let Err(e) = &result {
                if self.lock_workspaces().abort(&path, &e.to_string()) {
                    debug!(workspace = %path, error = %e, "Workspace aborted");
                }
            }
            result
        }
        .boxed()
    }

    async fn run_workspace(
        &self,
        path: &str,
        question: &str,
        experts: &Experts,
        answers: &ExpertAnswers,
    ) -> DebateResult<String> {
        self.lock_workspaces()
            .record_answers(path, &answers.honest, &answers.malicious)?;
        let mut prior_sub_qa: Vec<SubAnswer> = Vec::new();

        // Each decomposition re-adjudicates this same workspace
        loop {
            self.lock_workspaces()
                .transition(path, WorkspacePhase::Adjudicating, "judge requested")?;

            let judge = self
                .runner
                .allocate(RoleHint::Judge {
                    workspace: path.to_string(),
                })
                .await?;
            self.lock_workspaces().assign_judge(path, judge.id)?;
            self.runner
                .send_scheduler_async(SchedulerMessage::UserWorking {
                    participant: judge.clone(),
                })?;

            let payload = Prompt::Adjudicate {
                question: question.to_string(),
                honest_answer: answers.honest.clone(),
                malicious_answer: answers.malicious.clone(),
                prior_sub_qa: prior_sub_qa.clone(),
            };
            let response = self
                .runner
                .interact(&judge, Template::Adjudicate, payload)
                .await?;

            self.runner
                .send_scheduler_async(SchedulerMessage::UserWorkedOn {
                    participant: judge.clone(),
                    workspace: path.to_string(),
                })?;
            self.mirror(path, question, answers);

            match response {
                Response::Verdict { chose_first } => {
                    let answer = if chose_first {
                        answers.honest.clone()
                    } else {
                        answers.malicious.clone()
                    };
                    self.lock_workspaces().resolve(path, &answer)?;
                    self.projection
                        .write(&format!("{}.answer", path), json!(answer));
                    info!(workspace = %path, judge = %judge, chose_first, "Verdict");
                    return Ok(answer);
                }
                Response::Decompose { subquestions } => {
                    info!(
                        workspace = %path,
                        judge = %judge,
                        subquestions = subquestions.len(),
                        "Judge decomposed"
                    );
                    self.lock_workspaces().transition(
                        path,
                        WorkspacePhase::Decomposed,
                        "judge decomposed",
                    )?;

                    let answered = self
                        .answer_subquestions(path, subquestions, experts)
                        .await?;
                    self.lock_workspaces().record_sub_answers(path, &answered)?;
                    prior_sub_qa.extend(answered);
                }
                other => {
                    warn!(workspace = %path, response = %other, "Judge sent an answer");
                    return Err(DebateError::ProtocolViolation(other));
                }
            }
        }
    }

    /// Fan out over the subquestions and collect their answers in order
    async fn answer_subquestions(
        &self,
        parent: &str,
        subquestions: Vec<String>,
        experts: &Experts,
    ) -> DebateResult<Vec<SubAnswer>> {
        let paths = {
            let mut workspaces = self.lock_workspaces();
            if let Some(max_depth) = self.config.max_depth {
                let depth = workspaces
                    .get(parent)
                    .map(|record| record.depth + 1)
                    .ok_or_else(|| DebateError::UnknownWorkspace(parent.to_string()))?;
                if depth > max_depth {
                    return Err(DebateError::DepthExceeded {
                        path: parent.to_string(),
                        max_depth,
                    });
                }
            }
            workspaces.open_children(parent, &subquestions)?
        };

        let branches = paths
            .into_iter()
            .zip(subquestions.iter().cloned())
            .map(|(path, question)| self.answer_subquestion(path, question, experts));
        let answers = try_join_all(branches).await?;

        Ok(subquestions
            .into_iter()
            .zip(answers)
            .map(|(question, answer)| SubAnswer { question, answer })
            .collect())
    }

    async fn answer_subquestion(
        &self,
        path: String,
        question: String,
        experts: &Experts,
    ) -> DebateResult<String> {
        debug!(workspace = %path, question = %question, "Answering subquestion");
        let honest = self.ask_expert(&experts.honest, &question, None).await?;
        let malicious = self
            .ask_expert(&experts.malicious, &question, Some(&honest))
            .await?;

        self.adjudicate(path, question, experts, ExpertAnswers { honest, malicious })
            .await
    }

    fn mirror(&self, path: &str, question: &str, answers: &ExpertAnswers) {
        self.projection
            .write(&format!("{}.question", path), json!(question));
        self.projection
            .write(&format!("{}.honest_answer", path), json!(answers.honest));
        self.projection
            .write(&format!("{}.malicious_answer", path), json!(answers.malicious));
    }
}
