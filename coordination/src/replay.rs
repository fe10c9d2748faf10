//! Replay driver - answers interactions from a captured log before going live.
//!
//! Correlation is by request identity: each recorded `InteractRequest` is
//! paired with the `InteractResponse` that names it, and a later call with
//! the same template and payload receives that response. Sibling branches
//! may issue their interactions in any order, so log position is never
//! used. Identical requests are answered first-recorded first. The
//! participant id is not part of the key since reused judges are numbered
//! by scheduling order; the payload already tells the roles apart.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::DebateResult;
use crate::events::{LogEntry, LogIndex, Participant, Prompt, Response, Template};
use crate::responders::Responder;

type RequestKey = (Template, Prompt);

pub struct ReplayResponder {
    recorded: Mutex<HashMap<RequestKey, VecDeque<Response>>>,
    replayed: AtomicUsize,
    live: Arc<dyn Responder>,
}

impl ReplayResponder {
    pub fn new(recorded: Vec<LogEntry>, live: Arc<dyn Responder>) -> Self {
        Self {
            recorded: Mutex::new(index_responses(&recorded)),
            replayed: AtomicUsize::new(0),
            live,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestKey, VecDeque<Response>>> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_recorded(&self, template: Template, payload: &Prompt) -> Option<Response> {
        let mut recorded = self.lock();
        let key = (template, payload.clone());
        let queue = recorded.get_mut(&key)?;
        let response = queue.pop_front();
        if queue.is_empty() {
            recorded.remove(&key);
        }
        response
    }

    /// Interactions answered from the captured log so far
    pub fn replayed(&self) -> usize {
        self.replayed.load(Ordering::SeqCst)
    }

    /// Recorded responses not yet handed out
    pub fn remaining(&self) -> usize {
        self.lock().values().map(VecDeque::len).sum()
    }

    /// Whether every later call goes to the live responder
    pub fn is_exhausted(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Pair each answered `InteractRequest` with its response, in log order.
/// Requests left unanswered by a truncated log are skipped.
fn index_responses(entries: &[LogEntry]) -> HashMap<RequestKey, VecDeque<Response>> {
    let mut indexed: HashMap<RequestKey, VecDeque<Response>> = HashMap::new();
    for entry in entries {
        let LogEntry::InteractResponse {
            request_index,
            response,
        } = entry
        else {
            continue;
        };
        if let Some(LogEntry::InteractRequest {
            template, payload, ..
        }) = entries.get(*request_index)
        {
            indexed
                .entry((*template, payload.clone()))
                .or_default()
                .push_back(response.clone());
        }
    }
    indexed
}

#[async_trait]
impl Responder for ReplayResponder {
    async fn respond(
        &self,
        participant: &Participant,
        template: Template,
        log_index: LogIndex,
        payload: &Prompt,
    ) -> DebateResult<Response> {
        if let Some(response) = self.take_recorded(template, payload) {
            let replayed = self.replayed.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(log_index, replayed, %response, "Replayed recorded response");
            if self.is_exhausted() {
                info!(replayed, "Replay log exhausted, continuing live");
            }
            return Ok(response);
        }

        debug!(log_index, participant = %participant, "No recorded response, asking live");
        self.live
            .respond(participant, template, log_index, payload)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RoleHint;
    use crate::responders::ScriptedResponder;

    fn produce(question: &str) -> Prompt {
        Prompt::ProduceAnswer {
            question: question.to_string(),
            honest_answer: None,
        }
    }

    fn answer(text: &str) -> Response {
        Response::Answer {
            text: text.to_string(),
        }
    }

    /// Request/response pairs; responses land after all requests, in reverse
    fn recorded(pairs: &[(&str, &str)]) -> Vec<LogEntry> {
        let honest = Participant::new(0, RoleHint::Honest);
        let mut entries: Vec<LogEntry> = pairs
            .iter()
            .map(|(question, _)| LogEntry::InteractRequest {
                participant: honest.clone(),
                template: Template::ProduceAnswer,
                payload: produce(question),
            })
            .collect();
        for (index, (_, text)) in pairs.iter().enumerate().rev() {
            entries.push(LogEntry::InteractResponse {
                request_index: index,
                response: answer(text),
            });
        }
        entries
    }

    async fn ask(responder: &ReplayResponder, question: &str) -> Response {
        // Participant ids are not part of the match
        let honest = Participant::new(7, RoleHint::Honest);
        responder
            .respond(&honest, Template::ProduceAnswer, 0, &produce(question))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_matches_by_request_not_position() {
        let live = Arc::new(ScriptedResponder::always_verdict(true));
        let replay = ReplayResponder::new(recorded(&[("a", "one"), ("b", "two")]), live.clone());
        assert_eq!(replay.remaining(), 2);

        assert_eq!(ask(&replay, "b").await, answer("two"));
        assert_eq!(ask(&replay, "a").await, answer("one"));
        assert!(replay.is_exhausted());
        assert_eq!(live.calls(), 0);

        assert_eq!(ask(&replay, "a").await, answer("honest answer to a"));
        assert_eq!(live.calls(), 1);
        assert_eq!(replay.replayed(), 2);
    }

    #[tokio::test]
    async fn test_identical_requests_replay_in_recorded_order() {
        let live = Arc::new(ScriptedResponder::always_verdict(true));
        let replay = ReplayResponder::new(recorded(&[("a", "first"), ("a", "second")]), live);

        // Responses were appended in reverse, but request order decides
        assert_eq!(ask(&replay, "a").await, answer("first"));
        assert_eq!(ask(&replay, "a").await, answer("second"));
    }

    #[tokio::test]
    async fn test_unknown_request_goes_live_without_consuming() {
        let live = Arc::new(ScriptedResponder::always_verdict(true));
        let replay = ReplayResponder::new(recorded(&[("a", "one")]), live.clone());

        assert_eq!(ask(&replay, "z").await, answer("honest answer to z"));
        assert_eq!(live.calls(), 1);
        assert_eq!(replay.remaining(), 1);
        assert_eq!(ask(&replay, "a").await, answer("one"));
    }

    #[tokio::test]
    async fn test_unanswered_request_is_not_replayed() {
        let mut entries = recorded(&[("a", "one")]);
        entries.push(LogEntry::InteractRequest {
            participant: Participant::new(0, RoleHint::Honest),
            template: Template::ProduceAnswer,
            payload: produce("b"),
        });
        let live = Arc::new(ScriptedResponder::always_verdict(true));
        let replay = ReplayResponder::new(entries, live.clone());

        assert_eq!(replay.remaining(), 1);
        assert_eq!(ask(&replay, "b").await, answer("honest answer to b"));
        assert_eq!(live.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_log_forwards_everything() {
        let live = Arc::new(ScriptedResponder::always_verdict(true));
        let replay = ReplayResponder::new(Vec::new(), live.clone());
        assert!(replay.is_exhausted());

        ask(&replay, "Q").await;
        assert_eq!(live.calls(), 1);
        assert_eq!(replay.replayed(), 0);
    }
}
