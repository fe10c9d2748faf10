//! Log statistics and replay-prefix helpers

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::types::{LogEntry, LogIndex, Response};

/// Aggregate statistics for a captured log
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LogStats {
    pub total_entries: usize,
    pub entries_by_kind: BTreeMap<String, usize>,
    /// Completed participant interactions
    pub interactions: usize,
    pub scheduler_requests: usize,
    pub async_notifications: usize,
    pub participants_allocated: usize,
    /// Requests still awaiting their response
    pub pending_requests: Vec<LogIndex>,
}

impl LogStats {
    pub fn from_entries(entries: &[LogEntry]) -> Self {
        let mut stats = Self::default();
        let mut awaiting = BTreeSet::new();

        for (index, entry) in entries.iter().enumerate() {
            stats.total_entries += 1;
            *stats
                .entries_by_kind
                .entry(entry.kind().to_string())
                .or_insert(0) += 1;

            if entry.awaits_response() {
                awaiting.insert(index);
            }
            if let Some(request_index) = entry.request_index() {
                awaiting.remove(&request_index);
            }

            match entry {
                LogEntry::InteractResponse { .. } => stats.interactions += 1,
                LogEntry::SchedulerRequest { is_async, .. } => {
                    stats.scheduler_requests += 1;
                    if *is_async {
                        stats.async_notifications += 1;
                    }
                }
                LogEntry::ParticipantAllocated { .. } => stats.participants_allocated += 1,
                _ => {}
            }
        }

        stats.pending_requests = awaiting.into_iter().collect();
        stats
    }

    pub fn count(&self, kind: &str) -> usize {
        self.entries_by_kind.get(kind).copied().unwrap_or(0)
    }
}

/// Recorded participant responses, in log order
pub fn interaction_responses(entries: &[LogEntry]) -> Vec<Response> {
    entries
        .iter()
        .filter_map(|entry| match entry {
            LogEntry::InteractResponse { response, .. } => Some(response.clone()),
            _ => None,
        })
        .collect()
}

/// Cut a captured log right after its `count`-th interaction response.
///
/// Feeding the result to a `ReplayResponder` reproduces the first `count`
/// interactions of the captured run. Returns the whole log when it holds
/// fewer responses.
pub fn prefix_with_responses(entries: &[LogEntry], count: usize) -> Vec<LogEntry> {
    if count == 0 {
        return Vec::new();
    }

    let mut seen = 0;
    for (index, entry) in entries.iter().enumerate() {
        if matches!(entry, LogEntry::InteractResponse { .. }) {
            seen += 1;
            if seen == count {
                return entries[..=index].to_vec();
            }
        }
    }
    entries.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::{
        Participant, Prompt, RoleHint, SchedulerMessage, SchedulerReply, Template,
    };

    fn sample_log() -> Vec<LogEntry> {
        let honest = Participant::new(0, RoleHint::Honest);
        vec![
            LogEntry::SchedulerRequest {
                is_async: false,
                message: SchedulerMessage::Allocate {
                    hint: RoleHint::Honest,
                },
            },
            LogEntry::ParticipantAllocated {
                participant: 0,
                role_hint: RoleHint::Honest,
            },
            LogEntry::SchedulerResponse {
                request_index: 0,
                response: SchedulerReply::Allocated {
                    participant: honest.clone(),
                },
            },
            LogEntry::InteractRequest {
                participant: honest.clone(),
                template: Template::ProduceAnswer,
                payload: Prompt::ProduceAnswer {
                    question: "Q".to_string(),
                    honest_answer: None,
                },
            },
            LogEntry::InteractResponse {
                request_index: 3,
                response: Response::Answer {
                    text: "first".to_string(),
                },
            },
            LogEntry::SchedulerRequest {
                is_async: true,
                message: SchedulerMessage::UserWorking {
                    participant: honest.clone(),
                },
            },
            LogEntry::InteractRequest {
                participant: honest,
                template: Template::ProduceAnswer,
                payload: Prompt::ProduceAnswer {
                    question: "Q2".to_string(),
                    honest_answer: None,
                },
            },
            LogEntry::InteractResponse {
                request_index: 6,
                response: Response::Answer {
                    text: "second".to_string(),
                },
            },
        ]
    }

    #[test]
    fn test_log_stats() {
        let stats = LogStats::from_entries(&sample_log());

        assert_eq!(stats.total_entries, 8);
        assert_eq!(stats.interactions, 2);
        assert_eq!(stats.scheduler_requests, 2);
        assert_eq!(stats.async_notifications, 1);
        assert_eq!(stats.participants_allocated, 1);
        assert_eq!(stats.count("interact_request"), 2);
        assert_eq!(stats.count("missing"), 0);
        assert!(stats.pending_requests.is_empty());
    }

    #[test]
    fn test_pending_requests() {
        let log = sample_log();
        let stats = LogStats::from_entries(&log[..7]);
        assert_eq!(stats.pending_requests, vec![6]);
    }

    #[test]
    fn test_prefix_with_responses() {
        let log = sample_log();

        let prefix = prefix_with_responses(&log, 1);
        assert_eq!(prefix.len(), 5);
        assert_eq!(
            interaction_responses(&prefix),
            vec![Response::Answer {
                text: "first".to_string()
            }]
        );

        assert!(prefix_with_responses(&log, 0).is_empty());
        assert_eq!(prefix_with_responses(&log, 10).len(), log.len());
    }
}
