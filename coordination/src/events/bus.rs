//! Log bus for live observers
//!
//! Every entry appended to the interaction log is broadcast with its
//! index over a Tokio broadcast channel. Observers (UI highlighting,
//! tracing sinks, tests) subscribe; publishing never fails when nobody
//! listens.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::types::{LogEntry, LogIndex, ParticipantId};

/// Channel capacity for broadcast
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// A log entry together with its position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub index: LogIndex,
    pub entry: LogEntry,
}

/// Broadcast fan-out of appended log entries
pub struct LogBus {
    sender: broadcast::Sender<IndexedEntry>,
}

impl LogBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    /// Create a bus whose slow subscribers lag after `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an appended entry, returning how many subscribers saw it
    pub fn publish(&self, index: LogIndex, entry: &LogEntry) -> usize {
        if !self.has_subscribers() {
            return 0;
        }

        let kind = entry.kind();
        match self.sender.send(IndexedEntry {
            index,
            entry: entry.clone(),
        }) {
            Ok(count) => {
                debug!(index, kind, receivers = count, "Log entry published");
                count
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexedEntry> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter
    pub fn subscribe_filtered(&self, filter: EntryFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for LogBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry filter for selective subscription
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Filter by entry kind (e.g. "interact_request")
    pub kinds: Option<Vec<String>>,
    /// Filter by participant
    pub participant: Option<ParticipantId>,
}

impl EntryFilter {
    /// Create a new empty filter (matches all entries)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(mut self, kinds: Vec<&str>) -> Self {
        self.kinds = Some(kinds.into_iter().map(String::from).collect());
        self
    }

    pub fn participant(mut self, participant: ParticipantId) -> Self {
        self.participant = Some(participant);
        self
    }

    /// Check if an entry matches this filter
    pub fn matches(&self, indexed: &IndexedEntry) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.iter().any(|k| k == indexed.entry.kind()) {
                return false;
            }
        }

        if let Some(participant) = self.participant {
            if indexed.entry.participant_id() != Some(participant) {
                return false;
            }
        }

        true
    }
}

/// Receiver that only yields entries matching its filter
pub struct FilteredReceiver {
    receiver: broadcast::Receiver<IndexedEntry>,
    filter: EntryFilter,
}

impl FilteredReceiver {
    pub fn new(receiver: broadcast::Receiver<IndexedEntry>, filter: EntryFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next matching entry
    pub async fn recv(&mut self) -> Result<IndexedEntry, broadcast::error::RecvError> {
        loop {
            let indexed = self.receiver.recv().await?;
            if self.filter.matches(&indexed) {
                return Ok(indexed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::{Participant, Prompt, Response, RoleHint, Template};

    fn request(participant: ParticipantId) -> LogEntry {
        LogEntry::InteractRequest {
            participant: Participant::new(participant, RoleHint::Honest),
            template: Template::ProduceAnswer,
            payload: Prompt::ProduceAnswer {
                question: "Q".to_string(),
                honest_answer: None,
            },
        }
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = LogBus::new();
        let mut receiver = bus.subscribe();

        assert_eq!(bus.publish(0, &request(0)), 1);

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.index, 0);
        assert_eq!(received.entry.kind(), "interact_request");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = LogBus::with_capacity(4);
        assert!(!bus.has_subscribers());
        assert_eq!(bus.publish(0, &request(0)), 0);
    }

    #[test]
    fn test_entry_filter() {
        let filter = EntryFilter::new()
            .kinds(vec!["interact_request"])
            .participant(3);

        let matching = IndexedEntry {
            index: 0,
            entry: request(3),
        };
        let other_participant = IndexedEntry {
            index: 1,
            entry: request(4),
        };
        let other_kind = IndexedEntry {
            index: 2,
            entry: LogEntry::InteractResponse {
                request_index: 0,
                response: Response::Verdict { chose_first: true },
            },
        };

        assert!(filter.matches(&matching));
        assert!(!filter.matches(&other_participant));
        assert!(!filter.matches(&other_kind));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let bus = LogBus::new();
        let mut filtered = bus.subscribe_filtered(EntryFilter::new().participant(7));

        bus.publish(0, &request(1));
        bus.publish(1, &request(7));

        let indexed = filtered.recv().await.unwrap();
        assert_eq!(indexed.index, 1);
        assert_eq!(indexed.entry.participant_id(), Some(7));
    }
}
