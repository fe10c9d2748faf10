//! Correlation invariant of the interaction log across whole runs, and live
//! observation through the log bus.

use std::collections::HashMap;
use std::sync::Arc;

use debate_coordination::events::{EntryFilter, LogIndex};
use debate_coordination::{
    DebateConfig, DebateProtocol, JudgePolicy, LogEntry, LogStats, Response, ScriptedResponder,
};

/// Check every request/response pairing directly against the entries
fn assert_correlated(entries: &[LogEntry]) {
    let mut answered: HashMap<LogIndex, usize> = HashMap::new();

    for (index, entry) in entries.iter().enumerate() {
        if let Some(request_index) = entry.request_index() {
            assert!(request_index < index, "response {} precedes its request", index);
            assert!(entries[request_index].awaits_response());
            *answered.entry(request_index).or_default() += 1;
        }
    }

    for (index, entry) in entries.iter().enumerate() {
        let responses = answered.get(&index).copied().unwrap_or(0);
        if entry.awaits_response() {
            assert_eq!(responses, 1, "request {} has {} responses", index, responses);
        } else {
            assert_eq!(responses, 0, "entry {} should have no response", index);
        }
    }
}

async fn run(responder: ScriptedResponder, capacity: usize) -> DebateProtocol {
    let config = DebateConfig::default().with_pool_capacity(capacity);
    let protocol = DebateProtocol::from_config(config, Arc::new(responder)).unwrap();
    protocol.start("Q").await.unwrap();
    protocol
}

#[tokio::test]
async fn test_invariant_holds_for_flat_and_nested_runs() {
    let flat = run(ScriptedResponder::always_verdict(true), 16).await;
    let nested = run(
        ScriptedResponder::new(JudgePolicy::DecomposeUntil {
            depth: 2,
            fan_out: 3,
            chose_first: true,
        }),
        16,
    )
    .await;
    let reused = run(
        ScriptedResponder::always_verdict(false).with_judge_script(vec![Response::Decompose {
            subquestions: vec!["a".to_string(), "b".to_string()],
        }]),
        3,
    )
    .await;

    for protocol in [&flat, &nested, &reused] {
        let entries = protocol.entries();
        assert_correlated(&entries);
        assert!(protocol.log().validate().is_empty());
        assert!(LogStats::from_entries(&entries).pending_requests.is_empty());
    }
}

#[tokio::test]
async fn test_async_notifications_bracket_each_judge_interaction() {
    let protocol = run(ScriptedResponder::always_verdict(true), 16).await;
    let stats = LogStats::from_entries(&protocol.entries());

    assert_eq!(stats.interactions, 3);
    assert_eq!(stats.participants_allocated, 3);
    // judge working + judge worked on
    assert_eq!(stats.async_notifications, 2);
    // three allocations
    assert_eq!(stats.count("scheduler_response"), 3);
}

#[tokio::test]
async fn test_bus_observes_every_append_in_order() {
    let protocol = DebateProtocol::from_config(
        DebateConfig::default(),
        Arc::new(ScriptedResponder::always_verdict(true)),
    )
    .unwrap();
    let mut all = protocol.log().subscribe();
    let mut allocations = protocol
        .log()
        .subscribe_filtered(EntryFilter::new().kinds(vec!["participant_allocated"]));

    protocol.start("Q").await.unwrap();
    let entries = protocol.entries();

    for (index, entry) in entries.iter().enumerate() {
        let observed = all.recv().await.unwrap();
        assert_eq!(observed.index, index);
        assert_eq!(&observed.entry, entry);
    }

    let mut allocated = Vec::new();
    for _ in 0..3 {
        allocated.push(allocations.recv().await.unwrap().entry);
    }
    assert!(allocated
        .iter()
        .all(|entry| matches!(entry, LogEntry::ParticipantAllocated { .. })));
}
