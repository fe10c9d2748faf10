//! State projection sinks - write-only mirrors of workspace state.
//!
//! Keys are `<workspace path>.<field>`, e.g. `root.subquestions[0].answer`.
//! The engine never reads back what it writes.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tracing::trace;

/// Sink for workspace observability writes
pub trait StateProjection: Send + Sync {
    fn write(&self, key: &str, value: Value);
}

/// Discards every write
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProjection;

impl StateProjection for NoopProjection {
    fn write(&self, key: &str, _value: Value) {
        trace!(key, "Projection write dropped");
    }
}

/// Keeps the latest value per key
#[derive(Debug, Default)]
pub struct InMemoryProjection {
    values: Mutex<BTreeMap<String, Value>>,
}

impl InMemoryProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Keys written under a workspace path, including nested children
    pub fn keys_under(&self, path: &str) -> Vec<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|key| key.starts_with(path))
            .cloned()
            .collect()
    }
}

impl StateProjection for InMemoryProjection {
    fn write(&self, key: &str, value: Value) {
        trace!(key, "Projection write");
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_latest_value_wins() {
        let projection = InMemoryProjection::new();
        projection.write("root.question", json!("Q"));
        projection.write("root.answer", json!("first"));
        projection.write("root.answer", json!("second"));

        assert_eq!(projection.get("root.answer"), Some(json!("second")));
        assert_eq!(projection.snapshot().len(), 2);
        assert_eq!(projection.get("root.missing"), None);
    }

    #[test]
    fn test_keys_under() {
        let projection = InMemoryProjection::new();
        projection.write("root.question", json!("Q"));
        projection.write("root.subquestions[0].question", json!("a"));
        projection.write("other.question", json!("b"));

        assert_eq!(
            projection.keys_under("root.subquestions[0]"),
            vec!["root.subquestions[0].question".to_string()]
        );
        assert_eq!(projection.keys_under("root").len(), 2);
    }

    #[test]
    fn test_noop_accepts_writes() {
        let projection: &dyn StateProjection = &NoopProjection;
        projection.write("root.answer", json!("42"));
    }
}
