//! Reuse scoring for judges that have not seen the requested workspace.
//!
//! Unavailable judges and judges that already worked the requested path are
//! weighted by the scheduler itself (-inf and +inf). Everything in between
//! is delegated to a `ReuseScorer`. The intended scorer is a distance
//! between the requested workspace and the ones the judge already
//! evaluated, so judges are kept away from closely related questions; that
//! metric is not defined yet and the default scorer is a constant.

use std::collections::BTreeSet;

use crate::events::Participant;

/// Weight of an available judge for a workspace it has not worked on
pub trait ReuseScorer: Send + Sync {
    fn score(&self, judge: &Participant, worked_on: &BTreeSet<String>, workspace: &str) -> f64;
}

/// Placeholder scorer: every eligible judge weighs the same, so allocation
/// order decides. Incomplete by design of the current policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantScorer(pub f64);

impl Default for ConstantScorer {
    fn default() -> Self {
        Self(1.0)
    }
}

impl ReuseScorer for ConstantScorer {
    fn score(&self, _judge: &Participant, _worked_on: &BTreeSet<String>, _workspace: &str) -> f64 {
        self.0
    }
}

impl<F> ReuseScorer for F
where
    F: Fn(&Participant, &BTreeSet<String>, &str) -> f64 + Send + Sync,
{
    fn score(&self, judge: &Participant, worked_on: &BTreeSet<String>, workspace: &str) -> f64 {
        self(judge, worked_on, workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RoleHint;

    #[test]
    fn test_constant_scorer_ignores_history() {
        let judge = Participant::new(0, RoleHint::Honest);
        let history: BTreeSet<String> = ["root".to_string()].into_iter().collect();
        let scorer = ConstantScorer::default();

        assert_eq!(scorer.score(&judge, &history, "root.subquestions[0]"), 1.0);
        assert_eq!(scorer.score(&judge, &BTreeSet::new(), "other"), 1.0);
    }

    #[test]
    fn test_closure_scorer() {
        let scorer = |judge: &Participant, worked_on: &BTreeSet<String>, _: &str| {
            judge.id as f64 - worked_on.len() as f64
        };
        let judge = Participant::new(4, RoleHint::Honest);
        let history: BTreeSet<String> = ["a".to_string(), "b".to_string()].into_iter().collect();

        assert_eq!(scorer.score(&judge, &history, "c"), 2.0);
    }
}
