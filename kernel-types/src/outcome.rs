//! Records of what happened after a bandit arm was pulled, persisted by
//! the outcome store and fed back into arm selection (spec §5).

use crate::id::{ArmKey, ContextKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The minimal signal every arm pull produces: did it work, and how
/// expensive was it, in the currency this category uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Aggregation key (e.g. `repo:lang:task_family`).
    pub context_key: ContextKey,
    /// The arm that was pulled.
    pub arm: ArmKey,
    /// Scalar reward in `[0.0, 1.0]`, higher is better.
    pub reward: f64,
    /// Cost incurred to obtain this reward (tokens, dollars, seconds — category-defined).
    pub cost: Decimal,
    /// Whether the pull counts as a success for binary success-rate reporting.
    pub success: bool,
}

impl OutcomeRecord {
    /// Construct a record with zero cost.
    pub fn new(context_key: ContextKey, arm: ArmKey, reward: f64, success: bool) -> Self {
        Self {
            context_key,
            arm,
            reward,
            cost: Decimal::ZERO,
            success,
        }
    }

    /// Attach a cost, builder-style.
    #[must_use]
    pub fn with_cost(mut self, cost: Decimal) -> Self {
        self.cost = cost;
        self
    }
}

/// An [`OutcomeRecord`] enriched with the raw signals it was derived from,
/// for outcomes worth auditing after the fact (spec §5 "rich outcome").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RichOutcome {
    /// The scalar record, as stored and used for arm selection.
    pub record: OutcomeRecord,
    /// Wall-clock duration of the pull, in milliseconds.
    pub duration_ms: u64,
    /// Free-form structured detail (test output, diff stats, error text).
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl RichOutcome {
    /// Wrap a scalar record with no extra detail.
    #[must_use]
    pub fn from_record(record: OutcomeRecord, duration_ms: u64) -> Self {
        Self {
            record,
            duration_ms,
            detail: serde_json::Value::Null,
        }
    }
}

/// A summary of an arm's historical performance under one context, as
/// returned by the outcome store for selection and for the learning curve
/// view (spec §5 "arm performance").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArmPerformance {
    /// Number of pulls recorded.
    pub pulls: u32,
    /// Mean reward across all recorded pulls.
    pub mean_reward: f64,
    /// Fraction of pulls marked `success`.
    pub success_rate: f64,
}

impl ArmPerformance {
    /// The performance of an arm that has never been pulled.
    #[must_use]
    pub fn unseen() -> Self {
        Self {
            pulls: 0,
            mean_reward: 0.0,
            success_rate: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_cost_overrides_default_zero_cost() {
        let record = OutcomeRecord::new(
            ContextKey::new("repo:rust:bugfix"),
            ArmKey::new("plan::decompose"),
            0.8,
            true,
        )
        .with_cost(Decimal::new(150, 2));
        assert_eq!(record.cost, Decimal::new(150, 2));
    }

    #[test]
    fn unseen_performance_has_zero_pulls_and_rates() {
        let perf = ArmPerformance::unseen();
        assert_eq!(perf.pulls, 0);
        assert_eq!(perf.mean_reward, 0.0);
        assert_eq!(perf.success_rate, 0.0);
    }
}
