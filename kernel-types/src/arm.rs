//! Learnable arms: the discrete choices the bandit learner selects between
//! within each category (spec §5).

use crate::id::ArmKey;
use serde::{Deserialize, Serialize};

/// A family of interchangeable choices the learner selects among
/// independently of the other categories (spec §5 "category").
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Which planning strategy to use for a goal.
    Plan,
    /// Which prompt template to compose for the reasoner.
    Prompt,
    /// Which retrieval strategy to use when gathering context.
    Retrieval,
    /// Which search depth/breadth setting to use for `search_first` plans.
    Search,
    /// Which test subset to run before accepting a patch.
    Test,
    /// Which underlying reasoner model to route a turn to.
    Model,
}

impl Category {
    /// All categories the learner tracks, in a stable order.
    pub const ALL: [Category; 6] = [
        Category::Plan,
        Category::Prompt,
        Category::Retrieval,
        Category::Search,
        Category::Test,
        Category::Model,
    ];

    /// This category's name, as used in the `category::name` arm key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Plan => "plan",
            Category::Prompt => "prompt",
            Category::Retrieval => "retrieval",
            Category::Search => "search",
            Category::Test => "test",
            Category::Model => "model",
        }
    }
}

/// One concrete, selectable choice within a [`Category`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arm {
    /// The category this arm belongs to.
    pub category: Category,
    /// The arm's name, unique within its category.
    pub name: String,
}

impl Arm {
    /// Construct a new arm.
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }

    /// The namespaced `category::name` key used to look up stats.
    #[must_use]
    pub fn key(&self) -> ArmKey {
        ArmKey::new(format!("{}::{}", self.category.as_str(), self.name))
    }
}

/// Running sufficient statistics for one arm, used by Thompson sampling and
/// UCB1 without re-querying the outcome store's full history.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ArmStats {
    /// Number of times this arm has been pulled.
    pub n: u32,
    /// Running mean reward.
    pub mean: f64,
    /// Running sum of squared deviations from the mean (Welford's method),
    /// for variance-aware sampling if a future strategy needs it.
    pub m2: f64,
}

impl ArmStats {
    /// Fold one new reward observation into the running statistics.
    pub fn update(&mut self, reward: f64) {
        self.n += 1;
        let delta = reward - self.mean;
        self.mean += delta / f64::from(self.n);
        let delta2 = reward - self.mean;
        self.m2 += delta * delta2;
    }

    /// Sample variance, or `0.0` if fewer than two observations exist.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.n < 2 {
            0.0
        } else {
            self.m2 / f64::from(self.n - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_key_namespaces_by_category() {
        let arm = Arm::new(Category::Plan, "decompose");
        assert_eq!(arm.key().as_str(), "plan::decompose");
    }

    #[test]
    fn arm_stats_update_tracks_running_mean() {
        let mut stats = ArmStats::default();
        stats.update(1.0);
        stats.update(0.0);
        assert_eq!(stats.n, 2);
        assert!((stats.mean - 0.5).abs() < 1e-9);
    }

    #[test]
    fn variance_is_zero_with_fewer_than_two_samples() {
        let mut stats = ArmStats::default();
        assert_eq!(stats.variance(), 0.0);
        stats.update(1.0);
        assert_eq!(stats.variance(), 0.0);
    }

    #[test]
    fn category_as_str_covers_all_variants() {
        for category in Category::ALL {
            assert!(!category.as_str().is_empty());
        }
    }
}
