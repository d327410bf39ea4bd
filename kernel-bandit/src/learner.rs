//! Per-category arm selection across the whole learner (spec §5
//! "multi-arm learner"): one bandit pull per [`Category`], independently
//! seeded, recorded together as a single decision.

use std::collections::HashMap;

use kernel_types::{Arm, ArmKey, ArmStats, Category, ContextKey, OutcomeRecord, RichOutcome};

use crate::bandit::{select_arm, BanditAlgorithm};
use crate::error::BanditError;
use crate::store::OutcomeStore;

/// The set of arms pulled for one decision, one per category that had
/// candidates offered.
#[derive(Debug, Clone)]
pub struct MultiArmSelection {
    arms: HashMap<Category, ArmKey>,
    /// The context this selection was made under.
    pub context_key: ContextKey,
    /// The seed the selection was made with, for reproducing it.
    pub seed: u64,
}

impl MultiArmSelection {
    /// The arm selected for `category`, if that category had candidates.
    #[must_use]
    pub fn get(&self, category: Category) -> Option<&ArmKey> {
        self.arms.get(&category)
    }

    /// Every `(category, arm)` pair in this selection.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &ArmKey)> {
        self.arms.iter().map(|(c, a)| (*c, a))
    }
}

/// A catalog of the arms available per category, supplied by the caller —
/// the learner has no opinion on what concrete arms exist, only on how to
/// choose among whichever ones it's offered.
pub type ArmCatalog = HashMap<Category, Vec<Arm>>;

/// Selects and records outcomes for one arm per [`Category`], backed by an
/// [`OutcomeStore`].
pub struct MultiArmLearner {
    store: OutcomeStore,
    algorithm: BanditAlgorithm,
}

impl MultiArmLearner {
    /// Build a learner over `store`, using `algorithm` for every category.
    #[must_use]
    pub fn new(store: OutcomeStore, algorithm: BanditAlgorithm) -> Self {
        Self { store, algorithm }
    }

    /// Select one arm per category present in `catalog`. Each category is
    /// seeded with `seed + category_index` so categories don't draw
    /// correlated samples from an identical seed.
    ///
    /// # Errors
    ///
    /// Returns [`BanditError::Store`] if outcome history cannot be read.
    pub fn select(
        &self,
        context_key: &ContextKey,
        seed: u64,
        catalog: &ArmCatalog,
    ) -> Result<MultiArmSelection, BanditError> {
        let history = self.store.summary(context_key)?;
        let mut arms = HashMap::new();

        for (i, category) in Category::ALL.into_iter().enumerate() {
            let Some(available) = catalog.get(&category) else { continue };
            if available.is_empty() {
                continue;
            }
            let candidates: Vec<ArmKey> = available.iter().map(Arm::key).collect();
            let stats: Vec<(ArmKey, ArmStats)> = history
                .iter()
                .filter(|(arm, _)| candidates.contains(arm))
                .cloned()
                .collect();
            let category_seed = seed.wrapping_add(i as u64);
            let chosen = select_arm(&candidates, &stats, self.algorithm, category_seed);
            arms.insert(category, chosen);
        }

        Ok(MultiArmSelection { arms, context_key: context_key.clone(), seed })
    }

    /// Record a scalar reward against every arm in `selection`.
    ///
    /// # Errors
    ///
    /// Returns [`BanditError::Store`] on a write failure.
    pub fn record(
        &self,
        ts_utc: &str,
        selection: &MultiArmSelection,
        reward: f64,
        success: bool,
    ) -> Result<(), BanditError> {
        for (_, arm) in selection.iter() {
            let record = OutcomeRecord::new(selection.context_key.clone(), arm.clone(), reward, success);
            self.store.record(ts_utc, &record)?;
        }
        Ok(())
    }

    /// Record a rich outcome (with duration and structured detail) against
    /// every arm in `selection`.
    ///
    /// # Errors
    ///
    /// Returns [`BanditError::Store`] on a write failure.
    pub fn record_rich(
        &self,
        ts_utc: &str,
        selection: &MultiArmSelection,
        reward: f64,
        success: bool,
        duration_ms: u64,
        detail: serde_json::Value,
    ) -> Result<(), BanditError> {
        for (_, arm) in selection.iter() {
            let record = OutcomeRecord::new(selection.context_key.clone(), arm.clone(), reward, success);
            let rich = RichOutcome { record, duration_ms, detail: detail.clone() };
            self.store.record_rich(ts_utc, &rich)?;
        }
        Ok(())
    }

    /// The current statistics for every arm in `catalog`, including arms
    /// that have never been pulled under this context (`n = 0`).
    ///
    /// # Errors
    ///
    /// Returns [`BanditError::Store`] if outcome history cannot be read.
    pub fn stats(
        &self,
        context_key: &ContextKey,
        catalog: &ArmCatalog,
    ) -> Result<HashMap<Category, Vec<(ArmKey, ArmStats)>>, BanditError> {
        let history = self.store.summary(context_key)?;
        let mut out = HashMap::new();

        for category in Category::ALL {
            let Some(available) = catalog.get(&category) else { continue };
            let stats = available
                .iter()
                .map(|arm| {
                    let key = arm.key();
                    let stat = history
                        .iter()
                        .find(|(k, _)| *k == key)
                        .map_or_else(ArmStats::default, |(_, s)| *s);
                    (key, stat)
                })
                .collect();
            out.insert(category, stats);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ArmCatalog {
        let mut catalog = ArmCatalog::new();
        catalog.insert(
            Category::Plan,
            vec![Arm::new(Category::Plan, "direct"), Arm::new(Category::Plan, "decompose")],
        );
        catalog.insert(
            Category::Model,
            vec![Arm::new(Category::Model, "fast"), Arm::new(Category::Model, "careful")],
        );
        catalog
    }

    #[test]
    fn select_returns_one_arm_per_catalog_category() {
        let learner = MultiArmLearner::new(OutcomeStore::open_in_memory().unwrap(), BanditAlgorithm::Thompson);
        let selection = learner.select(&ContextKey::new("repo::rust"), 1, &catalog()).unwrap();
        assert!(selection.get(Category::Plan).is_some());
        assert!(selection.get(Category::Model).is_some());
        assert!(selection.get(Category::Search).is_none());
    }

    #[test]
    fn record_then_select_converges_toward_a_better_arm() {
        let learner = MultiArmLearner::new(OutcomeStore::open_in_memory().unwrap(), BanditAlgorithm::Ucb1);
        let ctx = ContextKey::new("repo::rust");
        let catalog = catalog();

        for _ in 0..30 {
            let selection = learner.select(&ctx, 0, &catalog).unwrap();
            let direct_chosen = selection.get(Category::Plan) == Some(&ArmKey::new("plan::direct"));
            let reward = if direct_chosen { 0.9 } else { 0.1 };
            learner.record("2026-01-01T00:00:00Z", &selection, reward, reward > 0.5).unwrap();
        }

        let stats = learner.stats(&ctx, &catalog).unwrap();
        let plan_stats = &stats[&Category::Plan];
        let direct = plan_stats.iter().find(|(k, _)| k.as_str() == "plan::direct").unwrap();
        let decompose = plan_stats.iter().find(|(k, _)| k.as_str() == "plan::decompose").unwrap();
        assert!(direct.1.mean > decompose.1.mean);
    }

    #[test]
    fn record_rich_preserves_duration_and_detail() {
        let learner = MultiArmLearner::new(OutcomeStore::open_in_memory().unwrap(), BanditAlgorithm::Thompson);
        let ctx = ContextKey::new("repo::rust");
        let selection = learner.select(&ctx, 0, &catalog()).unwrap();
        learner
            .record_rich(
                "2026-01-01T00:00:00Z",
                &selection,
                0.8,
                true,
                1500,
                serde_json::json!({"tool_calls": 3}),
            )
            .unwrap();

        let recent = learner.store.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|o| o.duration_ms == 1500));
    }
}
