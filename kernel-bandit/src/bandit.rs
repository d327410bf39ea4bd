//! Single-category arm selection (spec §5): given a list of candidate arms
//! and their running statistics, pick one to pull next.
//!
//! Three strategies are provided. [`select_arm`] dispatches between them by
//! [`BanditAlgorithm`] so a caller can swap strategies per category without
//! touching call sites.

use kernel_types::{ArmKey, ArmStats};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Which selection strategy to use for a category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BanditAlgorithm {
    /// Sample a Gaussian posterior per arm and pick the highest draw.
    Thompson,
    /// Upper-confidence-bound selection (UCB1).
    Ucb1,
    /// Explore uniformly at random with probability `epsilon`, otherwise
    /// exploit the highest-mean arm.
    EpsilonGreedy(f64),
}

fn stat_for(stats: &[(ArmKey, ArmStats)], arm: &ArmKey) -> ArmStats {
    stats
        .iter()
        .find(|(key, _)| key == arm)
        .map(|(_, s)| *s)
        .unwrap_or_default()
}

/// Thompson sampling: each arm's posterior is `Normal(mean, 1/sqrt(max(1,n)))`,
/// so arms with few pulls have a wide, exploration-friendly spread and arms
/// with many pulls converge toward their observed mean.
///
/// # Panics
///
/// Panics if `candidates` is empty.
#[must_use]
pub fn thompson_select(candidates: &[ArmKey], stats: &[(ArmKey, ArmStats)], seed: u64) -> ArmKey {
    let mut rng = StdRng::seed_from_u64(seed);
    candidates
        .iter()
        .map(|arm| {
            let s = stat_for(stats, arm);
            let sigma = 1.0 / (f64::from(s.n.max(1))).sqrt();
            let draw = Normal::new(s.mean, sigma)
                .expect("sigma is always positive")
                .sample(&mut rng);
            (arm, draw)
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(arm, _)| arm.clone())
        .expect("candidates must not be empty")
}

/// UCB1: arms that have never been pulled are selected before any scoring
/// happens, so every candidate gets at least one pull; afterward each arm's
/// score is `mean + sqrt(2 * ln(total_pulls) / n)`.
///
/// # Panics
///
/// Panics if `candidates` is empty.
#[must_use]
pub fn ucb_select(candidates: &[ArmKey], stats: &[(ArmKey, ArmStats)]) -> ArmKey {
    if let Some(unvisited) = candidates.iter().find(|arm| stat_for(stats, arm).n == 0) {
        return unvisited.clone();
    }
    let total_pulls: u32 = candidates.iter().map(|arm| stat_for(stats, arm).n).sum();
    let ln_total = f64::from(total_pulls.max(1)).ln();
    candidates
        .iter()
        .map(|arm| {
            let s = stat_for(stats, arm);
            let bonus = (2.0 * ln_total / f64::from(s.n)).sqrt();
            (arm, s.mean + bonus)
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(arm, _)| arm.clone())
        .expect("candidates must not be empty")
}

/// Epsilon-greedy: explore a uniformly random candidate with probability
/// `epsilon`, otherwise exploit the highest observed mean.
///
/// # Panics
///
/// Panics if `candidates` is empty.
#[must_use]
pub fn epsilon_greedy_select(
    candidates: &[ArmKey],
    stats: &[(ArmKey, ArmStats)],
    epsilon: f64,
    seed: u64,
) -> ArmKey {
    let mut rng = StdRng::seed_from_u64(seed);
    if rng.r#gen::<f64>() < epsilon {
        let idx = rng.gen_range(0..candidates.len());
        return candidates[idx].clone();
    }
    candidates
        .iter()
        .map(|arm| (arm, stat_for(stats, arm).mean))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(arm, _)| arm.clone())
        .expect("candidates must not be empty")
}

/// Dispatch to the selection strategy named by `algorithm`.
///
/// # Panics
///
/// Panics if `candidates` is empty.
#[must_use]
pub fn select_arm(
    candidates: &[ArmKey],
    stats: &[(ArmKey, ArmStats)],
    algorithm: BanditAlgorithm,
    seed: u64,
) -> ArmKey {
    match algorithm {
        BanditAlgorithm::Thompson => thompson_select(candidates, stats, seed),
        BanditAlgorithm::Ucb1 => ucb_select(candidates, stats),
        BanditAlgorithm::EpsilonGreedy(epsilon) => {
            epsilon_greedy_select(candidates, stats, epsilon, seed)
        }
    }
}

/// Estimated cumulative regret of the pulls recorded in `stats`: the gap
/// between each arm's mean and the best observed mean, weighted by how many
/// times that arm was actually pulled.
#[must_use]
pub fn estimate_regret(stats: &[(ArmKey, ArmStats)]) -> f64 {
    if stats.is_empty() {
        return 0.0;
    }
    let best_mean = stats.iter().map(|(_, s)| s.mean).fold(f64::MIN, f64::max);
    stats
        .iter()
        .map(|(_, s)| (best_mean - s.mean) * f64::from(s.n))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arm(name: &str) -> ArmKey {
        ArmKey::new(name)
    }

    fn stats(n: u32, mean: f64) -> ArmStats {
        ArmStats { n, mean, m2: 0.0 }
    }

    #[test]
    fn thompson_select_picks_from_candidates() {
        let candidates = [arm("a"), arm("b")];
        let picked = thompson_select(&candidates, &[], 7);
        assert!(candidates.contains(&picked));
    }

    #[test]
    fn thompson_select_is_deterministic_given_a_seed() {
        let candidates = [arm("a"), arm("b"), arm("c")];
        let stats = [(arm("a"), stats(5, 0.3)), (arm("b"), stats(5, 0.6))];
        let first = thompson_select(&candidates, &stats, 42);
        let second = thompson_select(&candidates, &stats, 42);
        assert_eq!(first, second);
    }

    #[test]
    fn thompson_select_exploits_a_clearly_better_arm_over_many_trials() {
        let candidates = [arm("good"), arm("bad")];
        let stats = [(arm("good"), stats(200, 0.95)), (arm("bad"), stats(200, 0.05))];
        let wins = (0..20)
            .filter(|&seed| thompson_select(&candidates, &stats, seed) == arm("good"))
            .count();
        assert!(wins > 10, "expected the better arm to win most draws, got {wins}/20");
    }

    #[test]
    fn ucb_select_explores_unvisited_arms_before_scoring() {
        let candidates = [arm("visited"), arm("new")];
        let stats = [(arm("visited"), stats(10, 0.5))];
        assert_eq!(ucb_select(&candidates, &stats), arm("new"));
    }

    #[test]
    fn ucb_select_favors_higher_mean_at_equal_pulls() {
        let candidates = [arm("low"), arm("high")];
        let stats = [(arm("low"), stats(10, 0.2)), (arm("high"), stats(10, 0.8))];
        assert_eq!(ucb_select(&candidates, &stats), arm("high"));
    }

    #[test]
    fn epsilon_zero_always_exploits_the_best_arm() {
        let candidates = [arm("best"), arm("other")];
        let stats = [(arm("best"), stats(10, 0.9)), (arm("other"), stats(10, 0.1))];
        for seed in 0..20 {
            assert_eq!(epsilon_greedy_select(&candidates, &stats, 0.0, seed), arm("best"));
        }
    }

    #[test]
    fn epsilon_one_always_explores() {
        let candidates = [arm("best"), arm("other")];
        let stats = [(arm("best"), stats(10, 0.9)), (arm("other"), stats(10, 0.1))];
        let saw_other = (0..20)
            .any(|seed| epsilon_greedy_select(&candidates, &stats, 1.0, seed) == arm("other"));
        assert!(saw_other);
    }

    #[test]
    fn select_arm_dispatches_by_algorithm() {
        let candidates = [arm("a"), arm("b")];
        let stats = [(arm("a"), stats(10, 0.9)), (arm("b"), stats(10, 0.1))];
        assert_eq!(
            select_arm(&candidates, &stats, BanditAlgorithm::Ucb1, 0),
            ucb_select(&candidates, &stats)
        );
        assert_eq!(
            select_arm(&candidates, &stats, BanditAlgorithm::EpsilonGreedy(0.0), 3),
            arm("a")
        );
    }

    #[test]
    fn regret_is_zero_when_only_the_best_arm_has_been_pulled() {
        let stats = [(arm("best"), stats(50, 0.9))];
        assert_eq!(estimate_regret(&stats), 0.0);
    }

    #[test]
    fn regret_grows_with_a_dominant_suboptimal_arm() {
        let stats = [(arm("best"), stats(1, 0.9)), (arm("worse"), stats(90, 0.1))];
        assert!((estimate_regret(&stats) - 72.0).abs() < 1e-9);
    }
}
