//! Scalar reward computation from plan outcomes (spec §4.J "Reward"),
//! the signal the bandit learner updates its arm statistics from.

use crate::result::PlanResult;

/// Compute `[-1, 1]` reward from a completed plan: success weighted 0.7,
/// completion rate weighted 0.6, minus a bounded per-failed-step penalty.
#[must_use]
pub fn reward_from_plan_result(result: &PlanResult) -> f64 {
    let base = if result.success { 1.0 } else { 0.0 };
    let partial = result.completion_rate();
    let penalty = (0.15 * f64::from(result.failed_steps)).min(1.0);

    (base * 0.7 + partial * 0.6 - penalty).clamp(-1.0, 1.0)
}

/// Alternative reward computation from raw step counts, for callers that
/// never built a full [`PlanResult`] (e.g. the turn loop's own tool-call
/// tally). Denials cost less than execution failures — they waste a
/// proposal but the reasoner can usually self-correct immediately.
#[must_use]
pub fn reward_from_step_outcomes(completed: u32, failed: u32, denied: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = f64::from(total);
    let completion_rate = f64::from(completed) / total;
    let failure_rate = f64::from(failed) / total;
    let denial_rate = f64::from(denied) / total;

    (completion_rate - 0.5 * failure_rate - 0.1 * denial_rate).clamp(-1.0, 1.0)
}

/// Baseline/patched test counts feeding the test-delta reward component.
#[derive(Debug, Clone, Copy)]
pub struct TestDelta {
    /// Passing tests before the patch.
    pub baseline_passed: u32,
    /// Failing tests before the patch.
    pub baseline_failed: u32,
    /// Passing tests after the patch.
    pub patched_passed: u32,
    /// Failing tests after the patch.
    pub patched_failed: u32,
}

/// Reward from a before/after test run (spec §4.J "Test delta"): `1` if
/// everything passes after a prior failure, a bounded penalty if tests
/// regressed, partial credit scaled by how many previously-failing tests
/// got fixed, otherwise `0`.
#[must_use]
pub fn reward_from_test_delta(delta: TestDelta) -> f64 {
    let patched_total = delta.patched_passed + delta.patched_failed;
    if patched_total > 0 && delta.patched_failed == 0 && delta.baseline_failed > 0 {
        return 1.0;
    }

    let broken = delta.patched_failed.saturating_sub(delta.baseline_failed);
    if broken > 0 {
        let total = patched_total.max(1);
        return -0.5 - 0.5 * (f64::from(broken) / f64::from(total));
    }

    if delta.baseline_failed > 0 {
        let fixed = delta.baseline_failed.saturating_sub(delta.patched_failed);
        return 0.5 * (f64::from(fixed) / f64::from(delta.baseline_failed));
    }

    0.0
}

/// Combine a plan-level reward and a test-delta reward with the original's
/// fixed weighting (`controller/reward/combine.py`): plan 0.4, test 0.6.
#[must_use]
pub fn combine_plan_and_test_reward(plan_reward: f64, test_reward: f64) -> f64 {
    (0.4 * plan_reward + 0.6 * test_reward).clamp(-1.0, 1.0)
}
