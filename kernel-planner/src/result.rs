//! What the executor returns for one step and for a whole plan (spec §4.J).

use serde_json::Value;

/// The outcome of executing one [`kernel_types::PlanStep`].
#[derive(Debug, Clone)]
pub struct StepResult {
    /// The step this result belongs to.
    pub step_id: kernel_types::StepId,
    /// Whether the step's action completed successfully.
    pub success: bool,
    /// The action's output, if any.
    pub output: Value,
    /// Failure detail, set whenever `success` is false.
    pub error: Option<String>,
    /// Whether the gate allowed this step at all. `false` means the step
    /// never reached execution.
    pub gated: bool,
    /// The gate's reason string, allow or deny.
    pub gate_reason: String,
}

/// The outcome of executing an entire [`kernel_types::Plan`].
#[derive(Debug, Clone)]
pub struct PlanResult {
    /// The plan this result belongs to.
    pub plan_id: kernel_types::PlanId,
    /// Whether every step completed.
    pub success: bool,
    /// Per-step results, in execution order.
    pub step_results: Vec<StepResult>,
    /// Total steps in the plan.
    pub total_steps: u32,
    /// Steps that reached `Completed`.
    pub completed_steps: u32,
    /// Steps that reached `Failed`.
    pub failed_steps: u32,
    /// Whether a rollback was attempted after a failure.
    pub rolled_back: bool,
    /// The last step's error, if the plan did not succeed.
    pub error: Option<String>,
}

impl PlanResult {
    /// Fraction of the plan's steps that completed, in `[0, 1]`. A plan
    /// with zero steps is vacuously complete.
    #[must_use]
    pub fn completion_rate(&self) -> f64 {
        if self.total_steps == 0 {
            return 1.0;
        }
        f64::from(self.completed_steps) / f64::from(self.total_steps)
    }
}
