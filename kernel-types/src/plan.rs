//! Hierarchical plans: the shape a `patch_plan` action decomposes into, and
//! the step bookkeeping the executor mutates as it runs (spec §4.I/§4.J).

use crate::action::ProposedAction;
use crate::id::{PlanId, StepId};
use serde::{Deserialize, Serialize};

/// Which strategy the planner used to turn a goal into steps (spec §4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// The goal maps directly onto a single action; no decomposition needed.
    Direct,
    /// The goal was broken into an ordered/DAG'd sequence of sub-steps.
    Decompose,
    /// A read-only reconnaissance step runs before committing to a plan.
    SearchFirst,
    /// The goal is underspecified; the plan's only step asks the user to clarify.
    AskUser,
}

/// Lifecycle state of one plan step (spec §4.J).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not yet attempted; may or may not be ready (dependencies may be unmet).
    Pending,
    /// Currently being executed by the executor.
    InProgress,
    /// Finished and its outcome was a success.
    Completed,
    /// Finished and its outcome was a failure; downstream steps are blocked.
    Failed,
    /// Never attempted because an upstream dependency failed.
    Skipped,
}

/// One node in a plan's step DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Unique id within the owning plan.
    pub id: StepId,
    /// Human-readable description shown in the ledger and UI.
    pub description: String,
    /// The action to propose to the gate once this step is ready.
    pub action: ProposedAction,
    /// Ids of steps that must be `Completed` before this one is ready.
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    /// Current lifecycle state.
    pub status: StepStatus,
}

impl PlanStep {
    /// Construct a new, not-yet-started step with no dependencies.
    pub fn new(id: StepId, description: impl Into<String>, action: ProposedAction) -> Self {
        Self {
            id,
            description: description.into(),
            action,
            depends_on: Vec::new(),
            status: StepStatus::Pending,
        }
    }

    /// Attach dependencies, builder-style.
    #[must_use]
    pub fn depending_on(mut self, deps: impl IntoIterator<Item = StepId>) -> Self {
        self.depends_on = deps.into_iter().collect();
        self
    }
}

/// A plan produced by the planner: a strategy tag plus an ordered step DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique id for this plan.
    pub id: PlanId,
    /// The original goal text the plan was generated from.
    pub goal: String,
    /// The strategy used to generate this plan's steps.
    pub strategy: Strategy,
    /// The plan's steps, in generation order (not necessarily execution order).
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Construct an empty plan for `goal` using `strategy`.
    pub fn new(id: PlanId, goal: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            id,
            goal: goal.into(),
            strategy,
            steps: Vec::new(),
        }
    }

    /// Steps that are `Pending` and whose dependencies are all `Completed`.
    #[must_use]
    pub fn ready_steps(&self) -> Vec<&PlanStep> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Pending)
            .filter(|s| {
                s.depends_on.iter().all(|dep| {
                    self.steps
                        .iter()
                        .find(|other| &other.id == dep)
                        .is_some_and(|other| other.status == StepStatus::Completed)
                })
            })
            .collect()
    }

    /// Whether every step has reached a terminal state (completed/failed/skipped).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.steps
            .iter()
            .all(|s| !matches!(s.status, StepStatus::Pending | StepStatus::InProgress))
    }

    /// Whether any step ended in `Failed`.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }

    /// Mark every `Pending` step whose dependency chain includes `failed_id`
    /// as `Skipped`. Idempotent and transitive.
    pub fn skip_downstream_of(&mut self, failed_id: &StepId) {
        let mut frontier = vec![failed_id.clone()];
        while let Some(id) = frontier.pop() {
            for step in &mut self.steps {
                if step.status == StepStatus::Pending && step.depends_on.contains(&id) {
                    step.status = StepStatus::Skipped;
                    frontier.push(step.id.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use serde_json::json;

    fn noop_action() -> ProposedAction {
        ProposedAction::new(ActionKind::MessageSend, json!({"text": "done"}), "finish up")
    }

    #[test]
    fn ready_steps_excludes_unmet_dependencies() {
        let mut plan = Plan::new(PlanId::new("p1"), "ship feature", Strategy::Decompose);
        let a = PlanStep::new(StepId::new("a"), "first", noop_action());
        let b = PlanStep::new(StepId::new("b"), "second", noop_action())
            .depending_on([StepId::new("a")]);
        plan.steps.push(a);
        plan.steps.push(b);

        let ready: Vec<_> = plan.ready_steps().into_iter().map(|s| s.id.clone()).collect();
        assert_eq!(ready, vec![StepId::new("a")]);
    }

    #[test]
    fn ready_steps_includes_step_once_dependency_completes() {
        let mut plan = Plan::new(PlanId::new("p1"), "ship feature", Strategy::Decompose);
        plan.steps.push(PlanStep {
            status: StepStatus::Completed,
            ..PlanStep::new(StepId::new("a"), "first", noop_action())
        });
        plan.steps.push(
            PlanStep::new(StepId::new("b"), "second", noop_action())
                .depending_on([StepId::new("a")]),
        );

        let ready: Vec<_> = plan.ready_steps().into_iter().map(|s| s.id.clone()).collect();
        assert_eq!(ready, vec![StepId::new("b")]);
    }

    #[test]
    fn skip_downstream_of_propagates_transitively() {
        let mut plan = Plan::new(PlanId::new("p1"), "ship feature", Strategy::Decompose);
        plan.steps.push(PlanStep {
            status: StepStatus::Failed,
            ..PlanStep::new(StepId::new("a"), "first", noop_action())
        });
        plan.steps.push(
            PlanStep::new(StepId::new("b"), "second", noop_action())
                .depending_on([StepId::new("a")]),
        );
        plan.steps.push(
            PlanStep::new(StepId::new("c"), "third", noop_action())
                .depending_on([StepId::new("b")]),
        );

        plan.skip_downstream_of(&StepId::new("a"));

        assert_eq!(plan.steps[1].status, StepStatus::Skipped);
        assert_eq!(plan.steps[2].status, StepStatus::Skipped);
        assert!(plan.is_finished());
        assert!(plan.has_failures());
    }
}
