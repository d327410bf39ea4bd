//! Strategy-based plan generation (spec §4.J "Strategy selection").

use kernel_types::{ActionKind, PlanId, PlanStep, ProposedAction, Strategy, WorldSnapshot};
use serde_json::json;
use uuid::Uuid;

use crate::decomposer::decompose_goal;

fn new_plan_id() -> PlanId {
    PlanId::new(Uuid::new_v4().simple().to_string().chars().take(8).collect::<String>())
}

/// Generate a plan for `goal` under `strategy`. `world`, if given, is only
/// consulted for `search_first`'s downstream-dependency wiring.
#[must_use]
pub fn generate_plan(goal: &str, _world: Option<&WorldSnapshot>, strategy: Strategy) -> kernel_types::Plan {
    let steps = match strategy {
        Strategy::Direct => decompose_goal(goal).into_iter().take(1).collect(),
        Strategy::Decompose => decompose_goal(goal),
        Strategy::SearchFirst => search_first_steps(goal),
        Strategy::AskUser => vec![ask_user_step(goal)],
    };
    let mut plan = kernel_types::Plan::new(new_plan_id(), goal, strategy);
    plan.steps = steps;
    plan
}

fn search_first_steps(goal: &str) -> Vec<PlanStep> {
    let search_step = PlanStep::new(
        kernel_types::StepId::new(Uuid::new_v4().simple().to_string().chars().take(8).collect::<String>()),
        "Search for relevant context",
        ProposedAction::new(
            ActionKind::ToolCall,
            json!({"tool": "list_dir", "args": {"path": "./"}}),
            format!("Gather context for: {goal}"),
        ),
    );
    let main_steps: Vec<PlanStep> = decompose_goal(goal)
        .into_iter()
        .map(|step| if step.depends_on.is_empty() { step.depending_on([search_step.id.clone()]) } else { step })
        .collect();

    std::iter::once(search_step).chain(main_steps).collect()
}

fn ask_user_step(goal: &str) -> PlanStep {
    PlanStep::new(
        kernel_types::StepId::new(Uuid::new_v4().simple().to_string().chars().take(8).collect::<String>()),
        "Request clarification from user",
        ProposedAction::new(
            ActionKind::MessageSend,
            json!({"message": format!(
                "Before I proceed with '{goal}', could you clarify:\n1. What specific outcome do you expect?\n2. Are there any constraints I should be aware of?"
            )}),
            "Clarification needed before execution",
        ),
    )
}

/// Heuristically pick a strategy for `goal` from its surface text. Callers
/// that want a learned choice instead select an arm via `kernel-bandit`
/// and pass the resulting strategy to [`generate_plan`] directly.
#[must_use]
pub fn select_strategy(goal: &str) -> Strategy {
    let goal_lower = goal.to_lowercase();

    if [" and ", " then ", " after "].iter().any(|w| goal_lower.contains(w)) {
        Strategy::Decompose
    } else if ["help", "how do i", "what should"].iter().any(|w| goal_lower.contains(w)) {
        Strategy::AskUser
    } else if ["analyze", "summarize", "review", "understand"].iter().any(|w| goal_lower.contains(w)) {
        Strategy::SearchFirst
    } else {
        Strategy::Direct
    }
}

/// Generate a plan using [`select_strategy`]'s heuristic choice.
#[must_use]
pub fn auto_plan(goal: &str, world: Option<&WorldSnapshot>) -> kernel_types::Plan {
    generate_plan(goal, world, select_strategy(goal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_strategy_keeps_only_the_first_step() {
        let plan = generate_plan("list the files and then summarize them", None, Strategy::Direct);
        assert_eq!(plan.steps.len(), 1);
    }

    #[test]
    fn decompose_strategy_keeps_the_full_chain() {
        let plan = generate_plan("list the files and then summarize them", None, Strategy::Decompose);
        assert_eq!(plan.steps.len(), 3);
    }

    #[test]
    fn search_first_prepends_a_listing_step_all_downstream_depend_on() {
        let plan = generate_plan("analyze this repo", None, Strategy::SearchFirst);
        assert!(plan.steps.len() >= 2);
        let search_id = plan.steps[0].id.clone();
        assert!(plan.steps[1..].iter().all(|s| s.depends_on.contains(&search_id)));
    }

    #[test]
    fn ask_user_strategy_produces_a_single_clarification_step() {
        let plan = generate_plan("help me out", None, Strategy::AskUser);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].action.kind, ActionKind::MessageSend);
    }

    #[test]
    fn select_strategy_routes_vague_goals_to_ask_user() {
        assert_eq!(select_strategy("how do i deploy this"), Strategy::AskUser);
        assert_eq!(select_strategy("list files and then read them"), Strategy::Decompose);
        assert_eq!(select_strategy("summarize the repo"), Strategy::SearchFirst);
        assert_eq!(select_strategy("write hello.txt"), Strategy::Direct);
    }
}
