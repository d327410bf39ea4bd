//! Rule-based goal decomposition (spec §4.J "Decomposition").
//!
//! A small pattern table catches common multi-verb goals and expands them
//! into a dependency chain; anything else falls back to a single step
//! inferred from the goal's verbs.

use kernel_types::{ActionKind, PlanStep, ProposedAction, StepId};
use regex::Regex;
use serde_json::json;
use uuid::Uuid;

type PatternSteps = &'static [(&'static str, &'static str)];

const PATTERNS: &[(&str, PatternSteps)] = &[
    (
        r"(list|show|find).*(and|then).*(read|summarize|analyze)",
        &[
            ("list_files", "List the relevant files"),
            ("read_content", "Read the file contents"),
            ("summarize", "Summarize the findings"),
        ],
    ),
    (
        r"(create|write).*(and|then).*(test|verify)",
        &[("create", "Create the requested content"), ("verify", "Verify the result")],
    ),
    (
        r"(search|find).*(and|then).*(update|modify|change)",
        &[("search", "Search for the target"), ("modify", "Apply the changes")],
    ),
    (
        r"(read|analyze).*(and|then).*(store|save|remember)",
        &[("read", "Read and analyze the content"), ("store", "Store the results in memory")],
    ),
];

fn new_step_id() -> StepId {
    StepId::new(Uuid::new_v4().simple().to_string().chars().take(8).collect::<String>())
}

fn match_pattern(goal: &str) -> Option<PatternSteps> {
    let goal_lower = goal.to_lowercase();
    PATTERNS
        .iter()
        .find(|(pattern, _)| Regex::new(pattern).is_ok_and(|re| re.is_match(&goal_lower)))
        .map(|(_, steps)| *steps)
}

/// Decompose a goal into an ordered, dependency-chained step list. Falls
/// back to a single direct step when no pattern matches.
#[must_use]
pub fn decompose_goal(goal: &str) -> Vec<PlanStep> {
    match match_pattern(goal) {
        Some(pattern_steps) => steps_from_pattern(goal, pattern_steps),
        None => vec![direct_step(goal)],
    }
}

fn steps_from_pattern(goal: &str, pattern_steps: PatternSteps) -> Vec<PlanStep> {
    let mut steps = Vec::with_capacity(pattern_steps.len());
    let mut prev: Option<StepId> = None;

    for (step_type, description) in pattern_steps {
        let action = action_for_step_type(step_type, goal);
        let id = new_step_id();
        let mut step = PlanStep::new(id.clone(), *description, action);
        if let Some(dep) = prev.take() {
            step = step.depending_on([dep]);
        }
        prev = Some(id);
        steps.push(step);
    }
    steps
}

fn direct_step(goal: &str) -> PlanStep {
    let goal_lower = goal.to_lowercase();

    let action = if ["list", "show", "find files"].iter().any(|w| goal_lower.contains(w)) {
        tool_call("list_dir", json!({"path": "./"}), goal)
    } else if ["read", "open", "view"].iter().any(|w| goal_lower.contains(w)) {
        tool_call("read_file", json!({"path": "./README.md"}), goal)
    } else if ["search", "find"].iter().any(|w| goal_lower.contains(w)) {
        tool_call("search_files", json!({"directory": "./", "pattern": "*"}), goal)
    } else if ["remember", "store", "save"].iter().any(|w| goal_lower.contains(w)) {
        tool_call("memory_store", json!({"key": "note", "value": goal}), goal)
    } else {
        ProposedAction::new(
            ActionKind::MessageSend,
            json!({"message": format!("I need more specific instructions to: {goal}")}),
            "Goal requires clarification",
        )
    };

    PlanStep::new(new_step_id(), format!("Execute: {goal}"), action)
}

fn action_for_step_type(step_type: &str, goal: &str) -> ProposedAction {
    let justification = format!("Step in plan: {goal}");
    match step_type {
        "list_files" => tool_call("list_dir", json!({"path": "./"}), &justification),
        "read_content" => tool_call("read_file", json!({"path": "./README.md"}), &justification),
        "summarize" | "analyze" => {
            ProposedAction::new(ActionKind::MessageSend, json!({"message": "Summarizing findings..."}), justification)
        }
        "create" | "modify" => {
            tool_call("write_file", json!({"path": "./output.txt", "content": ""}), &justification)
        }
        "verify" => {
            ProposedAction::new(ActionKind::MessageSend, json!({"message": "Verifying results..."}), justification)
        }
        "search" => tool_call("search_files", json!({"directory": "./", "pattern": "*"}), &justification),
        "store" => tool_call("memory_store", json!({"key": "result", "value": ""}), &justification),
        other => ProposedAction::new(ActionKind::MessageSend, json!({"message": format!("Unknown step type: {other}")}), "Fallback"),
    }
}

fn tool_call(tool: &str, args: serde_json::Value, justification: impl Into<String>) -> ProposedAction {
    ProposedAction::new(ActionKind::ToolCall, json!({"tool": tool, "args": args}), justification)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matched_pattern_produces_a_dependency_chain() {
        let steps = decompose_goal("list the files and then summarize them");
        assert_eq!(steps.len(), 3);
        assert!(steps[0].depends_on.is_empty());
        assert_eq!(steps[1].depends_on, vec![steps[0].id.clone()]);
        assert_eq!(steps[2].depends_on, vec![steps[1].id.clone()]);
    }

    #[test]
    fn unmatched_goal_falls_back_to_a_single_step() {
        let steps = decompose_goal("do something completely unrelated");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action.kind, ActionKind::MessageSend);
    }

    #[test]
    fn read_verb_infers_a_read_file_tool_call() {
        let steps = decompose_goal("please read config.toml");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action.tool_name(), Some("read_file"));
    }
}
