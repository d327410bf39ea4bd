//! The output of the gate: a pure, total verdict on one proposed action.

use crate::action::ProposedAction;
use serde::{Deserialize, Serialize};

/// The gate's verdict on a single [`ProposedAction`] (spec §3 "Gate decision").
///
/// Construction is always through [`GateDecision::allow`] or
/// [`GateDecision::deny`] so `reason` and `allow` can never disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateDecision {
    /// Whether the action may proceed to the router.
    pub allow: bool,
    /// Human-readable reason. For denials this is the `deny:<code>` string;
    /// for allows it is typically `"ok"`.
    pub reason: String,
    /// A canonicalized replacement for the proposed action (e.g. trailing
    /// whitespace stripped from a patch). `None` means "use the original".
    pub normalized_action: Option<ProposedAction>,
    /// A suggestion the reasoner could retry with instead, surfaced in the
    /// feedback injected back into conversation history.
    pub suggested_alternative: Option<String>,
}

impl GateDecision {
    /// Allow the action unchanged.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allow: true,
            reason: "ok".to_string(),
            normalized_action: None,
            suggested_alternative: None,
        }
    }

    /// Allow the action, replacing it with `normalized` (e.g. a
    /// whitespace-canonicalized patch).
    #[must_use]
    pub fn allow_normalized(normalized: ProposedAction) -> Self {
        Self {
            allow: true,
            reason: "ok".to_string(),
            normalized_action: Some(normalized),
            suggested_alternative: None,
        }
    }

    /// Deny the action with the given `deny:<code>`-style reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
            normalized_action: None,
            suggested_alternative: None,
        }
    }

    /// Attach a suggested alternative, builder-style.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_alternative = Some(suggestion.into());
        self
    }

    /// The action the caller should actually execute: the normalized one if
    /// present, otherwise the original.
    #[must_use]
    pub fn effective_action<'a>(&'a self, original: &'a ProposedAction) -> &'a ProposedAction {
        self.normalized_action.as_ref().unwrap_or(original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use serde_json::json;

    #[test]
    fn allow_has_ok_reason_and_no_normalization() {
        let d = GateDecision::allow();
        assert!(d.allow);
        assert_eq!(d.reason, "ok");
        assert!(d.normalized_action.is_none());
    }

    #[test]
    fn deny_carries_the_given_reason() {
        let d = GateDecision::deny("deny:path_escape");
        assert!(!d.allow);
        assert_eq!(d.reason, "deny:path_escape");
    }

    #[test]
    fn effective_action_prefers_normalized_over_original() {
        let original = ProposedAction::new(ActionKind::Patch, json!("a \n"), "fix");
        let normalized = ProposedAction::new(ActionKind::Patch, json!("a\n"), "fix");
        let decision = GateDecision::allow_normalized(normalized.clone());
        assert_eq!(
            decision.effective_action(&original).payload,
            normalized.payload
        );

        let allow = GateDecision::allow();
        assert_eq!(allow.effective_action(&original).payload, original.payload);
    }
}
