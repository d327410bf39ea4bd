//! Turning a raw reasoner response into proposed actions (spec §6).

use kernel_types::{ProposedAction, ReasonerError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ActionsEnvelope {
    actions: Vec<ProposedAction>,
}

/// Parse `content` into the actions it proposes.
///
/// Tolerates a response wrapped in a markdown code fence (``` ```json ... ``` ```
/// or a bare ` ``` `), since reasoners routinely add one despite being asked
/// not to. Anything that isn't `{"actions": [...]}` after unwrapping is a
/// [`ReasonerError::ParseError`].
///
/// # Errors
///
/// Returns [`ReasonerError::EmptyResponse`] if `content` is blank, and
/// [`ReasonerError::ParseError`] if it doesn't deserialize to the expected
/// envelope.
pub fn parse_actions(content: &str) -> Result<Vec<ProposedAction>, ReasonerError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ReasonerError::EmptyResponse);
    }
    let unfenced = strip_code_fence(trimmed);
    let envelope: ActionsEnvelope = serde_json::from_str(unfenced)
        .map_err(|e| ReasonerError::ParseError(e.to_string()))?;
    Ok(envelope.actions)
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches('\n');
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let content = r#"{"actions": [{"kind": "message_send", "payload": {"text": "hi"}, "justification": "j", "risk_tags": []}]}"#;
        let actions = parse_actions(content).unwrap();
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn parses_fenced_json_with_language_tag() {
        let content = "```json\n{\"actions\": []}\n```";
        let actions = parse_actions(content).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn parses_fenced_json_without_language_tag() {
        let content = "```\n{\"actions\": []}\n```";
        let actions = parse_actions(content).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn blank_content_is_an_empty_response_error() {
        let err = parse_actions("   ").unwrap_err();
        assert_eq!(err, ReasonerError::EmptyResponse);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_actions("not json at all").unwrap_err();
        assert!(matches!(err, ReasonerError::ParseError(_)));
    }

    #[test]
    fn missing_actions_key_is_a_parse_error() {
        let err = parse_actions(r#"{"foo": 1}"#).unwrap_err();
        assert!(matches!(err, ReasonerError::ParseError(_)));
    }
}
