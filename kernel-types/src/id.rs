//! Newtype identifiers threaded through the control plane.
//!
//! Wrapping plain `String`s keeps a session id from being passed where a
//! context key is expected, and vice versa, without paying for a derive
//! macro or a third crate.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a string-like value as this id.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(SessionId, "Identifies one session across turns.");
string_id!(UserId, "Identifies the human or service principal driving a session.");
string_id!(RunId, "Identifies one offline/benchmark run.");
string_id!(TaskId, "Identifies the task a run is attempting.");
string_id!(ContextKey, "Aggregation key under which bandit outcomes are grouped.");
string_id!(ArmKey, "Namespaced `category::name` key identifying a learnable arm.");
string_id!(PlanId, "Identifies one generated plan.");
string_id!(StepId, "Identifies one step within a plan.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrips_the_wrapped_string() {
        let id = SessionId::new("sess-1");
        assert_eq!(id.to_string(), "sess-1");
        assert_eq!(id.as_str(), "sess-1");
    }

    #[test]
    fn ids_are_ordered_and_hashable() {
        let mut ids = vec![ArmKey::from("plan::b"), ArmKey::from("plan::a")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "plan::a");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = TaskId::new("task-7");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"task-7\"");
    }
}
