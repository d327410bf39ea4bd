//! The capability registry: the single source of truth binding a name to
//! `{schema, risk, budget, permission, handler}` (spec §4.F).

use crate::handler::CapabilityHandler;
use kernel_types::{CapabilitySpec, SchemaError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One registered capability: its static spec plus the handler that
/// executes it.
pub struct CapabilityEntry {
    /// The capability's static description.
    pub spec: CapabilitySpec,
    /// The implementation invoked once enforcement passes.
    pub handler: Arc<dyn CapabilityHandler>,
}

/// Built once per process. Every callable capability is registered here
/// before the first turn runs; the router never mutates it.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: HashMap<String, CapabilityEntry>,
}

impl CapabilityRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability. Overwrites any prior entry of the same name.
    pub fn register(&mut self, spec: CapabilitySpec, handler: Arc<dyn CapabilityHandler>) {
        self.entries.insert(spec.name.clone(), CapabilityEntry { spec, handler });
    }

    /// Look up a capability entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CapabilityEntry> {
        self.entries.get(name)
    }

    /// Whether `name` is a registered capability.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate over every registered entry.
    pub fn iter(&self) -> impl Iterator<Item = &CapabilityEntry> {
        self.entries.values()
    }

    /// Number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no capability has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Validate `args` against `spec.schema` (spec §4.F `validate_arguments`):
/// rejects a missing required field, a field of the wrong kind, or a field
/// the schema does not declare.
pub fn validate_arguments(spec: &CapabilitySpec, args: &Value) -> Result<(), SchemaError> {
    let obj = args
        .as_object()
        .ok_or_else(|| SchemaError::InvalidFormat("arguments must be a JSON object".into()))?;

    for field in &spec.schema {
        match obj.get(field.name.as_str()) {
            Some(value) if !field.kind.matches(value) => {
                return Err(SchemaError::WrongType {
                    field: field.name.clone(),
                    expected: format!("{:?}", field.kind).to_lowercase(),
                });
            }
            Some(_) => {}
            None if field.required => {
                return Err(SchemaError::MissingRequired(field.name.clone()));
            }
            None => {}
        }
    }

    let declared: std::collections::HashSet<&str> =
        spec.schema.iter().map(|f| f.name.as_str()).collect();
    for key in obj.keys() {
        if !declared.contains(key.as_str()) {
            return Err(SchemaError::UnexpectedArg(key.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_types::{FieldKind, SchemaField};
    use serde_json::json;

    fn spec() -> CapabilitySpec {
        CapabilitySpec {
            name: "read_file".into(),
            schema: vec![
                SchemaField::required("path", FieldKind::Str),
                SchemaField::optional("max_bytes", FieldKind::Int),
            ],
            risk: kernel_types::RiskLevel::Low,
            budget: kernel_types::CapabilityBudget::calls_only(20),
            permission: kernel_types::PermissionRule {
                restrict_paths_to_workdir: true,
                ..Default::default()
            },
        }
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let err = validate_arguments(&spec(), &json!({})).unwrap_err();
        assert_eq!(err, SchemaError::MissingRequired("path".into()));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = validate_arguments(&spec(), &json!({"path": 5})).unwrap_err();
        assert!(matches!(err, SchemaError::WrongType { .. }));
    }

    #[test]
    fn unexpected_field_is_rejected() {
        let err =
            validate_arguments(&spec(), &json!({"path": "a", "evil": true})).unwrap_err();
        assert_eq!(err, SchemaError::UnexpectedArg("evil".into()));
    }

    #[test]
    fn optional_field_may_be_omitted() {
        assert!(validate_arguments(&spec(), &json!({"path": "a.txt"})).is_ok());
    }
}
