//! Capability registry and the uniform invocation boundary.
//!
//! A capability is a named, schema-described external action. The registry is
//! built once at process start and shared read-only by every run; capabilities
//! hold no run-scoped mutable state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

pub use crate::core::arguments::{Arguments, ParamSpec, ParamType, validate_arguments};

pub mod arithmetic;
pub mod files;
pub mod search;

/// Category of a capability or task-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    InvalidArguments,
    UnknownCapability,
    Arithmetic,
    NotFound,
    Io,
    MissingCredential,
    Network,
    Backend,
}

impl FailureCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureCategory::InvalidArguments => "invalid_arguments",
            FailureCategory::UnknownCapability => "unknown_capability",
            FailureCategory::Arithmetic => "arithmetic",
            FailureCategory::NotFound => "not_found",
            FailureCategory::Io => "io",
            FailureCategory::MissingCredential => "missing_credential",
            FailureCategory::Network => "network",
            FailureCategory::Backend => "backend",
        }
    }
}

/// Structured failure returned by a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDescriptor {
    pub category: FailureCategory,
    pub message: String,
}

impl FailureDescriptor {
    pub fn new(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error[{}]: {}", self.category.as_str(), self.message)
    }
}

/// Uniform interface for every external action the executor may invoke.
pub trait Capability: Send + Sync {
    /// Unique name used by the backend to pick this capability.
    fn name(&self) -> &str;

    /// Human-readable description shown to the backend.
    fn description(&self) -> &str;

    /// Declared parameters. Every parameter is required.
    fn parameters(&self) -> &[ParamSpec];

    /// Run the capability. Arguments have already been validated.
    fn invoke(&self, args: &Arguments) -> Result<String, FailureDescriptor>;
}

/// Catalogue of capabilities keyed by name.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Arc<dyn Capability>>,
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.names())
            .finish()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability. A later registration with the same name replaces
    /// the earlier one.
    pub fn register(&mut self, capability: impl Capability + 'static) {
        let name = capability.name().to_string();
        self.capabilities.insert(name, Arc::new(capability));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    /// Names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.capabilities.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// JSON description of every capability and its parameters.
    pub fn to_schema_json(&self) -> serde_json::Value {
        let entries: Vec<serde_json::Value> = self
            .capabilities
            .values()
            .map(|capability| {
                let properties: serde_json::Map<String, serde_json::Value> = capability
                    .parameters()
                    .iter()
                    .map(|param| {
                        (
                            param.name.to_string(),
                            json!({ "type": param.kind.as_str(), "description": param.description }),
                        )
                    })
                    .collect();
                let required: Vec<&str> =
                    capability.parameters().iter().map(|param| param.name).collect();
                json!({
                    "name": capability.name(),
                    "description": capability.description(),
                    "parameters": {
                        "type": "object",
                        "properties": properties,
                        "required": required,
                        "additionalProperties": false,
                    },
                })
            })
            .collect();
        serde_json::Value::Array(entries)
    }
}

/// Settings needed to construct the built-in capabilities.
#[derive(Debug, Clone)]
pub struct BuiltinSettings {
    pub workspace_dir: std::path::PathBuf,
    pub search: search::SearchSettings,
}

/// Registry with the arithmetic, file, and web-search capabilities.
pub fn builtin_registry(settings: &BuiltinSettings) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    arithmetic::register_all(&mut registry);
    files::register_all(&mut registry, &settings.workspace_dir);
    registry.register(search::WebSearch::new(settings.search.clone()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::EchoCapability;

    #[test]
    fn register_and_lookup_by_name() {
        let mut registry = CapabilityRegistry::new();
        registry.register(EchoCapability::default());
        arithmetic::register_all(&mut registry);

        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(
            registry.names(),
            vec!["add", "divide", "echo", "multiply", "power", "subtract"]
        );
    }

    #[test]
    fn schema_json_lists_typed_parameters() {
        let mut registry = CapabilityRegistry::new();
        arithmetic::register_all(&mut registry);
        let schema = registry.to_schema_json();
        let add = schema
            .as_array()
            .expect("array")
            .iter()
            .find(|entry| entry["name"] == "add")
            .expect("add entry");
        assert_eq!(add["parameters"]["properties"]["a"]["type"], "integer");
        assert_eq!(add["parameters"]["required"], json!(["a", "b"]));
    }

    #[test]
    fn failure_descriptor_renders_category() {
        let failure = FailureDescriptor::new(FailureCategory::Arithmetic, "division by zero");
        assert_eq!(failure.to_string(), "error[arithmetic]: division by zero");
    }

    #[test]
    fn registry_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CapabilityRegistry>();
    }
}
