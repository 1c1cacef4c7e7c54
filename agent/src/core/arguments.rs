//! Capability parameter schemas and argument validation.
//!
//! Arguments arrive from the reasoning backend as loosely-typed JSON. They
//! are checked against the declared parameter list before any capability runs;
//! values are never coerced between primitive types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Argument mapping passed to a capability.
pub type Arguments = Map<String, Value>;

/// Primitive parameter types a capability may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    Number,
    String,
    Boolean,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::String => "string",
            ParamType::Boolean => "boolean",
        }
    }

    /// True if `value` is an instance of this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::String => value.is_string(),
            ParamType::Boolean => value.is_boolean(),
        }
    }
}

/// One declared parameter. All declared parameters are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn new(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
        }
    }
}

/// Validate `args` against `params`.
///
/// Problems with declared parameters are reported in declaration order,
/// followed by unexpected names in sorted order.
pub fn validate_arguments(params: &[ParamSpec], args: &Arguments) -> Vec<String> {
    let mut errors = Vec::new();

    for param in params {
        match args.get(param.name) {
            None => errors.push(format!("missing argument '{}'", param.name)),
            Some(value) if !param.kind.accepts(value) => errors.push(format!(
                "argument '{}' must be {}, got {}",
                param.name,
                param.kind.as_str(),
                json_type_name(value)
            )),
            Some(_) => {}
        }
    }

    let mut unexpected: Vec<&str> = args
        .keys()
        .map(String::as_str)
        .filter(|name| !params.iter().any(|param| param.name == *name))
        .collect();
    unexpected.sort_unstable();
    for name in unexpected {
        errors.push(format!("unexpected argument '{name}'"));
    }

    errors
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
