// Variable payloads supplied with actions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::errors::{EngineError, EngineResult};
use crate::guard::{VariableValue, Variables};

/// One named, typed variable as submitted with an action:
/// `{"name": "amount", "type": "number", "value": 120}`.
///
/// A value that does not match its declared type is rejected while
/// deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawVariable", into = "RawVariable")]
pub struct Variable {
    pub name: String,
    pub value: VariableValue,
}

impl Variable {
    pub fn new(name: &str, value: impl Into<VariableValue>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawVariable {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    value: Value,
}

impl TryFrom<RawVariable> for Variable {
    type Error = String;

    fn try_from(raw: RawVariable) -> Result<Self, Self::Error> {
        let illegal = || {
            format!(
                "value of variable '{}' does not match type '{}'",
                raw.name, raw.kind
            )
        };
        let value = match raw.kind.as_str() {
            "number" => VariableValue::Number(raw.value.as_f64().ok_or_else(illegal)?),
            "string" => VariableValue::String(
                raw.value.as_str().ok_or_else(illegal)?.to_string(),
            ),
            "boolean" | "bool" => VariableValue::Bool(raw.value.as_bool().ok_or_else(illegal)?),
            other => return Err(format!("variable '{}' has unknown type '{other}'", raw.name)),
        };
        Ok(Variable {
            name: raw.name,
            value,
        })
    }
}

impl From<Variable> for RawVariable {
    fn from(variable: Variable) -> Self {
        let kind = variable.value.type_name().to_string();
        let value = match variable.value {
            VariableValue::Number(n) => serde_json::json!(n),
            VariableValue::String(s) => Value::String(s),
            VariableValue::Bool(b) => Value::Bool(b),
        };
        RawVariable {
            name: variable.name,
            kind,
            value,
        }
    }
}

/// Reject empty names and names repeated within one payload.
pub fn validate_variables(variables: &[Variable]) -> EngineResult<()> {
    let mut seen = HashSet::with_capacity(variables.len());
    for variable in variables {
        if variable.name.trim().is_empty() {
            return Err(EngineError::InvalidVariable {
                name: variable.name.clone(),
                reason: "name must not be empty".to_string(),
            });
        }
        if !seen.insert(variable.name.as_str()) {
            return Err(EngineError::InvalidVariable {
                name: variable.name.clone(),
                reason: "duplicate name in payload".to_string(),
            });
        }
    }
    Ok(())
}

/// Merge `incoming` into `existing`: new names are added, existing names
/// take the incoming value (last writer wins per name).
pub fn merge_variables(existing: &mut Variables, incoming: &[Variable]) {
    for variable in incoming {
        existing.insert(variable.name.clone(), variable.value.clone());
    }
}
