// Typed variable values shared by guards and instance state

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Variable environment keyed by name; names are unique by construction.
pub type Variables = BTreeMap<String, VariableValue>;

/// A variable value. Serialized adjacently tagged so payloads read
/// `{"type": "number", "value": 12}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum VariableValue {
    Number(f64),
    String(String),
    #[serde(rename = "boolean", alias = "bool")]
    Bool(bool),
}

impl VariableValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            VariableValue::Number(_) => "number",
            VariableValue::String(_) => "string",
            VariableValue::Bool(_) => "boolean",
        }
    }

    /// Parse a CLI-style literal: `true`/`false`, a number, else a string.
    pub fn parse_literal(raw: &str) -> Self {
        match raw {
            "true" => VariableValue::Bool(true),
            "false" => VariableValue::Bool(false),
            _ => raw
                .parse::<f64>()
                .map(VariableValue::Number)
                .unwrap_or_else(|_| VariableValue::String(raw.to_string())),
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Number(n) => write!(f, "{n}"),
            VariableValue::String(s) => write!(f, "\"{s}\""),
            VariableValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<f64> for VariableValue {
    fn from(value: f64) -> Self {
        VariableValue::Number(value)
    }
}

impl From<i64> for VariableValue {
    fn from(value: i64) -> Self {
        VariableValue::Number(value as f64)
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        VariableValue::Bool(value)
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        VariableValue::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let json = serde_json::to_value(VariableValue::Bool(true)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "boolean", "value": true}));

        let parsed: VariableValue =
            serde_json::from_str(r#"{"type": "number", "value": 12.5}"#).unwrap();
        assert_eq!(parsed, VariableValue::Number(12.5));
    }

    #[test]
    fn test_type_value_mismatch_rejected() {
        let parsed = serde_json::from_str::<VariableValue>(r#"{"type": "number", "value": "x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(VariableValue::parse_literal("false"), VariableValue::Bool(false));
        assert_eq!(VariableValue::parse_literal("150"), VariableValue::Number(150.0));
        assert_eq!(VariableValue::parse_literal("abc"), VariableValue::from("abc"));
    }
}
