// Core types for process definitions

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::errors::{EngineError, EngineResult};

pub type UserId = u64;
pub type RoleId = u64;
pub type TenantId = u64;
pub type InstanceId = u64;

/// Kinds of node a definition may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    #[serde(alias = "start-event")]
    Start,
    #[serde(alias = "user-task")]
    UserTask,
    #[serde(alias = "exclusive-gateway")]
    ExclusiveGateway,
    #[serde(alias = "end-event")]
    End,
}

impl NodeKind {
    /// Numeric code used by chain consumers (1 start, 2 task, 3 gateway, 4 end).
    pub fn code(&self) -> u8 {
        match self {
            NodeKind::Start => 1,
            NodeKind::UserTask => 2,
            NodeKind::ExclusiveGateway => 3,
            NodeKind::End => 4,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Start => write!(f, "start"),
            NodeKind::UserTask => write!(f, "userTask"),
            NodeKind::ExclusiveGateway => write!(f, "exclusiveGateway"),
            NodeKind::End => write!(f, "end"),
        }
    }
}

/// Who may act on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "value", rename_all = "lowercase")]
pub enum Assignment {
    /// Concrete user ids
    Person(Vec<UserId>),
    /// Role ids, resolved to users per tenant before any permission check
    Role(Vec<RoleId>),
}

impl Assignment {
    pub fn method(&self) -> &'static str {
        match self {
            Assignment::Person(_) => "person",
            Assignment::Role(_) => "role",
        }
    }
}

/// A step in a process definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawNode")]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub sort: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
    pub hidden: bool,
}

// Designer output: assignment either nested or as flat assignType/assignValue
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    id: String,
    #[serde(alias = "clazz")]
    kind: NodeKind,
    #[serde(default)]
    label: String,
    #[serde(default, deserialize_with = "deserialize_sort")]
    sort: i64,
    #[serde(default)]
    assignment: Option<Assignment>,
    #[serde(default)]
    assign_type: Option<String>,
    #[serde(default)]
    assign_value: Option<Vec<u64>>,
    #[serde(default, alias = "isHideNode")]
    hidden: bool,
}

impl TryFrom<RawNode> for Node {
    type Error = String;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let flat = match (raw.assign_type, raw.assign_value) {
            (Some(method), Some(value)) => Some(match method.as_str() {
                "person" => Assignment::Person(value),
                "role" => Assignment::Role(value),
                other => {
                    return Err(format!(
                        "node '{}' has unsupported processor type '{other}'",
                        raw.id
                    ))
                }
            }),
            _ => None,
        };
        Ok(Node {
            id: raw.id,
            kind: raw.kind,
            label: raw.label,
            sort: raw.sort,
            assignment: raw.assignment.or(flat),
            hidden: raw.hidden,
        })
    }
}

impl Node {
    pub fn new(id: &str, kind: NodeKind, label: &str, sort: i64) -> Self {
        Self {
            id: id.to_string(),
            kind,
            label: label.to_string(),
            sort,
            assignment: None,
            hidden: false,
        }
    }

    pub fn with_assignment(mut self, assignment: Assignment) -> Self {
        self.assignment = Some(assignment);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// A directed transition between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, alias = "conditionExpression", skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    #[serde(default, deserialize_with = "deserialize_sort")]
    pub sort: i64,
    #[serde(default)]
    pub label: String,
}

impl Edge {
    pub fn new(id: &str, source: &str, target: &str, sort: i64) -> Self {
        Self {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            guard: None,
            sort,
            label: id.to_string(),
        }
    }

    pub fn with_guard(mut self, guard: &str) -> Self {
        self.guard = Some(guard.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// Guard text, if present and not blank
    pub fn guard_expression(&self) -> Option<&str> {
        self.guard
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }
}

/// Raw nodes/edges structure as supplied by the definition loader
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl ProcessDefinition {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn from_json(raw: &str) -> EngineResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| EngineError::structure("definition", format!("invalid JSON: {e}")))
    }
}

// Authoring tools emit sort either as a number or as a numeric string.
#[derive(Deserialize)]
#[serde(untagged)]
enum SortRepr {
    Number(i64),
    Text(String),
}

fn deserialize_sort<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match SortRepr::deserialize(deserializer)? {
        SortRepr::Number(value) => Ok(value),
        SortRepr::Text(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid sort '{text}': {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_from_json() {
        let raw = r#"{
            "nodes": [
                {"id": "start", "clazz": "start", "label": "Start", "sort": "1"},
                {"id": "review", "kind": "userTask", "label": "Review", "sort": 2,
                 "assignment": {"method": "role", "value": [7]}},
                {"id": "end", "kind": "end", "label": "Done", "sort": 3, "isHideNode": true}
            ],
            "edges": [
                {"id": "e1", "source": "start", "target": "review", "sort": 1, "label": "submit"},
                {"id": "e2", "source": "review", "target": "end", "sort": "1",
                 "conditionExpression": "{{approved}} == true"}
            ]
        }"#;

        let definition = ProcessDefinition::from_json(raw).unwrap();
        assert_eq!(definition.nodes.len(), 3);
        assert_eq!(definition.nodes[0].kind, NodeKind::Start);
        assert_eq!(definition.nodes[0].sort, 1);
        assert_eq!(definition.nodes[1].assignment, Some(Assignment::Role(vec![7])));
        assert!(definition.nodes[2].hidden);
        assert_eq!(
            definition.edges[1].guard_expression(),
            Some("{{approved}} == true")
        );
    }

    #[test]
    fn test_flat_assignment_fields() {
        let raw = r#"{
            "nodes": [
                {"id": "t", "clazz": "userTask", "label": "T", "sort": "2",
                 "assignType": "person", "assignValue": [7]},
                {"id": "r", "clazz": "userTask", "label": "R", "sort": 3,
                 "assignType": "role", "assignValue": [4, 5]},
                {"id": "n", "clazz": "userTask", "label": "N", "sort": 4, "assignType": "role"}
            ],
            "edges": []
        }"#;

        let definition = ProcessDefinition::from_json(raw).unwrap();
        assert_eq!(definition.nodes[0].assignment, Some(Assignment::Person(vec![7])));
        assert_eq!(definition.nodes[1].assignment, Some(Assignment::Role(vec![4, 5])));
        assert_eq!(definition.nodes[2].assignment, None);

        // Serialized form uses the nested shape and reads back the same
        let json = serde_json::to_string(&definition).unwrap();
        assert!(json.contains(r#""assignment":{"method":"person","value":[7]}"#));
        assert_eq!(ProcessDefinition::from_json(&json).unwrap(), definition);
    }

    #[test]
    fn test_unknown_assign_type_rejected() {
        let raw = r#"{"nodes": [{"id": "t", "clazz": "userTask", "sort": 2,
                      "assignType": "department", "assignValue": [1]}], "edges": []}"#;
        let err = ProcessDefinition::from_json(raw).unwrap_err();
        assert_eq!(err.kind(), "structure");
        assert!(err.to_string().contains("unsupported processor type 'department'"));
    }

    #[test]
    fn test_bad_sort_is_a_structure_error() {
        let raw = r#"{"nodes": [{"id": "s", "kind": "start", "sort": "first"}], "edges": []}"#;
        let err = ProcessDefinition::from_json(raw).unwrap_err();
        assert_eq!(err.kind(), "structure");
    }

    #[test]
    fn test_blank_guard_counts_as_missing() {
        let edge = Edge::new("e1", "a", "b", 1).with_guard("   ");
        assert_eq!(edge.guard_expression(), None);
    }
}
