//! Typed views over loosely-typed stored records.
//!
//! Stored items come either as plain JSON objects or in DynamoDB
//! attribute-value form (`{"S": ".."}`, `{"BOOL": true}`, `{"L": [..]}`).
//! Parsing here never fails on a missing optional field; required fields are
//! enforced by the materialization steps that consume these records.

use serde::Serialize;
use serde_json::Value;

/// Unwrap a DynamoDB attribute wrapper if present.
fn unwrap_attr(value: &Value) -> &Value {
    if let Value::Object(map) = value
        && map.len() == 1
        && let Some((key, inner)) = map.iter().next()
        && matches!(key.as_str(), "S" | "N" | "BOOL" | "L" | "SS" | "M" | "NULL")
    {
        return inner;
    }
    value
}

pub(crate) fn attr_str(item: &Value, field: &str) -> Option<String> {
    match unwrap_attr(item.get(field)?) {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn attr_bool(item: &Value, field: &str) -> Option<bool> {
    match unwrap_attr(item.get(field)?) {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

pub(crate) fn attr_str_list(item: &Value, field: &str) -> Vec<String> {
    let Some(raw) = item.get(field) else {
        return Vec::new();
    };
    match unwrap_attr(raw) {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match unwrap_attr(v) {
                Value::String(s) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mission {
    pub id: String,
    pub name: String,
    pub agent_ids: Vec<String>,
    pub task_ids: Vec<String>,
    pub process: String,
    pub game: String,
}

impl Mission {
    pub fn from_item(item: &Value) -> Option<Self> {
        Some(Self {
            id: attr_str(item, "id")?,
            name: attr_str(item, "name").unwrap_or_default(),
            agent_ids: attr_str_list(item, "agents"),
            task_ids: attr_str_list(item, "tasks"),
            process: attr_str(item, "process").unwrap_or_default(),
            game: attr_str(item, "game").unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRecord {
    pub id: String,
    pub role: Option<String>,
    pub goal: Option<String>,
    pub backstory: Option<String>,
    pub allow_delegation: Option<bool>,
    pub tools: Vec<String>,
}

impl AgentRecord {
    pub fn from_item(item: &Value) -> Option<Self> {
        Some(Self {
            id: attr_str(item, "id")?,
            role: attr_str(item, "role"),
            goal: attr_str(item, "goal"),
            backstory: attr_str(item, "backstory"),
            allow_delegation: attr_bool(item, "allow_delegation"),
            tools: attr_str_list(item, "tools"),
        })
    }

    /// Eligible as a hierarchical manager.
    pub fn delegates(&self) -> bool {
        self.allow_delegation.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub id: String,
    pub name: Option<String>,
    pub agent_id: Option<String>,
    pub description: Option<String>,
    pub expected_output: Option<String>,
}

impl TaskRecord {
    pub fn from_item(item: &Value) -> Option<Self> {
        Some(Self {
            id: attr_str(item, "id")?,
            name: attr_str(item, "task"),
            agent_id: attr_str(item, "agent"),
            description: attr_str(item, "description"),
            expected_output: attr_str(item, "expected_output"),
        })
    }
}
