// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Stable identifier of a fetched record. Sources hand out either integers or
/// strings; integers order before strings so mixed sources still sort totally.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl RowId {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_i64().map(Self::Int),
            Value::String(text) if !text.trim().is_empty() => Some(Self::Text(text.clone())),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<i64>() {
            Ok(value) => Some(Self::Int(value)),
            Err(_) => Some(Self::Text(trimmed.to_owned())),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Int(value) => Value::from(*value),
            Self::Text(value) => Value::from(value.clone()),
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for RowId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for RowId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::RowId;
    use serde_json::json;

    #[test]
    fn integers_order_before_text() {
        let mut ids = vec![RowId::from("b"), RowId::from(10), RowId::from(9)];
        ids.sort();
        assert_eq!(ids, vec![RowId::from(9), RowId::from(10), RowId::from("b")]);
    }

    #[test]
    fn from_json_rejects_blank_and_fractional_ids() {
        assert_eq!(RowId::from_json(&json!(7)), Some(RowId::Int(7)));
        assert_eq!(RowId::from_json(&json!("u-1")), Some(RowId::from("u-1")));
        assert_eq!(RowId::from_json(&json!("  ")), None);
        assert_eq!(RowId::from_json(&json!(1.5)), None);
        assert_eq!(RowId::from_json(&json!(null)), None);
    }

    #[test]
    fn parse_prefers_integers() {
        assert_eq!(RowId::parse(" 42 "), Some(RowId::Int(42)));
        assert_eq!(RowId::parse("abc"), Some(RowId::from("abc")));
        assert_eq!(RowId::parse(""), None);
    }
}
