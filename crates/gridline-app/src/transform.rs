// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::warn;

use crate::{ColumnDefinition, ColumnRegistry, ColumnType, RowId};

pub const CHECK_MARK: &str = "✔";
pub const INVALID_TIME_MARKER: &str = "(invalid)";
pub const ARRAY_DISPLAY_SEPARATOR: &str = "<br>";
pub const ARRAY_SORT_SEPARATOR: char = '\u{1f}';
/// 2000-01-01T00:00:00Z; anything older is a placeholder, not a real date.
pub const MIN_VALID_TIMESTAMP: i64 = 946_684_800;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// Field lookup; an explicit `null` counts as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn id(&self) -> Option<RowId> {
        self.get("id").and_then(RowId::from_json)
    }

    pub fn link(&self) -> Option<&str> {
        self.get("link").and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Bool(bool),
    Number(f64),
    Time(i64),
    Text(String),
}

impl SortValue {
    pub fn default_for(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Bool => Self::Bool(false),
            ColumnType::Int | ColumnType::Float => Self::Number(0.0),
            ColumnType::Time => Self::Time(0),
            ColumnType::String => Self::Text(String::new()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Time(value) => Some(*value as f64),
            Self::Bool(value) => Some(f64::from(u8::from(*value))),
            Self::Text(_) => None,
        }
    }

    /// Unrendered form used by exports.
    pub fn raw_string(&self) -> String {
        match self {
            Self::Bool(value) => value.to_string(),
            Self::Number(value) => format_number(*value),
            Self::Time(value) => value.to_string(),
            Self::Text(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub sort: SortValue,
    pub display: String,
    /// False when the record carried no usable value for the column.
    pub present: bool,
}

impl Cell {
    pub fn new(sort: SortValue, display: impl Into<String>) -> Self {
        Self {
            sort,
            display: display.into(),
            present: true,
        }
    }

    pub fn missing(column_type: ColumnType) -> Self {
        Self {
            sort: SortValue::default_for(column_type),
            display: String::new(),
            present: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkingRow {
    pub id: RowId,
    pub link: Option<String>,
    pub cells: HashMap<String, Cell>,
    pub record: RawRecord,
}

impl WorkingRow {
    pub fn cell(&self, key: &str) -> Option<&Cell> {
        self.cells.get(key)
    }

    pub fn display(&self, key: &str) -> &str {
        self.cells
            .get(key)
            .map(|cell| cell.display.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOptions {
    pub utc_offset: UtcOffset,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            utc_offset: UtcOffset::UTC,
        }
    }
}

pub fn transform_records(
    records: &[RawRecord],
    columns: &[String],
    registry: &ColumnRegistry,
    options: TransformOptions,
) -> Vec<WorkingRow> {
    let definitions: Vec<&ColumnDefinition> = columns
        .iter()
        .filter_map(|key| registry.get(key))
        .collect();
    let mut seen = BTreeSet::new();
    let mut missing_hooks = BTreeSet::new();
    let mut rows = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let Some(id) = record.id() else {
            warn!(index, "dropping record without a usable id");
            continue;
        };
        if !seen.insert(id.clone()) {
            warn!(%id, "dropping record with duplicate id");
            continue;
        }

        let mut cells = HashMap::with_capacity(definitions.len());
        for column in &definitions {
            let cell = if column.is_computed() {
                match registry.hook(&column.key) {
                    Some(hook) => hook(record),
                    None => {
                        if missing_hooks.insert(column.key.clone()) {
                            warn!(column = %column.key, "computed column has no callback");
                        }
                        missing_hook_cell(column)
                    }
                }
            } else {
                convert_cell(column, record.get(&column.key), options)
            };
            cells.insert(column.key.clone(), cell);
        }

        rows.push(WorkingRow {
            id,
            link: record.link().map(str::to_owned),
            cells,
            record: record.clone(),
        });
    }

    rows
}

fn missing_hook_cell(column: &ColumnDefinition) -> Cell {
    Cell {
        sort: SortValue::default_for(column.column_type),
        display: escape_html(&format!("[no renderer for column {:?}]", column.key)),
        present: false,
    }
}

pub fn convert_cell(
    column: &ColumnDefinition,
    value: Option<&Value>,
    options: TransformOptions,
) -> Cell {
    let Some(value) = value else {
        return Cell::missing(column.column_type);
    };

    if column.is_array() {
        return array_cell(value);
    }

    match column.column_type {
        ColumnType::Bool => match json_bool(value) {
            Some(flag) => Cell::new(
                SortValue::Bool(flag),
                if flag { CHECK_MARK } else { "" },
            ),
            None => Cell::missing(ColumnType::Bool),
        },
        ColumnType::Int | ColumnType::Float => match json_number(value) {
            Some(number) => Cell::new(SortValue::Number(number), escape_html(&json_text(value))),
            None => Cell::missing(column.column_type),
        },
        ColumnType::Time => time_cell(value, options),
        ColumnType::String => {
            let text = json_text(value);
            let display = escape_html(&text);
            Cell::new(SortValue::Text(text), display)
        }
    }
}

fn time_cell(value: &Value, options: TransformOptions) -> Cell {
    let Some(seconds) = json_number(value).map(|number| number.trunc() as i64) else {
        return Cell::missing(ColumnType::Time);
    };
    if seconds < MIN_VALID_TIMESTAMP {
        return Cell {
            sort: SortValue::Time(0),
            display: INVALID_TIME_MARKER.to_owned(),
            present: false,
        };
    }
    match format_timestamp(seconds, options.utc_offset) {
        Some(display) => Cell::new(SortValue::Time(seconds), display),
        None => Cell {
            sort: SortValue::Time(0),
            display: INVALID_TIME_MARKER.to_owned(),
            present: false,
        },
    }
}

pub fn format_timestamp(seconds: i64, offset: UtcOffset) -> Option<String> {
    let moment = OffsetDateTime::from_unix_timestamp(seconds).ok()?;
    moment
        .to_offset(offset)
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .ok()
}

fn array_cell(value: &Value) -> Cell {
    let items: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(json_text)
            .collect(),
        other => vec![json_text(other)],
    };
    if items.is_empty() {
        return Cell::missing(ColumnType::String);
    }

    let display = items
        .iter()
        .map(|item| escape_html(item))
        .collect::<Vec<_>>()
        .join(ARRAY_DISPLAY_SEPARATOR);
    let sort = items.join(&ARRAY_SORT_SEPARATOR.to_string());
    Cell::new(SortValue::Text(sort), display)
}

fn json_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
