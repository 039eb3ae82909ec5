// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::{Cell, Operator, RawRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    Time,
    String,
}

impl ColumnType {
    pub const ALL: [Self; 5] = [Self::Bool, Self::Int, Self::Float, Self::Time, Self::String];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Time => "time",
            Self::String => "string",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bool" => Some(Self::Bool),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "time" => Some(Self::Time),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    pub const fn default_operator(self) -> Operator {
        match self {
            Self::Time => Operator::Ge,
            Self::Bool | Self::Int | Self::Float | Self::String => Operator::Eq,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnFlags {
    pub sortable: bool,
    pub array: bool,
    pub computed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub key: String,
    pub title: String,
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
    pub subtype: Option<String>,
    pub default_operator: Operator,
    /// Source keys a computed column reads; requested from the endpoint
    /// whenever the column is shown.
    pub requires: Vec<String>,
}

impl ColumnDefinition {
    pub fn new(key: &str, title: &str, column_type: ColumnType) -> Self {
        Self {
            key: key.to_owned(),
            title: title.to_owned(),
            column_type,
            flags: ColumnFlags {
                sortable: true,
                array: false,
                computed: false,
            },
            subtype: None,
            default_operator: column_type.default_operator(),
            requires: Vec::new(),
        }
    }

    pub fn unsortable(mut self) -> Self {
        self.flags.sortable = false;
        self
    }

    pub fn array(mut self) -> Self {
        self.flags.array = true;
        self
    }

    pub fn computed(mut self, requires: &[&str]) -> Self {
        self.flags.computed = true;
        self.requires = requires.iter().map(|key| (*key).to_owned()).collect();
        self
    }

    pub fn with_subtype(mut self, subtype: &str) -> Self {
        self.subtype = Some(subtype.to_owned());
        self
    }

    pub fn with_default_operator(mut self, operator: Operator) -> Self {
        self.default_operator = operator;
        self
    }

    pub fn is_sortable(&self) -> bool {
        self.flags.sortable
    }

    pub fn is_array(&self) -> bool {
        self.flags.array
    }

    pub fn is_computed(&self) -> bool {
        self.flags.computed
    }
}

pub type ComputedHook = Arc<dyn Fn(&RawRecord) -> Cell + Send + Sync>;

#[derive(Clone)]
pub struct ColumnRegistry {
    columns: Vec<ColumnDefinition>,
    defaults: Vec<String>,
    hooks: HashMap<String, ComputedHook>,
}

impl ColumnRegistry {
    pub fn new(columns: Vec<ColumnDefinition>, defaults: &[&str]) -> Result<Self> {
        if columns.is_empty() {
            bail!("a table needs at least one column");
        }

        let mut seen = BTreeSet::new();
        for column in &columns {
            if column.key.trim().is_empty() {
                bail!("column keys must not be empty");
            }
            if !seen.insert(column.key.as_str()) {
                bail!("column {:?} is registered twice", column.key);
            }
        }

        let mut default_keys = Vec::with_capacity(defaults.len());
        for key in defaults {
            if !seen.contains(key) {
                bail!("default column {key:?} is not registered");
            }
            if !default_keys.iter().any(|existing: &String| existing == key) {
                default_keys.push((*key).to_owned());
            }
        }
        if default_keys.is_empty() {
            default_keys = columns.iter().map(|column| column.key.clone()).collect();
        }

        Ok(Self {
            columns,
            defaults: default_keys,
            hooks: HashMap::new(),
        })
    }

    pub fn with_hook<F>(mut self, key: &str, hook: F) -> Self
    where
        F: Fn(&RawRecord) -> Cell + Send + Sync + 'static,
    {
        self.hooks.insert(key.to_owned(), Arc::new(hook));
        self
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn get(&self, key: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| column.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.key == key)
    }

    pub fn default_columns(&self) -> &[String] {
        &self.defaults
    }

    pub fn hook(&self, key: &str) -> Option<&ComputedHook> {
        self.hooks.get(key)
    }

    /// Keys the endpoint has to deliver so that `columns` can be rendered.
    pub fn source_keys<'a, I>(&self, columns: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut keys: Vec<String> = Vec::new();
        let mut push = |key: &str| {
            if !keys.iter().any(|existing| existing == key) {
                keys.push(key.to_owned());
            }
        };
        for key in columns {
            let Some(column) = self.get(key) else {
                continue;
            };
            if column.is_computed() {
                for required in &column.requires {
                    push(required);
                }
            } else {
                push(&column.key);
            }
        }
        keys
    }
}

impl fmt::Debug for ColumnRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hooks: Vec<&String> = self.hooks.keys().collect();
        hooks.sort();
        f.debug_struct("ColumnRegistry")
            .field("columns", &self.columns)
            .field("defaults", &self.defaults)
            .field("hooks", &hooks)
            .finish()
    }
}
