// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, warn};

use crate::{ColumnLayout, ColumnRegistry, FilterTerm, Operator, SortDirection, SortSpec};

pub const SETTINGS_VERSION: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolTab {
    #[serde(rename = "columns")]
    Columns,
    #[serde(rename = "filters")]
    Filters,
    #[serde(rename = "massops")]
    MassOperations,
    #[serde(rename = "export")]
    Export,
}

impl ToolTab {
    pub const ALL: [Self; 4] = [Self::Columns, Self::Filters, Self::MassOperations, Self::Export];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Columns => "columns",
            Self::Filters => "filters",
            Self::MassOperations => "massops",
            Self::Export => "export",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tab| tab.as_str() == value)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Columns => "Columns",
            Self::Filters => "Filters",
            Self::MassOperations => "Mass operations",
            Self::Export => "Export",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSettings {
    pub columns: Vec<String>,
    pub sorting: SortSpec,
    pub current_tab: ToolTab,
    pub filters_enabled: bool,
    pub filters_reverse: bool,
    pub version: u64,
}

impl LayoutSettings {
    pub fn defaults(registry: &ColumnRegistry) -> Self {
        let columns = registry.default_columns().to_vec();
        Self {
            sorting: default_sort(registry, &columns),
            columns,
            current_tab: ToolTab::Columns,
            filters_enabled: true,
            filters_reverse: false,
            version: SETTINGS_VERSION,
        }
    }

    /// Decodes a stored payload. `None` means the payload is unusable as a
    /// whole; individual bad fields are replaced by their defaults.
    pub fn decode(raw: &str, registry: &ColumnRegistry) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let Value::Object(fields) = value else {
            return None;
        };
        let version = match fields.get("version") {
            None => 1,
            Some(version) => version.as_u64()?,
        };
        let fields = match version {
            1 => migrate_v1(fields),
            SETTINGS_VERSION => fields,
            _ => return None,
        };
        Some(Self::from_fields(&fields, registry))
    }

    fn from_fields(fields: &Map<String, Value>, registry: &ColumnRegistry) -> Self {
        let defaults = Self::defaults(registry);

        let columns = match fields.get("columns").and_then(Value::as_array) {
            Some(keys) => {
                let keys: Vec<String> = keys
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect();
                ColumnLayout::from_keys(registry, &keys).visible().to_vec()
            }
            None => defaults.columns.clone(),
        };

        let sorting = fields.get("sorting");
        let column = sorting
            .and_then(|sorting| sorting.get("column"))
            .and_then(Value::as_str)
            .filter(|key| registry.get(key).is_some_and(|column| column.is_sortable()))
            .map(str::to_owned)
            .unwrap_or_else(|| default_sort(registry, &columns).column);
        let direction = sorting
            .and_then(|sorting| sorting.get("dir"))
            .and_then(Value::as_str)
            .and_then(SortDirection::parse)
            .unwrap_or(SortDirection::Ascending);

        Self {
            columns,
            sorting: SortSpec { column, direction },
            current_tab: fields
                .get("currentTab")
                .and_then(Value::as_str)
                .and_then(ToolTab::parse)
                .unwrap_or(defaults.current_tab),
            filters_enabled: fields
                .get("filtersEnabled")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.filters_enabled),
            filters_reverse: fields
                .get("filtersReverse")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.filters_reverse),
            version: SETTINGS_VERSION,
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).context("encode layout settings")
    }
}

/// Version 1 kept the sort as two flat keys and had no tab or reverse flag.
/// Payloads without either flat key keep whatever `sorting` they carry.
fn migrate_v1(mut fields: Map<String, Value>) -> Map<String, Value> {
    if fields.contains_key("sortColumn") || fields.contains_key("sortDirection") {
        let column = fields.remove("sortColumn").unwrap_or(Value::Null);
        let direction = fields.remove("sortDirection").unwrap_or(Value::Null);
        fields.insert("sorting".to_owned(), json!({"column": column, "dir": direction}));
    }
    fields.insert("version".to_owned(), json!(SETTINGS_VERSION));
    fields
}

fn default_sort(registry: &ColumnRegistry, visible: &[String]) -> SortSpec {
    let sortable = |key: &&String| registry.get(key).is_some_and(|column| column.is_sortable());
    let column = visible
        .iter()
        .find(sortable)
        .or_else(|| registry.default_columns().iter().find(sortable))
        .cloned()
        .or_else(|| {
            registry
                .columns()
                .iter()
                .find(|column| column.is_sortable())
                .map(|column| column.key.clone())
        })
        .or_else(|| registry.columns().first().map(|column| column.key.clone()))
        .unwrap_or_default();
    SortSpec::ascending(&column)
}

pub trait SettingsRepository {
    fn load(&mut self, key: &str) -> Result<Option<String>>;
    fn save(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Process-local repository. Clones share the same storage, so a caller can
/// keep a handle to inspect what a controller persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    values: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.values
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
    }
}

impl SettingsRepository for MemoryRepository {
    fn load(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        self.insert(key, value);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredTerm {
    #[serde(default = "enabled")]
    active: bool,
    column: String,
    operator: String,
    #[serde(default)]
    value: String,
}

fn enabled() -> bool {
    true
}

pub struct SettingsStore {
    repository: Box<dyn SettingsRepository>,
    instance: String,
}

impl SettingsStore {
    pub fn new(repository: Box<dyn SettingsRepository>, instance: &str) -> Self {
        Self {
            repository,
            instance: instance.to_owned(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn settings_key(&self) -> String {
        format!("{}.settings", self.instance)
    }

    pub fn filters_key(&self) -> String {
        format!("{}.filters", self.instance)
    }

    /// Loads layout settings, replacing (and re-persisting) anything that
    /// cannot be read.
    pub fn load_layout(&mut self, registry: &ColumnRegistry) -> LayoutSettings {
        let key = self.settings_key();
        let raw = match self.repository.load(&key) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%key, error = %format!("{error:#}"), "cannot read settings; using defaults");
                return LayoutSettings::defaults(registry);
            }
        };
        let Some(raw) = raw else {
            return LayoutSettings::defaults(registry);
        };
        if let Some(settings) = LayoutSettings::decode(&raw, registry) {
            return settings;
        }

        warn!(%key, "discarding unreadable settings");
        let defaults = LayoutSettings::defaults(registry);
        if let Err(error) = self.save_layout(&defaults) {
            warn!(%key, error = %format!("{error:#}"), "cannot persist default settings");
        }
        defaults
    }

    pub fn save_layout(&mut self, settings: &LayoutSettings) -> Result<()> {
        let key = self.settings_key();
        let encoded = settings.encode()?;
        self.repository
            .save(&key, &encoded)
            .with_context(|| format!("save {key}"))?;
        debug!(%key, "persisted layout settings");
        Ok(())
    }

    /// Raw filter terms, including incomplete ones. Terms naming columns
    /// that no longer exist are dropped.
    pub fn load_filters(&mut self, registry: &ColumnRegistry) -> Vec<FilterTerm> {
        let key = self.filters_key();
        let raw = match self.repository.load(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(error) => {
                warn!(%key, error = %format!("{error:#}"), "cannot read filter terms");
                return Vec::new();
            }
        };
        let Ok(stored) = serde_json::from_str::<Vec<StoredTerm>>(&raw) else {
            warn!(%key, "discarding unreadable filter terms");
            if let Err(error) = self.save_filters(&[]) {
                warn!(%key, error = %format!("{error:#}"), "cannot reset filter terms");
            }
            return Vec::new();
        };

        stored
            .into_iter()
            .filter_map(|term| {
                let column = registry.get(&term.column)?;
                let operator =
                    Operator::parse(&term.operator).unwrap_or(column.default_operator);
                Some(FilterTerm {
                    active: term.active,
                    column: term.column,
                    operator,
                    value: term.value,
                })
            })
            .collect()
    }

    pub fn save_filters(&mut self, terms: &[FilterTerm]) -> Result<()> {
        let key = self.filters_key();
        let stored: Vec<StoredTerm> = terms
            .iter()
            .map(|term| StoredTerm {
                active: term.active,
                column: term.column.clone(),
                operator: term.operator.as_str().to_owned(),
                value: term.value.clone(),
            })
            .collect();
        let encoded = serde_json::to_string(&stored).context("encode filter terms")?;
        self.repository
            .save(&key, &encoded)
            .with_context(|| format!("save {key}"))?;
        debug!(%key, terms = terms.len(), "persisted filter terms");
        Ok(())
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}
