// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use gridline_app::{
    ColumnDefinition, ColumnRegistry, ColumnType, FilterContext, FilterPreset, FilterTerm,
    Operator, compile_term,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const CONFIG_VERSION: i64 = 1;
const APP_NAME: &str = "gridline";
const DEFAULT_TIMEOUT: &str = "10s";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub table: Table,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub operations: Vec<OperationConfig>,
    #[serde(default)]
    pub presets: Vec<PresetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            source: Source::default(),
            table: Table::default(),
            storage: Storage::default(),
            columns: Vec::new(),
            operations: Vec::new(),
            presets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Source {
    pub url: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Table {
    pub instance: Option<String>,
    pub utc_offset: Option<String>,
    #[serde(default)]
    pub default_columns: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnConfig {
    pub key: String,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub column_type: String,
    pub sortable: Option<bool>,
    pub array: Option<bool>,
    pub operator: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationConfig {
    pub id: String,
    pub title: Option<String>,
    pub url: String,
    pub single_shot: Option<bool>,
    #[serde(default)]
    pub settings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresetConfig {
    pub name: String,
    #[serde(default)]
    pub terms: Vec<PresetTermConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresetTermConfig {
    pub column: String,
    pub operator: Option<String>,
    #[serde(default)]
    pub value: String,
    pub active: Option<bool>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("GRIDLINE_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set GRIDLINE_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` at the top",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            gridline_db::validate_db_path(db_path)?;
        }

        if let Some(timeout) = &self.source.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "source.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(offset) = &self.table.utc_offset {
            parse_utc_offset(offset)
                .with_context(|| format!("table.utc_offset in {}", path.display()))?;
        }

        let mut operation_ids = BTreeSet::new();
        for operation in &self.operations {
            if operation.id.trim().is_empty() {
                bail!("[[operations]] in {} needs an id", path.display());
            }
            if !operation_ids.insert(operation.id.as_str()) {
                bail!(
                    "operation id {:?} appears twice in {}",
                    operation.id,
                    path.display()
                );
            }
        }

        if !self.columns.is_empty() {
            let registry = self
                .registry()
                .with_context(|| format!("[[columns]] in {}", path.display()))?;
            self.presets_for(&registry)
                .with_context(|| format!("[[presets]] in {}", path.display()))?;
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => gridline_db::default_db_path(),
        }
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn source_timeout(&self) -> Result<Duration> {
        parse_duration(self.source.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    /// Settings namespace: the configured name, else one derived from the
    /// source URL.
    pub fn instance(&self) -> String {
        if let Some(instance) = self
            .table
            .instance
            .as_deref()
            .map(str::trim)
            .filter(|instance| !instance.is_empty())
        {
            return instance.to_owned();
        }
        match self.source_url() {
            Some(url) => gridline_db::instance_key(url),
            None => "default".to_owned(),
        }
    }

    pub fn utc_offset(&self) -> Result<UtcOffset> {
        match &self.table.utc_offset {
            Some(raw) => parse_utc_offset(raw),
            None => Ok(UtcOffset::UTC),
        }
    }

    pub fn registry(&self) -> Result<ColumnRegistry> {
        if self.columns.is_empty() {
            bail!("no [[columns]] configured; run `gridline --print-example-config` for a template");
        }
        let mut columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            columns.push(column.definition()?);
        }
        let defaults: Vec<&str> = self
            .table
            .default_columns
            .iter()
            .map(String::as_str)
            .collect();
        ColumnRegistry::new(columns, &defaults)
    }

    /// Builds the configured presets. Active terms must compile, so a typo in
    /// a preset value fails here instead of silently matching everything.
    pub fn presets_for(&self, registry: &ColumnRegistry) -> Result<Vec<FilterPreset>> {
        let context = FilterContext {
            now: OffsetDateTime::now_utc(),
            utc_offset: self.utc_offset()?,
        };
        let mut presets = Vec::with_capacity(self.presets.len());
        for preset in &self.presets {
            let mut terms = Vec::with_capacity(preset.terms.len());
            for term in &preset.terms {
                let column = registry.get(&term.column).ok_or_else(|| {
                    anyhow!(
                        "preset {:?} names unknown column {:?}",
                        preset.name,
                        term.column
                    )
                })?;
                let operator = match &term.operator {
                    Some(raw) => Operator::parse(raw).ok_or_else(|| {
                        anyhow!("preset {:?} has unknown operator {raw:?}", preset.name)
                    })?,
                    None => column.default_operator,
                };
                let term = FilterTerm {
                    active: term.active.unwrap_or(true),
                    column: column.key.clone(),
                    operator,
                    value: term.value.clone(),
                };
                if term.active
                    && let Err(error) = compile_term(&term, registry, context)
                {
                    bail!(
                        "preset {:?} has an invalid {:?} value {:?}: {error}",
                        preset.name,
                        term.column,
                        term.value
                    );
                }
                terms.push(term);
            }
            presets.push(FilterPreset::new(&preset.name, terms));
        }
        Ok(presets)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            r#"# gridline config
# Place this file at: {}

version = 1

[source]
url = "https://example.com/api/users"
timeout = "{}"

[table]
# Optional. Default is derived from source.url.
# instance = "users"
utc_offset = "Z"
default_columns = ["username", "name", "last_login"]

[storage]
# Optional. Default is platform data dir (for example ~/.local/share/gridline/gridline.db)
# db_path = "/absolute/path/to/gridline.db"

[[columns]]
key = "id"
type = "int"

[[columns]]
key = "username"
title = "Username"
type = "string"

[[columns]]
key = "name"
title = "Name"
type = "string"

[[columns]]
key = "last_login"
title = "Last login"
type = "time"
operator = ">="

[[columns]]
key = "groups"
title = "Groups"
type = "string"
array = true
sortable = false

[[operations]]
id = "disable"
title = "Disable account"
url = "https://example.com/api/users/disable"

[[operations]]
id = "move"
title = "Move to group"
url = "https://example.com/api/users/move"
single_shot = true
settings = ["group"]

# Time values are YYYY[-MM[-DD[ HH[:MM[:SS]]]]] or signed seconds from now.
[[presets]]
name = "Stale accounts"
terms = [{{ column = "last_login", operator = "<", value = "-7776000" }}]
"#,
            path.display(),
            DEFAULT_TIMEOUT,
        )
    }
}

impl ColumnConfig {
    fn definition(&self) -> Result<ColumnDefinition> {
        let key = self.key.trim();
        if key.is_empty() {
            bail!("every column needs a key");
        }
        let column_type = ColumnType::parse(self.column_type.trim()).ok_or_else(|| {
            anyhow!(
                "column {key:?} has unknown type {:?}; use one of: {}",
                self.column_type,
                ColumnType::ALL
                    .iter()
                    .map(|kind| kind.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })?;
        let title = self.title.as_deref().unwrap_or(key);

        let mut definition = ColumnDefinition::new(key, title, column_type);
        if !self.sortable.unwrap_or(true) {
            definition = definition.unsortable();
        }
        if self.array.unwrap_or(false) {
            definition = definition.array();
        }
        if let Some(raw) = &self.operator {
            let operator = Operator::parse(raw)
                .ok_or_else(|| anyhow!("column {key:?} has unknown operator {raw:?}"))?;
            definition = definition.with_default_operator(operator);
        }
        Ok(definition)
    }
}

fn parse_utc_offset(raw: &str) -> Result<UtcOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(
        raw,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .with_context(|| format!("invalid UTC offset {raw:?}; use Z or +HH:MM"))
}

pub fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
