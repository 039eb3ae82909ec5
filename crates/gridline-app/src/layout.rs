// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::collections::BTreeSet;

use crate::ColumnRegistry;

/// Ordered visible columns. Never empty once built from a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    visible: Vec<String>,
}

impl ColumnLayout {
    pub fn from_registry(registry: &ColumnRegistry) -> Self {
        Self {
            visible: registry.default_columns().to_vec(),
        }
    }

    /// Keeps known, distinct keys in the given order; falls back to the
    /// registry defaults when nothing usable remains.
    pub fn from_keys(registry: &ColumnRegistry, keys: &[String]) -> Self {
        let mut seen = BTreeSet::new();
        let visible: Vec<String> = keys
            .iter()
            .filter(|key| registry.contains(key) && seen.insert(key.as_str()))
            .cloned()
            .collect();
        if visible.is_empty() {
            return Self::from_registry(registry);
        }
        Self { visible }
    }

    pub fn visible(&self) -> &[String] {
        &self.visible
    }

    pub fn is_visible(&self, key: &str) -> bool {
        self.visible.iter().any(|visible| visible == key)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.visible.iter().position(|visible| visible == key)
    }

    /// Removes the column at `from` and inserts it at `to` (an index into
    /// the shortened list). Returns false when nothing moved.
    pub fn move_column(&mut self, from: usize, to: usize) -> bool {
        if from >= self.visible.len() || from == to {
            return false;
        }
        let key = self.visible.remove(from);
        let to = to.min(self.visible.len());
        self.visible.insert(to, key);
        true
    }

    pub fn set_visible(&mut self, keys: Vec<String>) -> Result<()> {
        if keys.is_empty() {
            bail!("at least one column must stay visible");
        }
        self.visible = keys;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorEntry {
    pub key: String,
    pub title: String,
    pub checked: bool,
}

/// Working copy behind the column picker: every registered column, visible
/// ones first in their current order, each with a check box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnEditor {
    entries: Vec<EditorEntry>,
}

impl ColumnEditor {
    pub fn open(registry: &ColumnRegistry, layout: &ColumnLayout) -> Self {
        Self {
            entries: editor_entries(registry, layout.visible()),
        }
    }

    pub fn entries(&self) -> &[EditorEntry] {
        &self.entries
    }

    pub fn toggle(&mut self, index: usize) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.checked = !entry.checked;
                true
            }
            None => false,
        }
    }

    pub fn move_entry(&mut self, from: usize, to: usize) -> bool {
        if from >= self.entries.len() || to >= self.entries.len() || from == to {
            return false;
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        true
    }

    pub fn select_all(&mut self) {
        for entry in &mut self.entries {
            entry.checked = true;
        }
    }

    pub fn reset(&mut self, registry: &ColumnRegistry) {
        self.entries = editor_entries(registry, registry.default_columns());
    }

    pub fn can_save(&self) -> bool {
        self.entries.iter().any(|entry| entry.checked)
    }

    pub fn checked_keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.checked)
            .map(|entry| entry.key.clone())
            .collect()
    }

    pub fn save(&self, layout: &mut ColumnLayout) -> Result<()> {
        if !self.can_save() {
            bail!("select at least one column");
        }
        layout.set_visible(self.checked_keys())
    }
}

fn editor_entries(registry: &ColumnRegistry, visible: &[String]) -> Vec<EditorEntry> {
    let mut entries: Vec<EditorEntry> = visible
        .iter()
        .filter_map(|key| registry.get(key))
        .map(|column| EditorEntry {
            key: column.key.clone(),
            title: column.title.clone(),
            checked: true,
        })
        .collect();
    for column in registry.columns() {
        if !visible.contains(&column.key) {
            entries.push(EditorEntry {
                key: column.key.clone(),
                title: column.title.clone(),
                checked: false,
            });
        }
    }
    entries
}
