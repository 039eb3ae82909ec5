// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::{RowId, Selection, WorkingRow};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl ItemResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Lifecycle shared by every handler. Only the settings hooks need to be
/// overridden by handlers that expose options.
pub trait OperationHooks {
    fn has_settings(&self) -> bool {
        false
    }

    fn set_setting(&mut self, key: &str, _value: &str) -> Result<()> {
        bail!("operation has no setting named {key:?}")
    }

    /// Checked before anything is sent; an error keeps the run from starting.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

pub trait ItemProcessor: OperationHooks {
    fn process_item(&mut self, row: &WorkingRow) -> Result<ItemResult>;
}

pub trait BatchProcessor: OperationHooks {
    fn process_all_items(&mut self, rows: &[&WorkingRow]) -> Result<ItemResult>;
}

pub enum OperationHandler {
    PerItem(Box<dyn ItemProcessor>),
    SingleShot(Box<dyn BatchProcessor>),
}

impl OperationHandler {
    pub fn is_single_shot(&self) -> bool {
        matches!(self, Self::SingleShot(_))
    }

    pub fn has_settings(&self) -> bool {
        match self {
            Self::PerItem(handler) => handler.has_settings(),
            Self::SingleShot(handler) => handler.has_settings(),
        }
    }

    pub fn set_setting(&mut self, key: &str, value: &str) -> Result<()> {
        match self {
            Self::PerItem(handler) => handler.set_setting(key, value),
            Self::SingleShot(handler) => handler.set_setting(key, value),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::PerItem(handler) => handler.validate(),
            Self::SingleShot(handler) => handler.validate(),
        }
    }

    pub fn start(&mut self) -> Result<()> {
        match self {
            Self::PerItem(handler) => handler.start(),
            Self::SingleShot(handler) => handler.start(),
        }
    }

    pub fn finish(&mut self) -> Result<()> {
        match self {
            Self::PerItem(handler) => handler.finish(),
            Self::SingleShot(handler) => handler.finish(),
        }
    }
}

impl std::fmt::Debug for OperationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerItem(_) => f.write_str("PerItem(..)"),
            Self::SingleShot(_) => f.write_str("SingleShot(..)"),
        }
    }
}

#[derive(Debug)]
pub struct MassOperation {
    pub id: String,
    pub title: String,
    pub handler: OperationHandler,
}

impl MassOperation {
    pub fn per_item(id: &str, title: &str, handler: impl ItemProcessor + 'static) -> Self {
        Self {
            id: id.to_owned(),
            title: title.to_owned(),
            handler: OperationHandler::PerItem(Box::new(handler)),
        }
    }

    pub fn single_shot(id: &str, title: &str, handler: impl BatchProcessor + 'static) -> Self {
        Self {
            id: id.to_owned(),
            title: title.to_owned(),
            handler: OperationHandler::SingleShot(Box::new(handler)),
        }
    }
}

#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: Vec<MassOperation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, operation: MassOperation) -> Result<()> {
        if operation.id.trim().is_empty() {
            bail!("operation ids must not be empty");
        }
        if self.get(&operation.id).is_some() {
            bail!("operation {:?} is registered twice", operation.id);
        }
        self.operations.push(operation);
        Ok(())
    }

    pub fn with(mut self, operation: MassOperation) -> Result<Self> {
        self.register(operation)?;
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Option<&MassOperation> {
        self.operations.iter().find(|operation| operation.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut MassOperation> {
        self.operations.iter_mut().find(|operation| operation.id == id)
    }

    /// `(id, title)` pairs in registration order, for the selector.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        self.operations
            .iter()
            .map(|operation| (operation.id.as_str(), operation.title.as_str()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub current: Option<RowId>,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub operation: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Selected rows in processing order: the ones on screen in screen order,
/// then the selected rows hidden by the current filter.
pub fn run_order(visible: &[RowId], selection: &Selection) -> Vec<RowId> {
    let mut queued = BTreeSet::new();
    let mut order = Vec::with_capacity(selection.len());
    for id in visible {
        if selection.is_selected(id) && queued.insert(id.clone()) {
            order.push(id.clone());
        }
    }
    for id in selection.ids() {
        if queued.insert(id.clone()) {
            order.push(id.clone());
        }
    }
    order
}

#[derive(Debug, Clone)]
pub struct MassRun {
    operation: String,
    queue: Vec<RowId>,
    next: usize,
    succeeded: usize,
    failed: usize,
}

impl MassRun {
    pub fn new(operation: &str, queue: Vec<RowId>) -> Self {
        info!(operation, items = queue.len(), "mass operation started");
        Self {
            operation: operation.to_owned(),
            queue,
            next: 0,
            succeeded: 0,
            failed: 0,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn queue(&self) -> &[RowId] {
        &self.queue
    }

    pub fn is_done(&self) -> bool {
        self.next >= self.queue.len()
    }

    pub fn progress(&self) -> Progress {
        Progress {
            total: self.queue.len(),
            processed: self.next,
            succeeded: self.succeeded,
            failed: self.failed,
            current: self.queue.get(self.next.saturating_sub(1)).cloned(),
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            operation: self.operation.clone(),
            total: self.queue.len(),
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }

    /// Performs one handler call: the next row for per-item handlers, every
    /// queued row at once for single-shot handlers.
    pub fn step<'a, F>(
        &mut self,
        handler: &mut OperationHandler,
        lookup: F,
        selection: &mut Selection,
    ) -> Progress
    where
        F: Fn(&RowId) -> Option<&'a WorkingRow>,
    {
        if self.is_done() {
            return self.progress();
        }

        match handler {
            OperationHandler::PerItem(handler) => {
                let id = self.queue[self.next].clone();
                let result = match lookup(&id) {
                    Some(row) => handler
                        .process_item(row)
                        .unwrap_or_else(|error| ItemResult::failed(format!("{error:#}"))),
                    None => ItemResult::failed("row is no longer loaded"),
                };
                self.apply(&id, result, selection);
                self.next += 1;
            }
            OperationHandler::SingleShot(handler) => {
                let pending: Vec<RowId> = self.queue[self.next..].to_vec();
                let mut rows = Vec::with_capacity(pending.len());
                let mut found = Vec::with_capacity(pending.len());
                for id in &pending {
                    match lookup(id) {
                        Some(row) => {
                            rows.push(row);
                            found.push(id.clone());
                        }
                        None => {
                            self.apply(id, ItemResult::failed("row is no longer loaded"), selection)
                        }
                    }
                }
                if !rows.is_empty() {
                    let result = handler
                        .process_all_items(&rows)
                        .unwrap_or_else(|error| ItemResult::failed(format!("{error:#}")));
                    for id in &found {
                        self.apply(id, result.clone(), selection);
                    }
                }
                self.next = self.queue.len();
            }
        }

        if self.is_done() {
            info!(
                operation = %self.operation,
                succeeded = self.succeeded,
                failed = self.failed,
                "mass operation finished"
            );
        }
        self.progress()
    }

    fn apply(&mut self, id: &RowId, result: ItemResult, selection: &mut Selection) {
        if result.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
            warn!(
                operation = %self.operation,
                %id,
                message = result.message.as_deref().unwrap_or(""),
                "mass operation item failed"
            );
        }
        selection.record(id, result.success, result.message);
    }
}
