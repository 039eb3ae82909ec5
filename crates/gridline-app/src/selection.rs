// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeSet, HashMap};

use crate::RowId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutcomeState {
    #[default]
    Unprocessed,
    Success,
    Failed,
}

impl OutcomeState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowOutcome {
    pub state: OutcomeState,
    pub message: Option<String>,
}

/// Selected row ids plus the outcome of the last operation that touched each
/// row. Outcomes outlive deselection so a finished run stays visible.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    selected: BTreeSet<RowId>,
    outcomes: HashMap<RowId, RowOutcome>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_selected(&self, id: &RowId) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &RowId> {
        self.selected.iter()
    }

    /// Flips one row and returns whether it ended up selected.
    pub fn toggle(&mut self, id: &RowId) -> bool {
        if self.selected.remove(id) {
            false
        } else {
            self.selected.insert(id.clone());
            true
        }
    }

    pub fn select<'a>(&mut self, ids: impl IntoIterator<Item = &'a RowId>) {
        self.selected.extend(ids.into_iter().cloned());
    }

    pub fn select_all<'a>(&mut self, visible: impl IntoIterator<Item = &'a RowId>) {
        self.select(visible);
    }

    pub fn select_none(&mut self) {
        self.selected.clear();
    }

    /// Inverts the state of the visible rows; hidden selections are kept.
    pub fn invert<'a>(&mut self, visible: impl IntoIterator<Item = &'a RowId>) {
        for id in visible {
            self.toggle(id);
        }
    }

    pub fn deselect_successful(&mut self) -> usize {
        let before = self.selected.len();
        let outcomes = &self.outcomes;
        self.selected.retain(|id| {
            outcomes
                .get(id)
                .is_none_or(|outcome| outcome.state != OutcomeState::Success)
        });
        before - self.selected.len()
    }

    /// Drops ids (and their outcomes) that are no longer part of the row set.
    pub fn prune(&mut self, existing: &BTreeSet<RowId>) -> usize {
        let before = self.selected.len();
        self.selected.retain(|id| existing.contains(id));
        self.outcomes.retain(|id, _| existing.contains(id));
        before - self.selected.len()
    }

    pub fn outcome(&self, id: &RowId) -> Option<&RowOutcome> {
        self.outcomes.get(id)
    }

    pub fn record(&mut self, id: &RowId, success: bool, message: Option<String>) {
        let state = if success {
            OutcomeState::Success
        } else {
            OutcomeState::Failed
        };
        self.outcomes
            .insert(id.clone(), RowOutcome { state, message });
    }

    pub fn mark_unprocessed<'a>(&mut self, ids: impl IntoIterator<Item = &'a RowId>) {
        for id in ids {
            self.outcomes.insert(id.clone(), RowOutcome::default());
        }
    }
}
