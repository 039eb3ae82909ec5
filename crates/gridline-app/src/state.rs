// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

use crate::{Operator, RowId, SortSpec, ToolTab};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableStatus {
    #[default]
    Idle,
    /// A fetch is outstanding.
    Updating,
    /// A mass operation is working through its queue.
    Running,
}

impl TableStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Updating => "updating",
            Self::Running => "running",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableCommand {
    SortBy(String),
    MoveColumn { from: usize, to: usize },
    SetColumnVisible { column: String, visible: bool },
    OpenColumnEditor,
    ToggleEditorColumn(usize),
    MoveEditorColumn { from: usize, to: usize },
    SelectAllEditorColumns,
    ResetEditorColumns,
    SaveColumnEditor,
    CloseColumnEditor,
    SetFiltersEnabled(bool),
    SetFiltersReverse(bool),
    ApplyPreset(String),
    AddFilterTerm,
    RemoveFilterTerm(usize),
    ClearFilterTerms,
    ToggleFilterTerm(usize),
    SetFilterColumn { index: usize, column: String },
    SetFilterOperator { index: usize, operator: Operator },
    SetFilterValue { index: usize, value: String },
    SwitchTab(ToolTab),
    ToggleRow(RowId),
    SelectAll,
    SelectNone,
    InvertSelection,
    DeselectSuccessful,
    SetOperationSetting {
        operation: String,
        key: String,
        value: String,
    },
}

impl TableCommand {
    /// Commands that stay available while a mass operation runs.
    pub const fn allowed_while_running(&self) -> bool {
        matches!(
            self,
            Self::ToggleRow(_)
                | Self::SelectAll
                | Self::SelectNone
                | Self::InvertSelection
                | Self::DeselectSuccessful
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEvent {
    ReloadStarted { fields: Vec<String> },
    Reloaded { rows: usize },
    ReloadFailed(String),
    ReloadNeeded,
    RowsChanged { visible: usize, total: usize },
    SortChanged(SortSpec),
    ColumnsChanged(Vec<String>),
    ColumnEditorOpened,
    ColumnEditorChanged,
    ColumnEditorClosed,
    FiltersChanged,
    TabChanged(ToolTab),
    SelectionChanged { selected: usize },
    OperationStarted { operation: String, total: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("the table is {}; try again when it is idle", .0.as_str())]
    Busy(TableStatus),
    #[error("at least one column must stay visible")]
    LastColumn,
    #[error("unknown column {0:?}")]
    UnknownColumn(String),
    #[error("no column at position {0}")]
    NoSuchPosition(usize),
    #[error("no filter term at position {0}")]
    NoSuchTerm(usize),
    #[error("unknown filter preset {0:?}")]
    UnknownPreset(String),
    #[error("unknown operation {0:?}")]
    UnknownOperation(String),
    #[error("no rows are selected")]
    EmptySelection,
    #[error("operation {operation:?} cannot start: {message}")]
    OperationRejected { operation: String, message: String },
    #[error("invalid setting for {operation:?}: {message}")]
    InvalidSetting { operation: String, message: String },
    #[error("the column editor is not open")]
    EditorClosed,
    #[error("no reload is in progress")]
    NotUpdating,
    #[error("no mass operation is running")]
    NotRunning,
}
