// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info, warn};

use crate::{
    Collator, ColumnEditor, ColumnLayout, ColumnRegistry, ControlError, ExportScope,
    FilterContext, FilterEditor, FilterPreset, FilterTerm, GestureOutcome, HeaderBox,
    HeaderGesture, LayoutSettings, MassRun, OperationRegistry, Progress, RawRecord, RowId,
    RunSummary, Selection, SettingsRepository, SettingsStore, SortSpec, TableCommand, TableEvent,
    TableStatus, TermStatus, ToolTab, TransformOptions, WorkingRow, row_passes, run_order,
    sort_indices, transform_records, write_csv,
};

/// Where rows come from. `fields` lists the record keys the table needs.
pub trait DataSource {
    fn fetch(&mut self, fields: &[String]) -> Result<Vec<RawRecord>>;
}

pub type Clock = fn() -> OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Prefix for persisted settings keys.
    pub instance: String,
    pub utc_offset: UtcOffset,
    pub presets: Vec<FilterPreset>,
}

impl ControllerConfig {
    pub fn new(instance: &str) -> Self {
        Self {
            instance: instance.to_owned(),
            utc_offset: UtcOffset::UTC,
            presets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Running(Progress),
    Finished(RunSummary),
}

pub struct TableController {
    registry: ColumnRegistry,
    operations: OperationRegistry,
    store: SettingsStore,
    config: ControllerConfig,
    clock: Clock,
    collator: Collator,

    layout: ColumnLayout,
    sort: SortSpec,
    tab: ToolTab,
    filters_enabled: bool,
    filters_reverse: bool,
    filters: FilterEditor,
    column_editor: Option<ColumnEditor>,
    gesture: HeaderGesture,

    status: TableStatus,
    banner: Option<String>,
    loaded: bool,
    needs_reload: bool,
    pending_fields: Vec<String>,
    fetched: BTreeSet<String>,
    transformed: Vec<String>,
    records: Vec<RawRecord>,
    rows: Vec<WorkingRow>,
    positions: HashMap<RowId, usize>,
    visible: Vec<usize>,

    selection: Selection,
    run: Option<MassRun>,
    last_summary: Option<RunSummary>,
}

impl TableController {
    pub fn new(
        registry: ColumnRegistry,
        operations: OperationRegistry,
        repository: Box<dyn SettingsRepository>,
        config: ControllerConfig,
    ) -> Self {
        let mut store = SettingsStore::new(repository, &config.instance);
        let settings = store.load_layout(&registry);
        let terms = store.load_filters(&registry);
        let layout = ColumnLayout::from_keys(&registry, &settings.columns);

        Self {
            registry,
            operations,
            store,
            config,
            clock: OffsetDateTime::now_utc,
            collator: Collator::new(),
            layout,
            sort: settings.sorting,
            tab: settings.current_tab,
            filters_enabled: settings.filters_enabled,
            filters_reverse: settings.filters_reverse,
            filters: FilterEditor::new(terms),
            column_editor: None,
            gesture: HeaderGesture::new(),
            status: TableStatus::Idle,
            banner: None,
            loaded: false,
            needs_reload: true,
            pending_fields: Vec::new(),
            fetched: BTreeSet::new(),
            transformed: Vec::new(),
            records: Vec::new(),
            rows: Vec::new(),
            positions: HashMap::new(),
            visible: Vec::new(),
            selection: Selection::new(),
            run: None,
            last_summary: None,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &ColumnRegistry {
        &self.registry
    }

    pub fn instance(&self) -> &str {
        &self.config.instance
    }

    pub fn status(&self) -> TableStatus {
        self.status
    }

    /// Message from the last failed reload, until a reload succeeds.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn needs_reload(&self) -> bool {
        self.needs_reload
    }

    pub fn visible_columns(&self) -> &[String] {
        self.layout.visible()
    }

    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    pub fn tab(&self) -> ToolTab {
        self.tab
    }

    pub fn filters_enabled(&self) -> bool {
        self.filters_enabled
    }

    pub fn filters_reverse(&self) -> bool {
        self.filters_reverse
    }

    pub fn filter_terms(&self) -> &[FilterTerm] {
        self.filters.terms()
    }

    pub fn filter_statuses(&mut self) -> Vec<TermStatus> {
        let context = self.filter_context();
        self.filters.statuses(&self.registry, context)
    }

    pub fn presets(&self) -> &[FilterPreset] {
        &self.config.presets
    }

    pub fn column_editor(&self) -> Option<&ColumnEditor> {
        self.column_editor.as_ref()
    }

    pub fn gesture(&self) -> &HeaderGesture {
        &self.gesture
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn operations(&self) -> Vec<(&str, &str)> {
        self.operations.entries()
    }

    pub fn progress(&self) -> Option<Progress> {
        self.run.as_ref().map(MassRun::progress)
    }

    pub fn last_summary(&self) -> Option<&RunSummary> {
        self.last_summary.as_ref()
    }

    /// Rows passing the filter, in screen order.
    pub fn visible_rows(&self) -> impl Iterator<Item = &WorkingRow> + '_ {
        self.visible.iter().map(|index| &self.rows[*index])
    }

    pub fn visible_ids(&self) -> Vec<RowId> {
        self.visible_rows().map(|row| row.id.clone()).collect()
    }

    /// Every loaded row in fetch order.
    pub fn rows(&self) -> &[WorkingRow] {
        &self.rows
    }

    pub fn row(&self, id: &RowId) -> Option<&WorkingRow> {
        self.positions.get(id).map(|index| &self.rows[*index])
    }

    pub fn layout_settings(&self) -> LayoutSettings {
        LayoutSettings {
            columns: self.layout.visible().to_vec(),
            sorting: self.sort.clone(),
            current_tab: self.tab,
            filters_enabled: self.filters_enabled,
            filters_reverse: self.filters_reverse,
            version: crate::SETTINGS_VERSION,
        }
    }

    /// Record keys the next fetch asks for: visible, sort and filter columns
    /// plus whatever computed columns read.
    pub fn fields_to_fetch(&self) -> Vec<String> {
        let columns = self.working_columns();
        self.registry.source_keys(columns.iter().map(String::as_str))
    }

    fn working_columns(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        let candidates = self
            .layout
            .visible()
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.sort.column.as_str()))
            .chain(self.filters.columns());
        for key in candidates {
            if self.registry.contains(key) && !keys.iter().any(|existing| existing == key) {
                keys.push(key.to_owned());
            }
        }
        keys
    }

    fn filter_context(&self) -> FilterContext {
        FilterContext {
            now: (self.clock)(),
            utc_offset: self.config.utc_offset,
        }
    }

    fn ensure_idle(&self) -> Result<(), ControlError> {
        match self.status {
            TableStatus::Idle => Ok(()),
            status => Err(ControlError::Busy(status)),
        }
    }

    pub fn begin_reload(&mut self) -> Result<Vec<String>, ControlError> {
        self.ensure_idle()?;
        let fields = self.fields_to_fetch();
        self.status = TableStatus::Updating;
        self.gesture.cancel();
        self.pending_fields = fields.clone();
        info!(instance = %self.config.instance, fields = fields.len(), "reload started");
        Ok(fields)
    }

    /// Applies the outcome of the fetch started by [`Self::begin_reload`].
    /// A failed fetch keeps the previous rows and raises the banner.
    pub fn complete_reload(
        &mut self,
        result: Result<Vec<RawRecord>>,
    ) -> Result<Vec<TableEvent>, ControlError> {
        if self.status != TableStatus::Updating {
            return Err(ControlError::NotUpdating);
        }
        self.status = TableStatus::Idle;
        let fields = std::mem::take(&mut self.pending_fields);

        let records = match result {
            Ok(records) => records,
            Err(error) => {
                let message = format!("{error:#}");
                warn!(instance = %self.config.instance, error = %message, "reload failed; keeping previous rows");
                self.banner = Some(format!("could not load rows: {message}"));
                return Ok(vec![TableEvent::ReloadFailed(message)]);
            }
        };

        self.records = records;
        self.fetched = fields.into_iter().collect();
        self.loaded = true;
        self.needs_reload = false;
        self.banner = None;
        self.filters.invalidate();
        self.rebuild_rows();

        let existing: BTreeSet<RowId> = self.positions.keys().cloned().collect();
        let pruned = self.selection.prune(&existing);
        info!(instance = %self.config.instance, rows = self.rows.len(), "reload finished");

        let mut events = vec![
            TableEvent::Reloaded {
                rows: self.rows.len(),
            },
            self.refresh_view(),
        ];
        if pruned > 0 {
            debug!(pruned, "dropped selection of vanished rows");
            events.push(TableEvent::SelectionChanged {
                selected: self.selection.len(),
            });
        }
        Ok(events)
    }

    pub fn reload(&mut self, source: &mut dyn DataSource) -> Result<Vec<TableEvent>, ControlError> {
        let fields = self.begin_reload()?;
        let result = source.fetch(&fields);
        let mut events = vec![TableEvent::ReloadStarted { fields }];
        events.extend(self.complete_reload(result)?);
        Ok(events)
    }

    fn rebuild_rows(&mut self) {
        let columns = self.working_columns();
        let options = TransformOptions {
            utc_offset: self.config.utc_offset,
        };
        self.rows = transform_records(&self.records, &columns, &self.registry, options);
        self.positions = self
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| (row.id.clone(), index))
            .collect();
        self.transformed = columns;
    }

    fn refresh_view(&mut self) -> TableEvent {
        let filters = if self.filters_enabled {
            let context = self.filter_context();
            self.filters.effective(&self.registry, context)
        } else {
            Vec::new()
        };
        let reverse = self.filters_enabled && self.filters_reverse;

        let mut visible: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row_passes(row, &filters, reverse))
            .map(|(index, _)| index)
            .collect();
        sort_indices(&self.rows, &mut visible, &self.sort, &self.collator);
        self.visible = visible;

        TableEvent::RowsChanged {
            visible: self.visible.len(),
            total: self.rows.len(),
        }
    }

    /// Re-derives cells when the needed column set changed and flags a
    /// reload when the last fetch did not carry a needed key.
    fn sync_columns(&mut self) -> Vec<TableEvent> {
        let mut events = Vec::new();
        if self.working_columns() != self.transformed {
            self.rebuild_rows();
        }
        if self.loaded && !self.needs_reload {
            let missing = self
                .fields_to_fetch()
                .iter()
                .any(|key| !self.fetched.contains(key));
            if missing {
                self.needs_reload = true;
                events.push(TableEvent::ReloadNeeded);
            }
        }
        events
    }

    fn persist_layout(&mut self) {
        let settings = self.layout_settings();
        if let Err(error) = self.store.save_layout(&settings) {
            warn!(error = %format!("{error:#}"), "cannot persist layout settings");
        }
    }

    fn persist_filters(&mut self) {
        if let Err(error) = self.store.save_filters(self.filters.terms()) {
            warn!(error = %format!("{error:#}"), "cannot persist filter terms");
        }
    }

    pub fn dispatch(&mut self, command: TableCommand) -> Result<Vec<TableEvent>, ControlError> {
        match self.status {
            TableStatus::Idle => {}
            TableStatus::Running if command.allowed_while_running() => {}
            status => return Err(ControlError::Busy(status)),
        }

        match command {
            TableCommand::SortBy(column) => self.sort_by(&column),
            TableCommand::MoveColumn { from, to } => self.move_column(from, to),
            TableCommand::SetColumnVisible { column, visible } => {
                self.set_column_visible(&column, visible)
            }
            TableCommand::OpenColumnEditor => {
                self.column_editor = Some(ColumnEditor::open(&self.registry, &self.layout));
                Ok(vec![TableEvent::ColumnEditorOpened])
            }
            TableCommand::ToggleEditorColumn(index) => {
                if !self.open_editor()?.toggle(index) {
                    return Err(ControlError::NoSuchPosition(index));
                }
                Ok(vec![TableEvent::ColumnEditorChanged])
            }
            TableCommand::MoveEditorColumn { from, to } => {
                if !self.open_editor()?.move_entry(from, to) {
                    return Err(ControlError::NoSuchPosition(from.max(to)));
                }
                Ok(vec![TableEvent::ColumnEditorChanged])
            }
            TableCommand::SelectAllEditorColumns => {
                self.open_editor()?.select_all();
                Ok(vec![TableEvent::ColumnEditorChanged])
            }
            TableCommand::ResetEditorColumns => {
                let registry = &self.registry;
                self.column_editor
                    .as_mut()
                    .ok_or(ControlError::EditorClosed)?
                    .reset(registry);
                Ok(vec![TableEvent::ColumnEditorChanged])
            }
            TableCommand::SaveColumnEditor => self.save_column_editor(),
            TableCommand::CloseColumnEditor => {
                if self.column_editor.take().is_none() {
                    return Ok(Vec::new());
                }
                Ok(vec![TableEvent::ColumnEditorClosed])
            }
            TableCommand::SetFiltersEnabled(enabled) => {
                self.filters_enabled = enabled;
                self.persist_layout();
                Ok(vec![TableEvent::FiltersChanged, self.refresh_view()])
            }
            TableCommand::SetFiltersReverse(reverse) => {
                self.filters_reverse = reverse;
                self.persist_layout();
                Ok(vec![TableEvent::FiltersChanged, self.refresh_view()])
            }
            TableCommand::ApplyPreset(name) => {
                let preset = self
                    .config
                    .presets
                    .iter()
                    .find(|preset| preset.name == name)
                    .ok_or(ControlError::UnknownPreset(name))?;
                self.filters.replace(preset.terms.clone());
                Ok(self.filters_edited())
            }
            TableCommand::AddFilterTerm => {
                self.filters.add(&self.registry);
                Ok(self.filters_edited())
            }
            TableCommand::RemoveFilterTerm(index) => {
                self.filters
                    .remove(index)
                    .ok_or(ControlError::NoSuchTerm(index))?;
                Ok(self.filters_edited())
            }
            TableCommand::ClearFilterTerms => {
                self.filters.clear();
                Ok(self.filters_edited())
            }
            TableCommand::ToggleFilterTerm(index) => {
                self.filters
                    .toggle_active(index)
                    .ok_or(ControlError::NoSuchTerm(index))?;
                Ok(self.filters_edited())
            }
            TableCommand::SetFilterColumn { index, column } => {
                let definition = self
                    .registry
                    .get(&column)
                    .ok_or_else(|| ControlError::UnknownColumn(column.clone()))?;
                if !self.filters.set_column(index, definition) {
                    return Err(ControlError::NoSuchTerm(index));
                }
                Ok(self.filters_edited())
            }
            TableCommand::SetFilterOperator { index, operator } => {
                if !self.filters.set_operator(index, operator) {
                    return Err(ControlError::NoSuchTerm(index));
                }
                Ok(self.filters_edited())
            }
            TableCommand::SetFilterValue { index, value } => {
                if !self.filters.set_value(index, &value) {
                    return Err(ControlError::NoSuchTerm(index));
                }
                Ok(self.filters_edited())
            }
            TableCommand::SwitchTab(tab) => {
                if tab == self.tab {
                    return Ok(Vec::new());
                }
                self.tab = tab;
                self.persist_layout();
                Ok(vec![TableEvent::TabChanged(tab)])
            }
            TableCommand::ToggleRow(id) => {
                if !self.positions.contains_key(&id) {
                    return Ok(Vec::new());
                }
                self.selection.toggle(&id);
                Ok(self.selection_changed())
            }
            TableCommand::SelectAll => {
                let ids = self.visible_ids();
                self.selection.select_all(&ids);
                Ok(self.selection_changed())
            }
            TableCommand::SelectNone => {
                self.selection.select_none();
                Ok(self.selection_changed())
            }
            TableCommand::InvertSelection => {
                let ids = self.visible_ids();
                self.selection.invert(&ids);
                Ok(self.selection_changed())
            }
            TableCommand::DeselectSuccessful => {
                self.selection.deselect_successful();
                Ok(self.selection_changed())
            }
            TableCommand::SetOperationSetting {
                operation,
                key,
                value,
            } => {
                let entry = self
                    .operations
                    .get_mut(&operation)
                    .ok_or_else(|| ControlError::UnknownOperation(operation.clone()))?;
                entry
                    .handler
                    .set_setting(&key, &value)
                    .map_err(|error| ControlError::InvalidSetting {
                        operation,
                        message: format!("{error:#}"),
                    })?;
                Ok(Vec::new())
            }
        }
    }

    fn open_editor(&mut self) -> Result<&mut ColumnEditor, ControlError> {
        self.column_editor.as_mut().ok_or(ControlError::EditorClosed)
    }

    fn selection_changed(&self) -> Vec<TableEvent> {
        vec![TableEvent::SelectionChanged {
            selected: self.selection.len(),
        }]
    }

    fn filters_edited(&mut self) -> Vec<TableEvent> {
        self.persist_filters();
        let mut events = vec![TableEvent::FiltersChanged];
        events.extend(self.sync_columns());
        events.push(self.refresh_view());
        events
    }

    fn sort_by(&mut self, column: &str) -> Result<Vec<TableEvent>, ControlError> {
        let definition = self
            .registry
            .get(column)
            .ok_or_else(|| ControlError::UnknownColumn(column.to_owned()))?;
        let Some(sort) = self.sort.clicked(definition) else {
            return Ok(Vec::new());
        };
        self.sort = sort;
        self.persist_layout();

        let mut events = vec![TableEvent::SortChanged(self.sort.clone())];
        events.extend(self.sync_columns());
        events.push(self.refresh_view());
        Ok(events)
    }

    fn move_column(&mut self, from: usize, to: usize) -> Result<Vec<TableEvent>, ControlError> {
        let len = self.layout.visible().len();
        if from >= len || to >= len {
            return Err(ControlError::NoSuchPosition(from.max(to)));
        }
        if !self.layout.move_column(from, to) {
            return Ok(Vec::new());
        }
        self.persist_layout();
        Ok(vec![TableEvent::ColumnsChanged(self.layout.visible().to_vec())])
    }

    fn set_column_visible(
        &mut self,
        column: &str,
        visible: bool,
    ) -> Result<Vec<TableEvent>, ControlError> {
        if !self.registry.contains(column) {
            return Err(ControlError::UnknownColumn(column.to_owned()));
        }
        let mut keys = self.layout.visible().to_vec();
        let shown = keys.iter().any(|key| key == column);
        match (visible, shown) {
            (true, true) | (false, false) => return Ok(Vec::new()),
            (true, false) => keys.push(column.to_owned()),
            (false, true) => {
                if keys.len() == 1 {
                    return Err(ControlError::LastColumn);
                }
                keys.retain(|key| key != column);
            }
        }
        self.apply_columns(keys)
    }

    fn save_column_editor(&mut self) -> Result<Vec<TableEvent>, ControlError> {
        let editor = self.column_editor.as_ref().ok_or(ControlError::EditorClosed)?;
        if !editor.can_save() {
            return Err(ControlError::LastColumn);
        }
        let keys = editor.checked_keys();
        self.column_editor = None;
        let mut events = self.apply_columns(keys)?;
        events.push(TableEvent::ColumnEditorClosed);
        Ok(events)
    }

    fn apply_columns(&mut self, keys: Vec<String>) -> Result<Vec<TableEvent>, ControlError> {
        self.layout
            .set_visible(keys)
            .map_err(|_| ControlError::LastColumn)?;
        self.persist_layout();

        let mut events = vec![TableEvent::ColumnsChanged(self.layout.visible().to_vec())];
        events.extend(self.sync_columns());
        events.push(self.refresh_view());
        Ok(events)
    }

    /// Starts tracking a press on the header cell at visible position
    /// `column`. `boxes` are the header extents at press time.
    pub fn header_press(
        &mut self,
        column: usize,
        x: f64,
        y: f64,
        boxes: Vec<HeaderBox>,
    ) -> Result<(), ControlError> {
        self.ensure_idle()?;
        let key = self
            .layout
            .visible()
            .get(column)
            .ok_or(ControlError::NoSuchPosition(column))?;
        let sortable = self
            .registry
            .get(key)
            .is_some_and(|definition| definition.is_sortable());
        self.gesture.press(column, sortable, x, y, boxes);
        Ok(())
    }

    /// Returns the live insertion marker while dragging.
    pub fn header_move(&mut self, x: f64, y: f64) -> Option<usize> {
        self.gesture.move_to(x, y)
    }

    pub fn header_release(&mut self, x: f64, y: f64) -> Result<Vec<TableEvent>, ControlError> {
        let outcome = self.gesture.release(x, y);
        let result = match outcome {
            GestureOutcome::Nothing => Ok(Vec::new()),
            GestureOutcome::SortToggle { column } => {
                match self.layout.visible().get(column).cloned() {
                    Some(key) => self.sort_by(&key),
                    None => Ok(Vec::new()),
                }
            }
            GestureOutcome::Reorder { from, to } => self.move_column(from, to),
        };
        self.gesture.settle();
        result
    }

    pub fn header_cancel(&mut self) {
        self.gesture.cancel();
    }

    /// Validates and starts `operation` over the selection. Visible rows go
    /// first in screen order, then selected rows hidden by the filter.
    pub fn start_mass_operation(
        &mut self,
        operation: &str,
    ) -> Result<Vec<TableEvent>, ControlError> {
        self.ensure_idle()?;
        if self.operations.get(operation).is_none() {
            return Err(ControlError::UnknownOperation(operation.to_owned()));
        }
        if self.selection.is_empty() {
            return Err(ControlError::EmptySelection);
        }

        let queue = run_order(&self.visible_ids(), &self.selection);
        let rejected = |error: anyhow::Error| ControlError::OperationRejected {
            operation: operation.to_owned(),
            message: format!("{error:#}"),
        };
        let entry = self
            .operations
            .get_mut(operation)
            .ok_or_else(|| ControlError::UnknownOperation(operation.to_owned()))?;
        entry.handler.validate().map_err(rejected)?;
        entry.handler.start().map_err(rejected)?;

        self.selection.mark_unprocessed(&queue);
        let total = queue.len();
        self.run = Some(MassRun::new(operation, queue));
        self.status = TableStatus::Running;
        self.gesture.cancel();
        Ok(vec![TableEvent::OperationStarted {
            operation: operation.to_owned(),
            total,
        }])
    }

    /// Performs one handler call of the running operation.
    pub fn step_mass_operation(&mut self) -> Result<StepOutcome, ControlError> {
        if self.status != TableStatus::Running {
            return Err(ControlError::NotRunning);
        }
        let Self {
            operations,
            rows,
            positions,
            selection,
            run,
            ..
        } = &mut *self;
        let Some(active) = run.as_mut() else {
            return Err(ControlError::NotRunning);
        };
        let entry = operations
            .get_mut(active.operation())
            .ok_or_else(|| ControlError::UnknownOperation(active.operation().to_owned()))?;

        let (rows, positions) = (&*rows, &*positions);
        let progress = active.step(
            &mut entry.handler,
            move |id| positions.get(id).map(|index| &rows[*index]),
            selection,
        );
        if !active.is_done() {
            return Ok(StepOutcome::Running(progress));
        }

        if let Err(error) = entry.handler.finish() {
            warn!(operation = %active.operation(), error = %format!("{error:#}"), "operation finish hook failed");
        }
        let summary = active.summary();
        *run = None;
        self.status = TableStatus::Idle;
        self.last_summary = Some(summary.clone());
        Ok(StepOutcome::Finished(summary))
    }

    /// Starts `operation` and steps it to completion.
    pub fn run_mass_operation(&mut self, operation: &str) -> Result<RunSummary, ControlError> {
        self.start_mass_operation(operation)?;
        loop {
            if let StepOutcome::Finished(summary) = self.step_mass_operation()? {
                return Ok(summary);
            }
        }
    }

    /// Writes visible columns as CSV. `All` covers every loaded row in the
    /// current sort order, `Visible` only the filtered ones.
    pub fn export_csv<W: Write>(&self, writer: W, scope: ExportScope) -> Result<usize> {
        let columns = self.layout.visible();
        match scope {
            ExportScope::Visible => write_csv(writer, columns, self.visible_rows()),
            ExportScope::All => {
                let mut order: Vec<usize> = (0..self.rows.len()).collect();
                sort_indices(&self.rows, &mut order, &self.sort, &self.collator);
                write_csv(writer, columns, order.iter().map(|index| &self.rows[*index]))
            }
        }
    }

    pub fn export_file_name(&self) -> String {
        crate::export_file_name(&self.config.instance, (self.clock)())
    }
}

impl std::fmt::Debug for TableController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableController")
            .field("instance", &self.config.instance)
            .field("status", &self.status)
            .field("columns", &self.layout.visible())
            .field("sort", &self.sort)
            .field("rows", &self.rows.len())
            .field("visible", &self.visible.len())
            .finish_non_exhaustive()
    }
}
