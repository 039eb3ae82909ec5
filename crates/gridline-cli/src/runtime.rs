// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use gridline_app::{
    ControllerConfig, DataSource, ExportScope, MassOperation, OperationRegistry, RowId,
    RunSummary, SettingsRepository, StepOutcome, TableCommand, TableController, TableEvent,
};
use gridline_http::{HttpBatchOperation, HttpItemOperation};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Config;

pub fn build_operations(config: &Config) -> Result<OperationRegistry> {
    let timeout = config.source_timeout()?;
    let mut registry = OperationRegistry::new();
    for operation in &config.operations {
        let title = operation.title.as_deref().unwrap_or(&operation.id);
        let settings: Vec<&str> = operation.settings.iter().map(String::as_str).collect();
        let entry = if operation.single_shot.unwrap_or(false) {
            let handler = HttpBatchOperation::new(&operation.url, timeout)
                .with_context(|| format!("operation {:?}", operation.id))?
                .with_settings(&settings);
            MassOperation::single_shot(&operation.id, title, handler)
        } else {
            let handler = HttpItemOperation::new(&operation.url, timeout)
                .with_context(|| format!("operation {:?}", operation.id))?
                .with_settings(&settings);
            MassOperation::per_item(&operation.id, title, handler)
        };
        registry.register(entry)?;
    }
    Ok(registry)
}

pub fn open_table(
    config: &Config,
    repository: Box<dyn SettingsRepository>,
) -> Result<TableController> {
    let registry = config.registry()?;
    let presets = config.presets_for(&registry)?;
    let mut controller_config = ControllerConfig::new(&config.instance());
    controller_config.utc_offset = config.utc_offset()?;
    controller_config.presets = presets;
    Ok(TableController::new(
        registry,
        build_operations(config)?,
        repository,
        controller_config,
    ))
}

/// Reloads once. A failed fetch becomes an error carrying the banner text.
pub fn reload(table: &mut TableController, source: &mut dyn DataSource) -> Result<usize> {
    let events = table.reload(source)?;
    if events
        .iter()
        .any(|event| matches!(event, TableEvent::ReloadFailed(_)))
    {
        let banner = table.banner().unwrap_or("could not load rows");
        bail!("{banner}");
    }
    Ok(table.rows().len())
}

pub fn apply_preset(table: &mut TableController, name: &str) -> Result<()> {
    table.dispatch(TableCommand::ApplyPreset(name.to_owned()))?;
    Ok(())
}

pub fn parse_ids(raw: &str) -> Result<Vec<RowId>> {
    let ids: Vec<RowId> = raw.split(',').filter_map(RowId::parse).collect();
    if ids.is_empty() {
        bail!("--ids needs at least one row id, for example --ids 4,7,12");
    }
    Ok(ids)
}

/// Replaces the selection with `ids`. Every id must be loaded.
pub fn select_ids(table: &mut TableController, ids: &[RowId]) -> Result<usize> {
    if let Some(missing) = ids.iter().find(|id| table.row(id).is_none()) {
        bail!("row {missing} is not in the loaded data");
    }
    table.dispatch(TableCommand::SelectNone)?;
    for id in ids {
        if !table.selection().is_selected(id) {
            table.dispatch(TableCommand::ToggleRow(id.clone()))?;
        }
    }
    Ok(table.selection().len())
}

pub fn parse_setting(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("--set expects key=value, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("--set expects key=value, got {raw:?}");
    }
    Ok((key.to_owned(), value.to_owned()))
}

pub fn run_operation(
    table: &mut TableController,
    operation: &str,
    settings: &[(String, String)],
) -> Result<RunSummary> {
    for (key, value) in settings {
        table.dispatch(TableCommand::SetOperationSetting {
            operation: operation.to_owned(),
            key: key.clone(),
            value: value.clone(),
        })?;
    }

    table.start_mass_operation(operation)?;
    loop {
        match table.step_mass_operation()? {
            StepOutcome::Running(progress) => {
                debug!(
                    operation,
                    processed = progress.processed,
                    total = progress.total,
                    "operation progress"
                );
            }
            StepOutcome::Finished(summary) => {
                info!(
                    operation,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    "operation finished"
                );
                return Ok(summary);
            }
        }
    }
}

/// One line per processed row: id, outcome, and the handler's message.
pub fn outcome_report(table: &TableController, ids: &[RowId]) -> Vec<String> {
    ids.iter()
        .map(|id| match table.selection().outcome(id) {
            Some(outcome) => match &outcome.message {
                Some(message) => format!("{id}\t{}\t{message}", outcome.state.as_str()),
                None => format!("{id}\t{}", outcome.state.as_str()),
            },
            None => format!("{id}\tunprocessed"),
        })
        .collect()
}

/// Writes the CSV. A directory target gets a timestamped file name.
pub fn export_to(table: &TableController, target: &Path, scope: ExportScope) -> Result<PathBuf> {
    let path = if target.is_dir() {
        target.join(table.export_file_name())
    } else {
        target.to_path_buf()
    };
    let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let written = table.export_csv(&mut writer, scope)?;
    writer
        .flush()
        .with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), rows = written, scope = scope.as_str(), "exported rows");
    Ok(path)
}
