// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use gridline_app::{
    Collator, ControlError, ControllerConfig, ExportScope, FilterPreset, FilterTerm, ItemResult,
    MassOperation, MemoryRepository, OperationRegistry, Operator, OutcomeState, RowId,
    TableCommand, TableController, TableEvent, TermStatus,
};
use gridline_testkit::{
    RecordFaker, RecordingBatch, RecordingProcessor, ScriptedSource, fixture_now,
    people_registry, sample_people,
};
use serde_json::{Value, json};
use std::cmp::Ordering;

fn controller_with(
    repository: &MemoryRepository,
    operations: OperationRegistry,
    presets: Vec<FilterPreset>,
) -> Result<TableController> {
    let mut config = ControllerConfig::new("people");
    config.presets = presets;
    Ok(TableController::new(
        people_registry()?,
        operations,
        Box::new(repository.clone()),
        config,
    )
    .with_clock(fixture_now))
}

fn controller(repository: &MemoryRepository) -> Result<TableController> {
    controller_with(repository, OperationRegistry::new(), Vec::new())
}

fn ids(values: &[i64]) -> Vec<RowId> {
    values.iter().copied().map(RowId::from).collect()
}

fn set_term(table: &mut TableController, column: &str, operator: Operator, value: &str) -> Result<()> {
    table.dispatch(TableCommand::AddFilterTerm)?;
    let index = table.filter_terms().len() - 1;
    table.dispatch(TableCommand::SetFilterColumn {
        index,
        column: column.to_owned(),
    })?;
    table.dispatch(TableCommand::SetFilterOperator { index, operator })?;
    table.dispatch(TableCommand::SetFilterValue {
        index,
        value: value.to_owned(),
    })?;
    Ok(())
}

#[test]
fn names_sort_with_collation_and_adults_filter() -> Result<()> {
    let repository = MemoryRepository::new();
    let mut table = controller(&repository)?;
    table.reload(&mut ScriptedSource::new().respond(sample_people()))?;
    assert_eq!(table.visible_ids(), ids(&[2, 1]));

    set_term(&mut table, "age", Operator::Ge, "18")?;
    assert_eq!(table.visible_ids(), ids(&[2]));
    Ok(())
}

#[test]
fn reverse_is_the_complement_of_a_single_term() -> Result<()> {
    let repository = MemoryRepository::new();
    let mut table = controller(&repository)?;
    table.reload(&mut ScriptedSource::new().respond(RecordFaker::new(3).records(40)))?;
    set_term(&mut table, "age", Operator::Lt, "40")?;

    let kept = table.visible_ids();
    table.dispatch(TableCommand::SetFiltersReverse(true))?;
    let reversed = table.visible_ids();

    assert_eq!(kept.len() + reversed.len(), 40);
    assert!(kept.iter().all(|id| !reversed.contains(id)));
    Ok(())
}

#[test]
fn reverse_applies_to_each_term() -> Result<()> {
    let repository = MemoryRepository::new();
    let mut table = controller(&repository)?;
    table.reload(&mut ScriptedSource::new().respond(vec![
        json!({"id": 1, "name": "ann", "age": 31}),
        json!({"id": 2, "name": "bob", "age": 12}),
        json!({"id": 3, "name": "cy", "age": 12}),
    ]))?;
    set_term(&mut table, "name", Operator::Eq, "^ann$")?;
    set_term(&mut table, "age", Operator::Lt, "18")?;
    assert!(table.visible_ids().is_empty());

    // Rows must fail every term, not merely one of them.
    table.dispatch(TableCommand::SetFiltersReverse(true))?;
    assert!(table.visible_ids().is_empty());

    table.dispatch(TableCommand::SetFilterValue {
        index: 0,
        value: "^zed$".to_owned(),
    })?;
    table.dispatch(TableCommand::SetFilterOperator {
        index: 1,
        operator: Operator::Ge,
    })?;
    assert_eq!(table.visible_ids(), ids(&[2, 3]));
    Ok(())
}

#[test]
fn sorting_is_idempotent_and_toggles_back() -> Result<()> {
    let repository = MemoryRepository::new();
    let records = RecordFaker::new(11).records(30);
    let mut table = controller(&repository)?;
    table.reload(&mut ScriptedSource::new().respond(records.clone()))?;
    table.dispatch(TableCommand::SortBy("age".to_owned()))?;
    let first = table.visible_ids();

    table.reload(&mut ScriptedSource::new().respond(records))?;
    assert_eq!(table.visible_ids(), first);

    table.dispatch(TableCommand::SortBy("age".to_owned()))?;
    table.dispatch(TableCommand::SortBy("age".to_owned()))?;
    assert_eq!(table.visible_ids(), first);
    Ok(())
}

fn name_order(table: &TableController) -> Vec<(String, RowId)> {
    table
        .visible_rows()
        .map(|row| {
            let name = row.record.get("name").and_then(Value::as_str).unwrap_or_default();
            (name.to_owned(), row.id.clone())
        })
        .collect()
}

fn assert_collated(order: &[(String, RowId)], expected: Ordering) -> usize {
    let collator = Collator::new();
    let mut ties = 0;
    for pair in order.windows(2) {
        let ((left_name, left_id), (right_name, right_id)) = (&pair[0], &pair[1]);
        let actual = collator.compare(left_name, right_name);
        if actual == Ordering::Equal {
            ties += 1;
            assert!(left_id < right_id, "tie {left_name:?} not id ascending");
        } else {
            assert_eq!(actual, expected, "{left_name:?} placed before {right_name:?}");
        }
    }
    ties
}

#[test]
fn large_tables_sort_by_collation_then_id() -> Result<()> {
    let repository = MemoryRepository::new();
    let mut records = RecordFaker::new(29).records(200);
    let mut table = controller(&repository)?;
    table.reload(&mut ScriptedSource::new().respond(records.clone()))?;

    let ascending = name_order(&table);
    assert_eq!(ascending.len(), 200);
    let ties = assert_collated(&ascending, Ordering::Less);
    assert!(ties > 0, "200 rows drawn from 120 names must repeat some");

    records.reverse();
    table.reload(&mut ScriptedSource::new().respond(records))?;
    assert_eq!(name_order(&table), ascending);

    table.dispatch(TableCommand::SortBy("name".to_owned()))?;
    assert_collated(&name_order(&table), Ordering::Greater);

    table.dispatch(TableCommand::SortBy("name".to_owned()))?;
    assert_eq!(name_order(&table), ascending);
    Ok(())
}

#[test]
fn clicking_an_unsortable_column_changes_nothing() -> Result<()> {
    let repository = MemoryRepository::new();
    let mut table = controller(&repository)?;
    let before = table.sort().clone();
    let events = table.dispatch(TableCommand::SortBy("groups".to_owned()))?;
    assert!(events.is_empty());
    assert_eq!(table.sort(), &before);
    Ok(())
}

#[test]
fn column_editor_refuses_to_hide_everything() -> Result<()> {
    let repository = MemoryRepository::new();
    let mut table = controller(&repository)?;
    table.dispatch(TableCommand::OpenColumnEditor)?;
    table.dispatch(TableCommand::ToggleEditorColumn(0))?;
    table.dispatch(TableCommand::ToggleEditorColumn(1))?;

    let editor = table.column_editor().expect("editor is open");
    assert!(!editor.can_save());
    assert_eq!(
        table.dispatch(TableCommand::SaveColumnEditor),
        Err(ControlError::LastColumn)
    );
    assert_eq!(table.visible_columns(), ["name", "age"]);
    assert!(table.column_editor().is_some());

    table.dispatch(TableCommand::ResetEditorColumns)?;
    table.dispatch(TableCommand::ToggleEditorColumn(5))?;
    let events = table.dispatch(TableCommand::SaveColumnEditor)?;
    assert!(events.contains(&TableEvent::ColumnEditorClosed));
    assert_eq!(table.visible_columns(), ["name", "age", "admin"]);
    Ok(())
}

#[test]
fn fetch_requests_computed_requirements() -> Result<()> {
    let repository = MemoryRepository::new();
    let mut table = controller(&repository)?;
    table.dispatch(TableCommand::SetColumnVisible {
        column: "full_name".to_owned(),
        visible: true,
    })?;
    let mut source = ScriptedSource::new().respond(vec![json!({
        "id": 1, "name": "x", "first_name": "Hélène", "last_name": "Ruiz"
    })]);
    let requests = source.requests();
    table.reload(&mut source)?;

    assert_eq!(
        requests.borrow()[0],
        vec!["name", "age", "first_name", "last_name"]
    );
    let row = table.row(&RowId::from(1)).expect("row loaded");
    assert_eq!(row.display("full_name"), "Hélène Ruiz");
    Ok(())
}

#[test]
fn mass_operation_processes_visible_rows_first() -> Result<()> {
    let repository = MemoryRepository::new();
    let processor = RecordingProcessor::new().failing(&[3]);
    let calls = processor.calls();
    let (started, finished) = processor.lifecycle();
    let operations =
        OperationRegistry::new().with(MassOperation::per_item("disable", "Disable", processor))?;
    let mut table = controller_with(&repository, operations, Vec::new())?;
    table.reload(&mut ScriptedSource::new().respond(vec![
        json!({"id": 1, "name": "cy", "age": 40}),
        json!({"id": 2, "name": "ann", "age": 12}),
        json!({"id": 3, "name": "bo", "age": 50}),
    ]))?;
    for id in [1, 2, 3] {
        table.dispatch(TableCommand::ToggleRow(RowId::from(id)))?;
    }
    set_term(&mut table, "age", Operator::Ge, "18")?;
    assert_eq!(table.visible_ids(), ids(&[3, 1]));

    let summary = table.run_mass_operation("disable")?;
    assert_eq!(*calls.borrow(), ids(&[3, 1, 2]));
    assert_eq!((summary.succeeded, summary.failed), (2, 1));
    assert_eq!((*started.borrow(), *finished.borrow()), (1, 1));

    let failed = table
        .selection()
        .outcome(&RowId::from(3))
        .expect("outcome recorded");
    assert_eq!(failed.state, OutcomeState::Failed);
    assert_eq!(failed.message.as_deref(), Some("refused 3"));

    table.dispatch(TableCommand::DeselectSuccessful)?;
    assert_eq!(table.selection().ids().cloned().collect::<Vec<_>>(), ids(&[3]));
    Ok(())
}

#[test]
fn single_shot_operation_broadcasts_one_result() -> Result<()> {
    let repository = MemoryRepository::new();
    let batch = RecordingBatch::new(ItemResult::ok());
    let batches = batch.batches();
    let operations =
        OperationRegistry::new().with(MassOperation::single_shot("export", "Export", batch))?;
    let mut table = controller_with(&repository, operations, Vec::new())?;
    table.reload(&mut ScriptedSource::new().respond(sample_people()))?;
    table.dispatch(TableCommand::SelectAll)?;

    let summary = table.run_mass_operation("export")?;
    assert_eq!(batches.borrow().len(), 1);
    assert_eq!(batches.borrow()[0], ids(&[2, 1]));
    assert_eq!(summary.succeeded, 2);
    Ok(())
}

#[test]
fn rejected_validation_keeps_table_idle() -> Result<()> {
    let repository = MemoryRepository::new();
    let operations = OperationRegistry::new().with(MassOperation::per_item(
        "move",
        "Move",
        RecordingProcessor::new().rejecting("pick a target group"),
    ))?;
    let mut table = controller_with(&repository, operations, Vec::new())?;
    table.reload(&mut ScriptedSource::new().respond(sample_people()))?;
    table.dispatch(TableCommand::SelectAll)?;

    let error = table
        .start_mass_operation("move")
        .expect_err("validation should fail");
    assert_eq!(
        error,
        ControlError::OperationRejected {
            operation: "move".to_owned(),
            message: "pick a target group".to_owned(),
        }
    );
    assert!(table.progress().is_none());
    assert_eq!(
        table.start_mass_operation("missing"),
        Err(ControlError::UnknownOperation("missing".to_owned()))
    );
    Ok(())
}

#[test]
fn filters_and_layout_survive_a_restart() -> Result<()> {
    let repository = MemoryRepository::new();
    {
        let mut table = controller(&repository)?;
        set_term(&mut table, "age", Operator::Gt, "")?;
        table.dispatch(TableCommand::MoveColumn { from: 0, to: 1 })?;
        table.dispatch(TableCommand::SetFiltersEnabled(false))?;
    }

    let mut table = controller(&repository)?;
    assert_eq!(table.visible_columns(), ["age", "name"]);
    assert!(!table.filters_enabled());
    assert_eq!(
        table.filter_terms(),
        [FilterTerm::new("age", Operator::Gt, "")]
    );
    assert!(matches!(
        table.filter_statuses()[0],
        TermStatus::Invalid(_)
    ));
    Ok(())
}

#[test]
fn corrupt_settings_are_replaced_by_defaults() -> Result<()> {
    let repository = MemoryRepository::new();
    repository.insert("people.settings", "{\"version\": \"two\"}");
    let table = controller(&repository)?;
    assert_eq!(table.visible_columns(), ["name", "age"]);
    let stored = repository.get("people.settings").expect("defaults persisted");
    assert!(stored.contains("\"version\":2"));
    Ok(())
}

#[test]
fn presets_replace_terms() -> Result<()> {
    let repository = MemoryRepository::new();
    let admins = FilterPreset::new(
        "admins",
        vec![FilterTerm::new("admin", Operator::Eq, "yes")],
    );
    let mut table = controller_with(&repository, OperationRegistry::new(), vec![admins])?;
    table.reload(&mut ScriptedSource::new().respond(vec![
        json!({"id": 1, "name": "a", "admin": true}),
        json!({"id": 2, "name": "b", "admin": false}),
    ]))?;
    let events = table.dispatch(TableCommand::ApplyPreset("admins".to_owned()))?;
    assert!(events.contains(&TableEvent::ReloadNeeded));
    assert_eq!(table.visible_ids(), ids(&[1]));
    assert_eq!(
        table.dispatch(TableCommand::ApplyPreset("nobody".to_owned())),
        Err(ControlError::UnknownPreset("nobody".to_owned()))
    );
    Ok(())
}

#[test]
fn export_writes_visible_or_all_rows() -> Result<()> {
    let repository = MemoryRepository::new();
    let mut table = controller(&repository)?;
    table.reload(&mut ScriptedSource::new().respond(sample_people()))?;
    set_term(&mut table, "age", Operator::Ge, "18")?;

    let mut visible = Vec::new();
    table.export_csv(&mut visible, ExportScope::Visible)?;
    assert_eq!(String::from_utf8(visible)?, "name,age\nann,31\n");

    let mut all = Vec::new();
    table.export_csv(&mut all, ExportScope::All)?;
    assert_eq!(String::from_utf8(all)?, "name,age\nann,31\nÉmile,9\n");

    assert_eq!(table.export_file_name(), "people-20260219-123456.csv");
    Ok(())
}
