// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use gridline_app::{
    ControllerConfig, FilterTerm, LayoutSettings, OperationRegistry, Operator, SettingsStore,
    SortDirection, TableCommand, TableController, ToolTab,
};
use gridline_db::{SqliteRepository, validate_db_path};
use gridline_testkit::{fixture_now, people_registry, temp_db_path};

fn open_table(path: &std::path::Path) -> Result<TableController> {
    let repository = SqliteRepository::open(path)?;
    Ok(TableController::new(
        people_registry()?,
        OperationRegistry::new(),
        Box::new(repository),
        ControllerConfig::new("people"),
    )
    .with_clock(fixture_now))
}

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("").is_err());
    assert!(validate_db_path("/tmp/gridline.db").is_ok());
}

#[test]
fn open_creates_missing_parent_directories() -> Result<()> {
    let (dir, _) = temp_db_path()?;
    let nested = dir.path().join("a").join("b").join("settings.db");
    SqliteRepository::open(&nested)?;
    assert!(nested.exists());
    Ok(())
}

#[test]
fn layout_round_trips_through_the_file() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    {
        let mut table = open_table(&path)?;
        table.dispatch(TableCommand::SetColumnVisible {
            column: "admin".to_owned(),
            visible: true,
        })?;
        table.dispatch(TableCommand::SortBy("age".to_owned()))?;
        table.dispatch(TableCommand::SortBy("age".to_owned()))?;
        table.dispatch(TableCommand::SwitchTab(ToolTab::MassOperations))?;
    }

    let table = open_table(&path)?;
    assert_eq!(table.visible_columns(), ["name", "age", "admin"]);
    assert_eq!(table.sort().column, "age");
    assert_eq!(table.sort().direction, SortDirection::Descending);
    assert_eq!(table.tab(), ToolTab::MassOperations);
    Ok(())
}

#[test]
fn version_one_payload_is_migrated() -> Result<()> {
    let registry = people_registry()?;
    let repository = SqliteRepository::open_memory()?;
    repository.put(
        "people.settings",
        r#"{"columns": ["username", "age"], "sortColumn": "age", "sortDirection": "desc"}"#,
    )?;

    let mut store = SettingsStore::new(Box::new(repository), "people");
    let settings = store.load_layout(&registry);
    assert_eq!(settings.columns, ["username", "age"]);
    assert_eq!(settings.sorting.column, "age");
    assert_eq!(settings.sorting.direction, SortDirection::Descending);
    assert_eq!(settings.version, gridline_app::SETTINGS_VERSION);
    Ok(())
}

#[test]
fn unreadable_payload_is_replaced_in_place() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    let registry = people_registry()?;
    SqliteRepository::open(&path)?.put("people.settings", "not json")?;

    let mut store = SettingsStore::new(Box::new(SqliteRepository::open(&path)?), "people");
    let settings = store.load_layout(&registry);
    assert_eq!(settings, LayoutSettings::defaults(&registry));

    let stored = SqliteRepository::open(&path)?
        .get("people.settings")?
        .unwrap_or_default();
    assert_eq!(LayoutSettings::decode(&stored, &registry), Some(settings));
    Ok(())
}

#[test]
fn filter_terms_persist_and_instances_are_isolated() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    let registry = people_registry()?;
    let terms = vec![
        FilterTerm::new("age", Operator::Ge, "18"),
        FilterTerm::new("last_login", Operator::Lt, "-30d"),
    ];
    SettingsStore::new(Box::new(SqliteRepository::open(&path)?), "people")
        .save_filters(&terms)?;

    let mut same = SettingsStore::new(Box::new(SqliteRepository::open(&path)?), "people");
    assert_eq!(same.load_filters(&registry), terms);

    let mut other = SettingsStore::new(Box::new(SqliteRepository::open(&path)?), "groups");
    assert!(other.load_filters(&registry).is_empty());

    let repository = SqliteRepository::open(&path)?;
    assert_eq!(repository.clear_instance("people")?, 1);
    assert!(repository.keys()?.is_empty());
    Ok(())
}
