// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use gridline_app::{
    BatchProcessor, Cell, ColumnDefinition, ColumnRegistry, ColumnType, DataSource, ItemProcessor,
    ItemResult, OperationHooks, RawRecord, RowId, SortValue, WorkingRow, escape_html,
};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;
use std::rc::Rc;
use time::OffsetDateTime;
use time::macros::datetime;

const FIRST_NAMES: [&str; 12] = [
    "Ann", "Émile", "Bea", "Çelik", "dana", "Øystein", "Farah", "Gus", "Hélène", "Ike", "Jun",
    "Kai",
];

const LAST_NAMES: [&str; 10] = [
    "Okafor", "Ødegaard", "Lund", "de la Cruz", "O'Neil", "Ng", "Abara", "Zhou", "Müller", "Ruiz",
];

const GROUPS: [&str; 6] = ["staff", "ops", "admins", "billing", "support", "guests"];

/// Unix time used as "now" by fixtures: 2026-02-19T12:34:56Z.
pub const FIXTURE_NOW: i64 = 1_771_504_496;

pub fn fixture_now() -> OffsetDateTime {
    datetime!(2026-02-19 12:34:56 UTC)
}

/// SplitMix64; plenty for shuffling fixture data, not for anything else.
#[derive(Debug, Clone)]
struct SplitMix {
    state: u64,
}

impl SplitMix {
    fn seeded(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn below(&mut self, bound: usize) -> usize {
        match bound {
            0 | 1 => 0,
            _ => (self.next() % bound as u64) as usize,
        }
    }
}

/// Deterministic directory-style records: same seed, same rows.
#[derive(Debug, Clone)]
pub struct RecordFaker {
    rng: SplitMix,
}

impl RecordFaker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SplitMix::seeded(seed),
        }
    }

    pub fn record(&mut self, id: i64) -> Value {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let group_count = self.rng.below(3);
        let groups: Vec<&str> = (0..group_count).map(|_| self.pick(&GROUPS)).collect();
        let username = format!(
            "{}{}",
            first.chars().next().unwrap_or('x').to_lowercase(),
            last.to_lowercase().replace([' ', '\''], "")
        );
        let mut record = json!({
            "id": id,
            "link": format!("/users/{id}"),
            "username": username,
            "name": format!("{first} {last}"),
            "first_name": first,
            "last_name": last,
            "age": 16 + self.rng.below(60) as i64,
            "admin": self.rng.below(4) == 0,
            "groups": groups,
        });
        // Roughly one in five users never logged in.
        if self.rng.below(5) != 0 {
            let seconds_ago = self.rng.below(400 * 86_400) as i64;
            record["last_login"] = json!(FIXTURE_NOW - seconds_ago);
        }
        record
    }

    pub fn records(&mut self, count: usize) -> Vec<Value> {
        (1..=count as i64).map(|id| self.record(id)).collect()
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.below(items.len())]
    }
}

/// Columns of a small user directory, including a computed full name that
/// reads `first_name` and `last_name`.
pub fn people_registry() -> Result<ColumnRegistry> {
    let registry = ColumnRegistry::new(
        vec![
            ColumnDefinition::new("id", "ID", ColumnType::Int),
            ColumnDefinition::new("username", "Username", ColumnType::String),
            ColumnDefinition::new("name", "Name", ColumnType::String),
            ColumnDefinition::new("full_name", "Full name", ColumnType::String)
                .computed(&["first_name", "last_name"]),
            ColumnDefinition::new("age", "Age", ColumnType::Int),
            ColumnDefinition::new("admin", "Admin", ColumnType::Bool),
            ColumnDefinition::new("last_login", "Last login", ColumnType::Time),
            ColumnDefinition::new("groups", "Groups", ColumnType::String)
                .array()
                .unsortable(),
        ],
        &["name", "age"],
    )
    .context("build people registry")?;
    Ok(registry.with_hook("full_name", full_name_cell))
}

fn full_name_cell(record: &RawRecord) -> Cell {
    let part = |key: &str| {
        record
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };
    let full = format!("{} {}", part("first_name"), part("last_name"))
        .trim()
        .to_owned();
    let display = escape_html(&full);
    Cell::new(SortValue::Text(full), display)
}

/// The two-row example used throughout the docs.
pub fn sample_people() -> Vec<Value> {
    vec![
        json!({"id": 1, "name": "Émile", "age": 9}),
        json!({"id": 2, "name": "ann", "age": 31}),
    ]
}

pub fn to_records(values: Vec<Value>) -> Vec<RawRecord> {
    values.into_iter().filter_map(RawRecord::from_value).collect()
}

pub type RequestLog = Rc<RefCell<Vec<Vec<String>>>>;

/// Answers fetches from a queue of canned responses; an `Err` entry
/// simulates a transport failure. Requested field lists are recorded.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    responses: VecDeque<std::result::Result<Vec<Value>, String>>,
    requests: RequestLog,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, records: Vec<Value>) -> Self {
        self.responses.push_back(Ok(records));
        self
    }

    pub fn fail(mut self, message: &str) -> Self {
        self.responses.push_back(Err(message.to_owned()));
        self
    }

    pub fn requests(&self) -> RequestLog {
        Rc::clone(&self.requests)
    }
}

impl DataSource for ScriptedSource {
    fn fetch(&mut self, fields: &[String]) -> Result<Vec<RawRecord>> {
        self.requests.borrow_mut().push(fields.to_vec());
        match self.responses.pop_front() {
            Some(Ok(records)) => Ok(to_records(records)),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted response left")),
        }
    }
}

pub type CallLog = Rc<RefCell<Vec<RowId>>>;

/// Per-item handler that records every row it sees and fails the ids it was
/// told to fail.
#[derive(Debug, Default)]
pub struct RecordingProcessor {
    calls: CallLog,
    failing: BTreeSet<RowId>,
    started: Rc<RefCell<usize>>,
    finished: Rc<RefCell<usize>>,
    reject: Option<String>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, ids: &[i64]) -> Self {
        self.failing = ids.iter().copied().map(RowId::from).collect();
        self
    }

    /// Makes `validate` refuse the run with `message`.
    pub fn rejecting(mut self, message: &str) -> Self {
        self.reject = Some(message.to_owned());
        self
    }

    pub fn calls(&self) -> CallLog {
        Rc::clone(&self.calls)
    }

    pub fn lifecycle(&self) -> (Rc<RefCell<usize>>, Rc<RefCell<usize>>) {
        (Rc::clone(&self.started), Rc::clone(&self.finished))
    }
}

impl OperationHooks for RecordingProcessor {
    fn validate(&self) -> Result<()> {
        match &self.reject {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }

    fn start(&mut self) -> Result<()> {
        *self.started.borrow_mut() += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        *self.finished.borrow_mut() += 1;
        Ok(())
    }
}

impl ItemProcessor for RecordingProcessor {
    fn process_item(&mut self, row: &WorkingRow) -> Result<ItemResult> {
        self.calls.borrow_mut().push(row.id.clone());
        if self.failing.contains(&row.id) {
            return Ok(ItemResult::failed(format!("refused {}", row.id)));
        }
        Ok(ItemResult::ok())
    }
}

pub type BatchLog = Rc<RefCell<Vec<Vec<RowId>>>>;

/// Single-shot handler answering every batch with the same result.
#[derive(Debug)]
pub struct RecordingBatch {
    batches: BatchLog,
    result: ItemResult,
}

impl RecordingBatch {
    pub fn new(result: ItemResult) -> Self {
        Self {
            batches: BatchLog::default(),
            result,
        }
    }

    pub fn batches(&self) -> BatchLog {
        Rc::clone(&self.batches)
    }
}

impl OperationHooks for RecordingBatch {}

impl BatchProcessor for RecordingBatch {
    fn process_all_items(&mut self, rows: &[&WorkingRow]) -> Result<ItemResult> {
        self.batches
            .borrow_mut()
            .push(rows.iter().map(|row| row.id.clone()).collect());
        Ok(self.result.clone())
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("gridline.db");
    Ok((dir, db_path))
}
