// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use csv::Writer;
use std::io::Write;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::WorkingRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    /// Every loaded record, filtered or not.
    All,
    /// Only rows currently passing the filter, in screen order.
    Visible,
}

impl ExportScope {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Visible => "visible",
        }
    }
}

/// Writes the header (column keys) and one line per row with unrendered
/// values. Cells the record did not carry are left empty.
pub fn write_csv<'a, W, I>(writer: W, columns: &[String], rows: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a WorkingRow>,
{
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(columns.iter().map(String::as_str))
        .context("write csv header")?;

    let mut written = 0;
    for row in rows {
        let record: Vec<String> = columns
            .iter()
            .map(|key| match row.cell(key) {
                Some(cell) if cell.present => cell.sort.raw_string(),
                _ => String::new(),
            })
            .collect();
        wtr.write_record(&record)
            .with_context(|| format!("write csv row {}", row.id))?;
        written += 1;
    }
    wtr.flush().context("flush csv output")?;
    Ok(written)
}

/// `<instance>-YYYYMMDD-HHMMSS.csv`, with characters unsafe in file names
/// replaced.
pub fn export_file_name(instance: &str, at: OffsetDateTime) -> String {
    let stamp = at
        .format(format_description!(
            "[year][month][day]-[hour][minute][second]"
        ))
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    let mut stem: String = instance
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        stem = "export".to_owned();
    }
    format!("{stem}-{stamp}.csv")
}
