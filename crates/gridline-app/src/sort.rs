// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{Cell, CollationKey, Collator, ColumnDefinition, SortValue, WorkingRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Ascending),
            "desc" => Some(Self::Descending),
            _ => None,
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    fn apply(self, order: Ordering) -> Ordering {
        match self {
            Self::Ascending => order,
            Self::Descending => order.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    #[serde(rename = "dir")]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(column: &str) -> Self {
        Self {
            column: column.to_owned(),
            direction: SortDirection::Ascending,
        }
    }

    /// Result of clicking a header: the active column flips direction, any
    /// other sortable column becomes active ascending.
    pub fn clicked(&self, column: &ColumnDefinition) -> Option<Self> {
        if !column.is_sortable() {
            return None;
        }
        if column.key == self.column {
            return Some(Self {
                column: self.column.clone(),
                direction: self.direction.toggled(),
            });
        }
        Some(Self::ascending(&column.key))
    }
}

pub fn compare_rows(
    left: &WorkingRow,
    right: &WorkingRow,
    spec: &SortSpec,
    collator: &Collator,
) -> Ordering {
    let order = match (left.cell(&spec.column), right.cell(&spec.column)) {
        (Some(a), Some(b)) => compare_cells(a, b, collator),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    };
    spec.direction
        .apply(order)
        .then_with(|| left.id.cmp(&right.id))
}

fn compare_cells(left: &Cell, right: &Cell, collator: &Collator) -> Ordering {
    match (&left.sort, &right.sort) {
        (SortValue::Text(a), SortValue::Text(b)) => collator.compare(a, b),
        (SortValue::Bool(a), SortValue::Bool(b)) => a.cmp(b),
        (SortValue::Time(a), SortValue::Time(b)) => a.cmp(b),
        (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
        (a, b) => match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            _ => collator.compare(&left.display, &right.display),
        },
    }
}

/// Orders `indices` into `rows`. Ties fall back to the row id, so the result
/// does not depend on the stability of the sort algorithm. Text keys are
/// built once per row rather than once per comparison.
pub fn sort_indices(
    rows: &[WorkingRow],
    indices: &mut [usize],
    spec: &SortSpec,
    collator: &Collator,
) {
    let mut keyed: Vec<(usize, Option<CollationKey>)> = indices
        .iter()
        .map(|&index| {
            let key = match rows[index].cell(&spec.column).map(|cell| &cell.sort) {
                Some(SortValue::Text(text)) => Some(collator.key(text)),
                _ => None,
            };
            (index, key)
        })
        .collect();

    keyed.sort_by(|(a, a_key), (b, b_key)| {
        let (left, right) = (&rows[*a], &rows[*b]);
        match (a_key, b_key) {
            (Some(a_key), Some(b_key)) => spec
                .direction
                .apply(a_key.cmp(b_key))
                .then_with(|| left.id.cmp(&right.id)),
            _ => compare_rows(left, right, spec, collator),
        }
    });

    for (slot, (index, _)) in indices.iter_mut().zip(keyed) {
        *slot = index;
    }
}
