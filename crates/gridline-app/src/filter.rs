// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{OffsetDateTime, UtcOffset};

use crate::timeparse::parse_time_value;
use crate::{
    ARRAY_SORT_SEPARATOR, ColumnDefinition, ColumnRegistry, ColumnType, SortValue, TimeParseError,
    WorkingRow,
};

/// Pattern substituted for an empty string filter: only empty values match.
pub const EMPTY_VALUE_PATTERN: &str = "^$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl Operator {
    pub const ALL: [Self; 6] = [Self::Eq, Self::Ne, Self::Lt, Self::Le, Self::Gt, Self::Ge];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "=" | "==" => Some(Self::Eq),
            "!=" | "≠" | "<>" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" | "≤" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" | "≥" => Some(Self::Ge),
            _ => None,
        }
    }

    pub const fn is_relational(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    /// Operators the editor offers for a column.
    pub fn allowed_for(column: &ColumnDefinition) -> &'static [Self] {
        match filter_kind(column) {
            FilterKind::Pattern | FilterKind::Bool => &[Self::Eq, Self::Ne],
            FilterKind::Number | FilterKind::Time => &Self::ALL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterTerm {
    pub active: bool,
    pub column: String,
    pub operator: Operator,
    pub value: String,
}

impl FilterTerm {
    pub fn new(column: &str, operator: Operator, value: &str) -> Self {
        Self {
            active: true,
            column: column.to_owned(),
            operator,
            value: value.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("unknown column {0:?}")]
    UnknownColumn(String),
    #[error("operator {operator} cannot be used on {column_type} columns")]
    UnsupportedOperator {
        operator: &'static str,
        column_type: &'static str,
    },
    #[error("a value is required")]
    EmptyValue,
    #[error("{0:?} is not a number")]
    InvalidNumber(String),
    #[error("{0} needs exactly one value")]
    ExpectedSingleValue(&'static str),
    #[error("{0:?} is not true or false")]
    InvalidBool(String),
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("invalid time: {0}")]
    InvalidTime(#[from] TimeParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterContext {
    pub now: OffsetDateTime,
    pub utc_offset: UtcOffset,
}

#[derive(Debug, Clone)]
pub enum CompiledValue {
    Pattern(Regex),
    Numbers(Vec<f64>),
    Number(f64),
    Bool(bool),
    Time(i64),
}

#[derive(Debug, Clone)]
pub struct EffectiveFilter {
    pub column: String,
    pub operator: Operator,
    pub value: CompiledValue,
    /// Patterns are tested against each member of an array cell.
    pub per_member: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterKind {
    Pattern,
    Number,
    Bool,
    Time,
}

fn filter_kind(column: &ColumnDefinition) -> FilterKind {
    if column.is_array() {
        return FilterKind::Pattern;
    }
    match column.column_type {
        ColumnType::String => FilterKind::Pattern,
        ColumnType::Int | ColumnType::Float => FilterKind::Number,
        ColumnType::Bool => FilterKind::Bool,
        ColumnType::Time => FilterKind::Time,
    }
}

pub fn compile_term(
    term: &FilterTerm,
    registry: &ColumnRegistry,
    context: FilterContext,
) -> Result<EffectiveFilter, FilterError> {
    let column = registry
        .get(&term.column)
        .ok_or_else(|| FilterError::UnknownColumn(term.column.clone()))?;
    let operator = term.operator;
    if !Operator::allowed_for(column).contains(&operator) {
        return Err(FilterError::UnsupportedOperator {
            operator: operator.as_str(),
            column_type: column.column_type.as_str(),
        });
    }

    let raw = term.value.trim();
    let value = match filter_kind(column) {
        FilterKind::Pattern => {
            let pattern = if raw.is_empty() {
                EMPTY_VALUE_PATTERN
            } else {
                raw
            };
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|error| FilterError::InvalidPattern(error.to_string()))?;
            CompiledValue::Pattern(regex)
        }
        FilterKind::Number => {
            let numbers = parse_numbers(raw)?;
            if operator.is_relational() {
                match numbers.as_slice() {
                    [single] => CompiledValue::Number(*single),
                    _ => return Err(FilterError::ExpectedSingleValue(operator.as_str())),
                }
            } else {
                CompiledValue::Numbers(numbers)
            }
        }
        FilterKind::Bool => CompiledValue::Bool(parse_bool(raw)?),
        FilterKind::Time => {
            CompiledValue::Time(parse_time_value(raw, context.now, context.utc_offset)?)
        }
    };

    Ok(EffectiveFilter {
        column: column.key.clone(),
        operator,
        value,
        per_member: column.is_array(),
    })
}

fn parse_numbers(raw: &str) -> Result<Vec<f64>, FilterError> {
    let mut numbers = Vec::new();
    for token in raw
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|token| !token.is_empty())
    {
        let number = token
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .ok_or_else(|| FilterError::InvalidNumber(token.to_owned()))?;
        numbers.push(number);
    }
    if numbers.is_empty() {
        return Err(FilterError::EmptyValue);
    }
    Ok(numbers)
}

fn parse_bool(raw: &str) -> Result<bool, FilterError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        "" => Err(FilterError::EmptyValue),
        _ => Err(FilterError::InvalidBool(raw.to_owned())),
    }
}

impl EffectiveFilter {
    pub fn matches(&self, row: &WorkingRow) -> bool {
        let Some(cell) = row.cell(&self.column) else {
            return false;
        };

        match &self.value {
            CompiledValue::Pattern(regex) => {
                let text = match &cell.sort {
                    SortValue::Text(text) => text.as_str(),
                    _ => cell.display.as_str(),
                };
                let found = if self.per_member {
                    text.split(ARRAY_SORT_SEPARATOR)
                        .any(|member| regex.is_match(member))
                } else {
                    regex.is_match(text)
                };
                match self.operator {
                    Operator::Ne => !found,
                    _ => found,
                }
            }
            CompiledValue::Numbers(options) => {
                let member = cell
                    .sort
                    .as_number()
                    .is_some_and(|value| options.iter().any(|option| *option == value));
                match self.operator {
                    Operator::Ne => !member,
                    _ => member,
                }
            }
            CompiledValue::Number(bound) => cell
                .sort
                .as_number()
                .is_some_and(|value| compare(self.operator, value, *bound)),
            CompiledValue::Bool(expected) => {
                let actual = matches!(cell.sort, SortValue::Bool(true));
                match self.operator {
                    Operator::Ne => actual != *expected,
                    _ => actual == *expected,
                }
            }
            CompiledValue::Time(bound) => {
                // Absent timestamps sit beyond whichever end the bound points at.
                let SortValue::Time(value) = cell.sort else {
                    return self.operator == Operator::Ne;
                };
                if !cell.present {
                    return self.operator == Operator::Ne;
                }
                compare(self.operator, value as f64, *bound as f64)
            }
        }
    }
}

fn compare(operator: Operator, value: f64, bound: f64) -> bool {
    match operator {
        Operator::Eq => value == bound,
        Operator::Ne => value != bound,
        Operator::Lt => value < bound,
        Operator::Le => value <= bound,
        Operator::Gt => value > bound,
        Operator::Ge => value >= bound,
    }
}

/// Every term must satisfy `matches XOR reverse`; the first failing term
/// short-circuits.
pub fn row_passes(row: &WorkingRow, filters: &[EffectiveFilter], reverse: bool) -> bool {
    filters
        .iter()
        .all(|filter| filter.matches(row) != reverse)
}

#[cfg(test)]
mod tests {
    use super::{
        CompiledValue, FilterContext, FilterError, FilterTerm, Operator, compile_term, row_passes,
    };
    use crate::{
        ColumnDefinition, ColumnRegistry, ColumnType, RawRecord, TimeParseError,
        TransformOptions, WorkingRow, transform_records,
    };
    use serde_json::json;
    use time::UtcOffset;
    use time::macros::datetime;

    fn registry() -> ColumnRegistry {
        ColumnRegistry::new(
            vec![
                ColumnDefinition::new("name", "Name", ColumnType::String),
                ColumnDefinition::new("age", "Age", ColumnType::Int),
                ColumnDefinition::new("admin", "Admin", ColumnType::Bool),
                ColumnDefinition::new("seen", "Last seen", ColumnType::Time),
                ColumnDefinition::new("groups", "Groups", ColumnType::String).array(),
            ],
            &[],
        )
        .expect("registry should build")
    }

    fn context() -> FilterContext {
        FilterContext {
            now: datetime!(2026-10-19 12:00:00 UTC),
            utc_offset: UtcOffset::UTC,
        }
    }

    fn rows(registry: &ColumnRegistry) -> Vec<WorkingRow> {
        let records = [
            json!({"id": 1, "name": "Émile", "age": 9, "seen": 1_700_000_000, "groups": ["staff"]}),
            json!({"id": 2, "name": "ann", "age": 31, "admin": true}),
            json!({"id": 3, "name": "", "age": 18, "seen": 1_600_000_000, "groups": ["staff", "ops"]}),
        ]
        .into_iter()
        .map(|value| RawRecord::from_value(value).expect("object"))
        .collect::<Vec<_>>();
        let columns: Vec<String> = registry.columns().iter().map(|c| c.key.clone()).collect();
        transform_records(&records, &columns, registry, TransformOptions::default())
    }

    fn passing(rows: &[WorkingRow], terms: &[FilterTerm], reverse: bool) -> Vec<String> {
        let registry = registry();
        let filters = terms
            .iter()
            .map(|term| compile_term(term, &registry, context()).expect("term compiles"))
            .collect::<Vec<_>>();
        rows.iter()
            .filter(|row| row_passes(row, &filters, reverse))
            .map(|row| row.id.to_string())
            .collect()
    }

    #[test]
    fn numeric_relational_filter_keeps_adults() {
        let registry = registry();
        let rows = rows(&registry);
        assert_eq!(
            passing(&rows, &[FilterTerm::new("age", Operator::Ge, "18")], false),
            vec!["2", "3"]
        );
        assert_eq!(
            passing(&rows[..2], &[FilterTerm::new("age", Operator::Ge, "18")], false),
            vec!["2"]
        );
    }

    #[test]
    fn numeric_equality_accepts_alternatives() {
        let registry = registry();
        let rows = rows(&registry);
        assert_eq!(
            passing(&rows, &[FilterTerm::new("age", Operator::Eq, "9, 18")], false),
            vec!["1", "3"]
        );
        assert_eq!(
            passing(&rows, &[FilterTerm::new("age", Operator::Ne, "9 18")], false),
            vec!["2"]
        );
    }

    #[test]
    fn relational_numeric_filters_need_one_value() {
        let registry = registry();
        let error = compile_term(&FilterTerm::new("age", Operator::Lt, "1 2"), &registry, context())
            .expect_err("two values should fail");
        assert_eq!(error, FilterError::ExpectedSingleValue("<"));
        let error = compile_term(&FilterTerm::new("age", Operator::Eq, "x"), &registry, context())
            .expect_err("non numeric should fail");
        assert_eq!(error, FilterError::InvalidNumber("x".to_owned()));
    }

    #[test]
    fn string_filters_are_case_insensitive_patterns() {
        let registry = registry();
        let rows = rows(&registry);
        assert_eq!(
            passing(&rows, &[FilterTerm::new("name", Operator::Eq, "^A")], false),
            vec!["2"]
        );
        assert_eq!(
            passing(&rows, &[FilterTerm::new("name", Operator::Eq, "")], false),
            vec!["3"]
        );
        assert_eq!(
            passing(&rows, &[FilterTerm::new("name", Operator::Ne, "")], false),
            vec!["1", "2"]
        );
    }

    #[test]
    fn strings_reject_relational_operators_and_bad_patterns() {
        let registry = registry();
        assert!(matches!(
            compile_term(&FilterTerm::new("name", Operator::Lt, "a"), &registry, context()),
            Err(FilterError::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            compile_term(&FilterTerm::new("name", Operator::Eq, "("), &registry, context()),
            Err(FilterError::InvalidPattern(_))
        ));
        assert_eq!(
            compile_term(&FilterTerm::new("nope", Operator::Eq, "a"), &registry, context())
                .expect_err("unknown column"),
            FilterError::UnknownColumn("nope".to_owned())
        );
    }

    #[test]
    fn array_columns_match_any_member() {
        let registry = registry();
        let rows = rows(&registry);
        assert_eq!(
            passing(&rows, &[FilterTerm::new("groups", Operator::Eq, "^ops$")], false),
            vec!["3"]
        );
        assert_eq!(
            passing(&rows, &[FilterTerm::new("groups", Operator::Eq, "staff")], false),
            vec!["1", "3"]
        );
        assert_eq!(
            passing(&rows, &[FilterTerm::new("groups", Operator::Eq, "^staff$")], false),
            vec!["1", "3"]
        );
    }

    #[test]
    fn array_inequality_requires_no_member_to_match() {
        let registry = registry();
        let rows = rows(&registry);
        assert_eq!(
            passing(&rows, &[FilterTerm::new("groups", Operator::Ne, "^ops$")], false),
            vec!["1", "2"]
        );
        assert_eq!(
            passing(&rows, &[FilterTerm::new("groups", Operator::Eq, "staff.ops")], false),
            Vec::<String>::new()
        );
        assert_eq!(
            passing(&rows, &[FilterTerm::new("groups", Operator::Eq, "")], false),
            vec!["2"]
        );
    }

    #[test]
    fn bool_filters_only_allow_equality() {
        let registry = registry();
        let rows = rows(&registry);
        assert_eq!(
            passing(&rows, &[FilterTerm::new("admin", Operator::Eq, "yes")], false),
            vec!["2"]
        );
        assert_eq!(
            passing(&rows, &[FilterTerm::new("admin", Operator::Ne, "true")], false),
            vec!["1", "3"]
        );
        assert!(matches!(
            compile_term(&FilterTerm::new("admin", Operator::Gt, "1"), &registry, context()),
            Err(FilterError::UnsupportedOperator { .. })
        ));
        assert_eq!(
            compile_term(&FilterTerm::new("admin", Operator::Eq, "maybe"), &registry, context())
                .expect_err("bad bool"),
            FilterError::InvalidBool("maybe".to_owned())
        );
    }

    #[test]
    fn missing_timestamps_never_satisfy_bounds() {
        let registry = registry();
        let rows = rows(&registry);
        assert_eq!(
            passing(&rows, &[FilterTerm::new("seen", Operator::Lt, "2030")], false),
            vec!["1", "3"]
        );
        assert_eq!(
            passing(&rows, &[FilterTerm::new("seen", Operator::Gt, "2000")], false),
            vec!["1", "3"]
        );
        assert_eq!(
            passing(&rows, &[FilterTerm::new("seen", Operator::Ge, "2021-01-01")], false),
            vec!["1"]
        );
        assert_eq!(
            passing(&rows, &[FilterTerm::new("seen", Operator::Ne, "2021")], false),
            vec!["1", "2", "3"]
        );
    }

    #[test]
    fn time_literals_resolve_once_at_compile_time() {
        let registry = registry();
        let filter = compile_term(&FilterTerm::new("seen", Operator::Gt, "-3600"), &registry, context())
            .expect("relative literal compiles");
        match filter.value {
            CompiledValue::Time(seconds) => {
                assert_eq!(seconds, context().now.unix_timestamp() - 3600)
            }
            other => panic!("unexpected compiled value {other:?}"),
        }
        assert_eq!(
            compile_term(&FilterTerm::new("seen", Operator::Gt, "1990-06"), &registry, context())
                .expect_err("old year"),
            FilterError::InvalidTime(TimeParseError::YearOutOfRange(1990))
        );
    }

    #[test]
    fn reverse_complements_a_single_term() {
        let registry = registry();
        let rows = rows(&registry);
        let term = [FilterTerm::new("age", Operator::Ge, "18")];
        let forward = passing(&rows, &term, false);
        let reversed = passing(&rows, &term, true);
        assert_eq!(forward, vec!["2", "3"]);
        assert_eq!(reversed, vec!["1"]);
    }

    #[test]
    fn reverse_applies_per_term_not_to_the_conjunction() {
        let registry = registry();
        let rows = rows(&registry);
        // Row 2 matches "age >= 18" but not "admin = false".
        let terms = [
            FilterTerm::new("age", Operator::Ge, "18"),
            FilterTerm::new("admin", Operator::Eq, "false"),
        ];
        let per_term = passing(&rows, &terms, true);
        let filters = terms
            .iter()
            .map(|term| compile_term(term, &registry, context()).expect("compiles"))
            .collect::<Vec<_>>();
        let negated_conjunction: Vec<String> = rows
            .iter()
            .filter(|row| !filters.iter().all(|filter| filter.matches(row)))
            .map(|row| row.id.to_string())
            .collect();

        assert_eq!(per_term, Vec::<String>::new());
        assert_eq!(negated_conjunction, vec!["1", "2"]);
        assert_ne!(per_term, negated_conjunction);
    }
}
