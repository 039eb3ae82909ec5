// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    ColumnDefinition, ColumnRegistry, EffectiveFilter, FilterContext, FilterError, FilterTerm,
    Operator, compile_term,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPreset {
    pub name: String,
    pub terms: Vec<FilterTerm>,
}

impl FilterPreset {
    pub fn new(name: &str, terms: Vec<FilterTerm>) -> Self {
        Self {
            name: name.to_owned(),
            terms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermStatus {
    Inactive,
    Valid,
    Invalid(FilterError),
}

impl TermStatus {
    pub fn error(&self) -> Option<&FilterError> {
        match self {
            Self::Invalid(error) => Some(error),
            Self::Inactive | Self::Valid => None,
        }
    }
}

/// Operator kept when a term moves to `column`: the current one if the
/// column accepts it, else the column default, else the first allowed.
pub fn operator_for(column: &ColumnDefinition, current: Option<Operator>) -> Operator {
    let allowed = Operator::allowed_for(column);
    current
        .filter(|operator| allowed.contains(operator))
        .or_else(|| {
            allowed
                .contains(&column.default_operator)
                .then_some(column.default_operator)
        })
        .unwrap_or(allowed[0])
}

type Compiled = Option<Result<EffectiveFilter, FilterError>>;

/// The user's filter terms plus a lazily compiled view of them. Edits keep
/// invalid terms around; only compilation skips them.
#[derive(Debug, Clone, Default)]
pub struct FilterEditor {
    terms: Vec<FilterTerm>,
    compiled: Option<Vec<Compiled>>,
}

impl FilterEditor {
    pub fn new(terms: Vec<FilterTerm>) -> Self {
        Self {
            terms,
            compiled: None,
        }
    }

    pub fn terms(&self) -> &[FilterTerm] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Drops compiled values; relative times are resolved again next use.
    pub fn invalidate(&mut self) {
        self.compiled = None;
    }

    /// Appends a term on the first registered column and returns its index.
    pub fn add(&mut self, registry: &ColumnRegistry) -> usize {
        let term = match registry.columns().first() {
            Some(column) => FilterTerm {
                active: true,
                column: column.key.clone(),
                operator: operator_for(column, None),
                value: String::new(),
            },
            None => FilterTerm::new("", Operator::Eq, ""),
        };
        self.terms.push(term);
        self.invalidate();
        self.terms.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<FilterTerm> {
        if index >= self.terms.len() {
            return None;
        }
        self.invalidate();
        Some(self.terms.remove(index))
    }

    pub fn clear(&mut self) {
        self.terms.clear();
        self.invalidate();
    }

    pub fn replace(&mut self, terms: Vec<FilterTerm>) {
        self.terms = terms;
        self.invalidate();
    }

    pub fn toggle_active(&mut self, index: usize) -> Option<bool> {
        let term = self.terms.get_mut(index)?;
        term.active = !term.active;
        self.compiled = None;
        Some(term.active)
    }

    pub fn set_column(&mut self, index: usize, column: &ColumnDefinition) -> bool {
        let Some(term) = self.terms.get_mut(index) else {
            return false;
        };
        term.column = column.key.clone();
        term.operator = operator_for(column, Some(term.operator));
        self.compiled = None;
        true
    }

    pub fn set_operator(&mut self, index: usize, operator: Operator) -> bool {
        let Some(term) = self.terms.get_mut(index) else {
            return false;
        };
        term.operator = operator;
        self.compiled = None;
        true
    }

    pub fn set_value(&mut self, index: usize, value: &str) -> bool {
        let Some(term) = self.terms.get_mut(index) else {
            return false;
        };
        term.value = value.to_owned();
        self.compiled = None;
        true
    }

    fn ensure_compiled(&mut self, registry: &ColumnRegistry, context: FilterContext) -> &[Compiled] {
        let terms = &self.terms;
        self.compiled.get_or_insert_with(|| {
            terms
                .iter()
                .map(|term| {
                    term.active
                        .then(|| compile_term(term, registry, context))
                        .inspect(|result| {
                            if let Err(error) = result {
                                debug!(column = %term.column, %error, "filter term skipped");
                            }
                        })
                })
                .collect()
        })
    }

    pub fn statuses(&mut self, registry: &ColumnRegistry, context: FilterContext) -> Vec<TermStatus> {
        self.ensure_compiled(registry, context)
            .iter()
            .map(|compiled| match compiled {
                None => TermStatus::Inactive,
                Some(Ok(_)) => TermStatus::Valid,
                Some(Err(error)) => TermStatus::Invalid(error.clone()),
            })
            .collect()
    }

    /// Active, valid terms in editor order.
    pub fn effective(
        &mut self,
        registry: &ColumnRegistry,
        context: FilterContext,
    ) -> Vec<EffectiveFilter> {
        self.ensure_compiled(registry, context)
            .iter()
            .filter_map(|compiled| compiled.as_ref()?.as_ref().ok().cloned())
            .collect()
    }

    /// Columns the current terms look at, in first-use order.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for term in &self.terms {
            if !columns.contains(&term.column.as_str()) {
                columns.push(&term.column);
            }
        }
        columns
    }
}
