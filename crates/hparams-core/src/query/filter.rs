//! Per-column filter predicates.
//!
//! A group passes a column when its value satisfies the predicate, or when
//! the value is missing and the column does not exclude missing values.
//! Columns combine with logical AND.

use regex::Regex;

use crate::domain::experiment::HParamValue;
use crate::query::resolver::{ColumnValue, ResolvedRow, Scalar};
use crate::query::validate::ValidatedColumn;

/// A compiled filter.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Unanchored regexp search over STRING values.
    Regexp(Regex),
    /// Closed interval over FLOAT64 values.
    Interval { min_value: f64, max_value: f64 },
    /// Allow-set with type-aware equality.
    Discrete(Vec<HParamValue>),
}

impl Predicate {
    pub fn matches(&self, value: &Scalar<'_>) -> bool {
        match (self, value) {
            (Predicate::Regexp(re), Scalar::String(s)) => re.is_match(s),
            (Predicate::Regexp(_), _) => false,
            (Predicate::Interval { min_value, max_value }, Scalar::Number(n)) => {
                *min_value <= *n && *n <= *max_value
            }
            (Predicate::Interval { .. }, _) => false,
            (Predicate::Discrete(values), scalar) => values.iter().any(|v| scalar.equals(v)),
        }
    }
}

/// Whether `value` passes one column's constraints.
pub fn admits(column: &ValidatedColumn, value: &ColumnValue<'_>) -> bool {
    match value {
        ColumnValue::Missing => !column.exclude_missing,
        ColumnValue::Present(scalar) => column
            .predicate
            .as_ref()
            .map_or(true, |predicate| predicate.matches(scalar)),
    }
}

/// Keep the rows that pass every column.
pub fn filter_rows<'g>(
    rows: Vec<ResolvedRow<'g>>,
    columns: &[ValidatedColumn],
) -> Vec<ResolvedRow<'g>> {
    rows.into_iter()
        .filter(|row| {
            columns
                .iter()
                .zip(&row.values)
                .all(|(column, value)| admits(column, value))
        })
        .collect()
}
