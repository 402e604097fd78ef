//! Multi-key ordering of resolved groups.

use std::cmp::Ordering;

use crate::query::request::{MissingValuesOrder, SortOrder};
use crate::query::resolver::{ColumnValue, ResolvedRow};
use crate::query::validate::ValidatedColumn;

/// Compare two values of one column under its direction and missing rule.
///
/// Missing values go first or last regardless of direction.
pub fn compare_values(column: &ValidatedColumn, a: &ColumnValue<'_>, b: &ColumnValue<'_>) -> Ordering {
    let missing_first = column.missing_values == MissingValuesOrder::First;
    match (a, b) {
        (ColumnValue::Missing, ColumnValue::Missing) => Ordering::Equal,
        (ColumnValue::Missing, ColumnValue::Present(_)) => {
            if missing_first {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (ColumnValue::Present(_), ColumnValue::Missing) => {
            if missing_first {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (ColumnValue::Present(x), ColumnValue::Present(y)) => {
            let ord = x.total_cmp(y);
            if column.order == SortOrder::Descending {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}

/// Compare two rows by every sorted column in significance order, then by
/// group name.
pub fn compare_rows(columns: &[ValidatedColumn], a: &ResolvedRow<'_>, b: &ResolvedRow<'_>) -> Ordering {
    columns
        .iter()
        .enumerate()
        .filter(|(_, column)| column.order != SortOrder::Unspecified)
        .map(|(idx, column)| compare_values(column, &a.values[idx], &b.values[idx]))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.group.name.cmp(&b.group.name))
}

/// Sort rows into a strict total order.
pub fn sort_rows(rows: &mut [ResolvedRow<'_>], columns: &[ValidatedColumn]) {
    rows.sort_unstable_by(|a, b| compare_rows(columns, a, b));
}
