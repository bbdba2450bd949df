// In-memory evaluation of search predicates, used by backends that cannot
// push predicates down to storage.

use super::{RangeBounds, SearchQuery};
use crate::row::{as_number, display_string, is_empty_value, loose_eq, Row};
use serde_json::Value;
use std::cmp::Ordering;

/// Whether `row` satisfies `query`. An empty query matches every row.
pub fn matches(row: &Row, query: &SearchQuery) -> bool {
    let mut outcomes = Vec::new();

    for (column, needle) in &query.string {
        outcomes.push(text_match(row.get(column), needle, |hay, n| hay.starts_with(n)));
    }
    for (column, needle) in &query.fuzzy {
        outcomes.push(text_match(row.get(column), needle, |hay, n| hay.contains(n)));
    }
    for (column, bounds) in &query.range {
        outcomes.push(in_range(row.get(column), bounds));
    }
    for (column, needle) in &query.equal {
        outcomes.push(equals(row.get(column), needle));
    }
    for (column, needle) in &query.not_equal {
        outcomes.push(!equals(row.get(column), needle));
    }
    for column in query.empty.keys() {
        outcomes.push(is_empty_value(row.get(column)));
    }
    for column in query.not_empty.keys() {
        outcomes.push(!is_empty_value(row.get(column)));
    }
    for (column, listed) in &query.one_of {
        let listed = match listed {
            Value::Array(values) => values.as_slice(),
            other => std::slice::from_ref(other),
        };
        outcomes.push(listed.iter().any(|needle| equals(row.get(column), needle)));
    }

    if outcomes.is_empty() {
        return true;
    }
    if query.all_or {
        outcomes.into_iter().any(|o| o)
    } else {
        outcomes.into_iter().all(|o| o)
    }
}

/// Scalar cells yield themselves; list cells yield their elements.
fn cell_values(cell: &Value) -> &[Value] {
    match cell {
        Value::Array(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    }
}

fn text_match(cell: Option<&Value>, needle: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
    let Some(cell) = cell else {
        return false;
    };
    let needle = display_string(needle).to_lowercase();
    cell_values(cell)
        .iter()
        .filter(|v| !v.is_null())
        .any(|v| test(&display_string(v).to_lowercase(), &needle))
}

fn equals(cell: Option<&Value>, needle: &Value) -> bool {
    match cell {
        Some(cell) => cell_values(cell).iter().any(|v| loose_eq(v, needle)),
        None => false,
    }
}

fn in_range(cell: Option<&Value>, bounds: &RangeBounds) -> bool {
    let Some(cell) = cell.filter(|c| !c.is_null()) else {
        return false;
    };
    let above_low = bounds
        .low
        .as_ref()
        .map_or(true, |low| compare(cell, low) != Ordering::Less);
    let below_high = bounds
        .high
        .as_ref()
        .map_or(true, |high| compare(cell, high) != Ordering::Greater);
    above_low && below_high
}

/// Numeric comparison when both sides read as numbers, text otherwise.
pub(crate) fn compare(a: &Value, b: &Value) -> Ordering {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => display_string(a).cmp(&display_string(b)),
    }
}
