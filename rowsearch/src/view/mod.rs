// Saved-view materialization: grouping and calculations over the rows of
// the view's table.

use crate::error::{Result, RowSearchError};
use crate::row::{as_number, Row};
use crate::schema::{Calculation, FieldSchema, FieldType, TableSchema, ViewMeta};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Aggregation parameters of a view fetch. For saved views these are
/// derived from stored metadata, never taken from the caller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation: Option<Calculation>,
    #[serde(default)]
    pub stats: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ViewQuery {
    pub fn from_meta(meta: &ViewMeta) -> Self {
        ViewQuery {
            group: meta.group_by.clone(),
            calculation: meta.calculation,
            stats: meta.field.is_some(),
            field: meta.field.clone(),
        }
    }
}

#[derive(Default)]
struct GroupAccumulator {
    key: Value,
    rows: usize,
    values: Vec<f64>,
}

impl GroupAccumulator {
    fn sum(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// Apply a view's grouping and calculation. Without a calculation the rows
/// pass through unchanged. Groups keep first-seen order.
pub fn apply_view(rows: Vec<Row>, query: &ViewQuery) -> Result<Vec<Row>> {
    let Some(calculation) = query.calculation else {
        return Ok(rows);
    };
    if calculation != Calculation::Count && query.field.is_none() {
        return Err(RowSearchError::Validation(format!(
            "The '{}' calculation requires a field",
            calculation_name(calculation)
        )));
    }

    let mut groups: IndexMap<String, GroupAccumulator> = IndexMap::new();
    for row in &rows {
        let key = match &query.group {
            Some(column) => row.get(column).cloned().unwrap_or(Value::Null),
            None => Value::Null,
        };
        let group = groups.entry(key.to_string()).or_insert_with(|| GroupAccumulator {
            key: key.clone(),
            ..Default::default()
        });
        group.rows += 1;
        if let Some(value) = query.field.as_ref().and_then(|f| row.get(f)).and_then(as_number) {
            group.values.push(value);
        }
    }

    let field = query.field.clone().map(Value::String).unwrap_or(Value::Null);
    let output = groups
        .into_values()
        .map(|group| {
            let mut out = Row::new();
            out.insert("group".into(), group.key.clone());
            out.insert("field".into(), field.clone());
            match calculation {
                Calculation::Stats => {
                    let count = group.values.len();
                    let sum = group.sum();
                    let min = group.values.iter().copied().reduce(f64::min);
                    let max = group.values.iter().copied().reduce(f64::max);
                    let sumsqr: f64 = group.values.iter().map(|v| v * v).sum();
                    out.insert("sum".into(), number(sum));
                    out.insert("min".into(), min.map(number).unwrap_or(Value::Null));
                    out.insert("max".into(), max.map(number).unwrap_or(Value::Null));
                    out.insert("count".into(), Value::from(count));
                    out.insert("sumsqr".into(), number(sumsqr));
                    let avg = (count > 0).then(|| sum / count as f64);
                    out.insert("avg".into(), avg.map(number).unwrap_or(Value::Null));
                }
                Calculation::Count => {
                    let count = if query.field.is_some() {
                        group.values.len()
                    } else {
                        group.rows
                    };
                    out.insert("value".into(), Value::from(count));
                }
                Calculation::Sum => {
                    out.insert("value".into(), number(group.sum()));
                }
            }
            out
        })
        .collect();

    Ok(output)
}

/// Column layout of calculation rows, for views without a stored schema.
pub fn calculation_schema(calculation: Calculation) -> TableSchema {
    let numeric: &[&str] = match calculation {
        Calculation::Stats => &["sum", "min", "max", "count", "sumsqr", "avg"],
        Calculation::Count | Calculation::Sum => &["value"],
    };
    let mut schema = TableSchema::new();
    for name in ["group", "field"] {
        schema.insert(name.to_string(), FieldSchema::new(name, FieldType::String));
    }
    for name in numeric {
        schema.insert(name.to_string(), FieldSchema::new(name, FieldType::Number));
    }
    schema
}

fn calculation_name(calculation: Calculation) -> &'static str {
    match calculation {
        Calculation::Stats => "stats",
        Calculation::Count => "count",
        Calculation::Sum => "sum",
    }
}

/// Integral results are emitted as integers.
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
