// The structured search query accepted by the row search contract, plus
// its normalization rules.

pub mod eval;

use crate::error::{Result, RowSearchError};
use crate::row::Row;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column → predicate value.
pub type Predicates = IndexMap<String, Value>;

/// Inclusive bounds of a range predicate. Accepts `[low, high]` or
/// `{ "low": .., "high": .. }` on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawRange")]
pub struct RangeBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRange {
    Pair(Vec<Value>),
    Bounds {
        #[serde(default)]
        low: Option<Value>,
        #[serde(default)]
        high: Option<Value>,
    },
}

impl From<RawRange> for RangeBounds {
    fn from(raw: RawRange) -> Self {
        let bound = |v: Option<Value>| v.filter(|v| !v.is_null());
        match raw {
            RawRange::Pair(values) => {
                let mut values = values.into_iter();
                RangeBounds {
                    low: bound(values.next()),
                    high: bound(values.next()),
                }
            }
            RawRange::Bounds { low, high } => RangeBounds {
                low: bound(low),
                high: bound(high),
            },
        }
    }
}

impl RangeBounds {
    pub fn is_unbounded(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }
}

/// Predicates of a row search. All populated predicates must hold, or any
/// of them when `all_or` is set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    /// Case-insensitive prefix match.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub string: Predicates,
    /// Case-insensitive substring match.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fuzzy: Predicates,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub range: IndexMap<String, RangeBounds>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub equal: Predicates,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub not_equal: Predicates,
    /// Keys only; the values are ignored.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub empty: Predicates,
    /// Keys only; the values are ignored.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub not_empty: Predicates,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub one_of: Predicates,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub all_or: bool,
}

impl SearchQuery {
    pub fn is_empty(&self) -> bool {
        self.string.is_empty()
            && self.fuzzy.is_empty()
            && self.range.is_empty()
            && self.equal.is_empty()
            && self.not_equal.is_empty()
            && self.empty.is_empty()
            && self.not_empty.is_empty()
            && self.one_of.is_empty()
    }

    /// Validate and canonicalize the query before it reaches a backend.
    ///
    /// - predicates on an empty column name are dropped
    /// - `string`/`fuzzy` values become strings; structured values are rejected
    /// - `oneOf` scalars become lists (comma-separated strings are split)
    /// - ranges without either bound are dropped
    pub fn normalize(self) -> Result<SearchQuery> {
        Ok(SearchQuery {
            string: text_predicates("string", self.string)?,
            fuzzy: text_predicates("fuzzy", self.fuzzy)?,
            range: self
                .range
                .into_iter()
                .filter(|(column, bounds)| !column.is_empty() && !bounds.is_unbounded())
                .collect(),
            equal: named(self.equal),
            not_equal: named(self.not_equal),
            empty: named(self.empty),
            not_empty: named(self.not_empty),
            one_of: named(self.one_of)
                .into_iter()
                .map(|(column, value)| (column, Value::Array(one_of_values(value))))
                .collect(),
            all_or: self.all_or,
        })
    }
}

fn named(predicates: Predicates) -> Predicates {
    predicates
        .into_iter()
        .filter(|(column, _)| !column.is_empty())
        .collect()
}

fn text_predicates(kind: &str, predicates: Predicates) -> Result<Predicates> {
    named(predicates)
        .into_iter()
        .map(|(column, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(RowSearchError::Validation(format!(
                        "'{kind}' search on column '{column}' requires a text value"
                    )))
                }
            };
            Ok((column, Value::String(text)))
        })
        .collect()
}

fn one_of_values(value: Value) -> Vec<Value> {
    match value {
        Value::Array(values) => values,
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortType {
    #[default]
    String,
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(rename = "type", default)]
    pub sort_type: SortType,
}

/// Pagination cursor: opaque text for the document store, a page number
/// for the relational store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bookmark {
    Page(u64),
    Token(String),
}

/// Request body of a row search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: SearchQuery,
    #[serde(default)]
    pub paginate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<Bookmark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
}

/// Response body of a row search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<Bookmark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_next_page: Option<bool>,
}

/// Output formats of a view export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(format: Option<&str>) -> Result<ExportFormat> {
        match format {
            Some("csv") => Ok(ExportFormat::Csv),
            Some("json") => Ok(ExportFormat::Json),
            _ => Err(RowSearchError::Validation(
                "Format must be specified, either csv or json".to_string(),
            )),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_deserialize_search_params() {
        let params: SearchParams = serde_json::from_value(json!({
            "query": {
                "string": { "name": "Al" },
                "range": { "age": [18, 65], "score": { "low": 10 } },
                "notEqual": { "status": "archived" },
                "oneOf": { "tier": ["gold", "silver"] }
            },
            "paginate": true,
            "bookmark": 3,
            "limit": 50,
            "sort": { "column": "age", "order": "descending", "type": "number" }
        }))
        .unwrap();

        assert!(params.paginate);
        assert_eq!(params.bookmark, Some(Bookmark::Page(3)));
        assert_eq!(params.limit, Some(50));
        assert_eq!(
            params.query.range["age"],
            RangeBounds {
                low: Some(json!(18)),
                high: Some(json!(65))
            }
        );
        assert_eq!(params.query.range["score"].high, None);
        assert_eq!(params.query.not_equal["status"], json!("archived"));
        let sort = params.sort.unwrap();
        assert_eq!(sort.order, SortOrder::Descending);
        assert_eq!(sort.sort_type, SortType::Number);
    }

    #[test]
    fn test_sort_defaults() {
        let sort: SortSpec = serde_json::from_value(json!({ "column": "name" })).unwrap();
        assert_eq!(sort.order, SortOrder::Ascending);
        assert_eq!(sort.sort_type, SortType::String);
    }

    #[test]
    fn test_bookmark_token() {
        let params: SearchParams =
            serde_json::from_value(json!({ "bookmark": "g1AAAA" })).unwrap();
        assert_eq!(params.bookmark, Some(Bookmark::Token("g1AAAA".into())));
    }

    #[test]
    fn test_normalize() {
        let query: SearchQuery = serde_json::from_value(json!({
            "string": { "name": "Al", "": "ignored", "code": 42 },
            "range": { "age": [null, null], "score": [1, null] },
            "oneOf": { "tier": "gold, silver ,", "level": 3 },
            "empty": { "notes": true }
        }))
        .unwrap();

        let normalized = query.normalize().unwrap();
        assert_eq!(normalized.string.len(), 2);
        assert_eq!(normalized.string["code"], json!("42"));
        assert!(!normalized.range.contains_key("age"));
        assert!(normalized.range.contains_key("score"));
        assert_eq!(normalized.one_of["tier"], json!(["gold", "silver"]));
        assert_eq!(normalized.one_of["level"], json!([3]));
        assert!(normalized.empty.contains_key("notes"));
    }

    #[test]
    fn test_normalize_rejects_structured_text_search() {
        let query: SearchQuery =
            serde_json::from_value(json!({ "fuzzy": { "name": ["a"] } })).unwrap();
        let err = query.normalize().unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_export_format() {
        assert_eq!(ExportFormat::parse(Some("csv")).unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::parse(Some("json")).unwrap(), ExportFormat::Json);
        assert!(matches!(
            ExportFormat::parse(None),
            Err(RowSearchError::Validation(_))
        ));
        assert!(matches!(
            ExportFormat::parse(Some("xlsx")),
            Err(RowSearchError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_query() {
        assert!(SearchQuery::default().is_empty());
        let q = SearchQuery {
            all_or: true,
            ..Default::default()
        };
        assert!(q.is_empty());
    }
}
