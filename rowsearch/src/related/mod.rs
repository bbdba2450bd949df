// Related-value resolution: reads the value of a synthetic
// `"<link>.<column>"` field out of the related rows embedded in a row.
//
// Missing or malformed relationship data never fails a row; it simply
// resolves to an empty value.

use crate::datetime::{format_date, DateOptions};
use crate::row::{join_display, truthy, Row, ID_COLUMN};
use crate::schema::{FieldSchema, FieldType, TableSchema};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;

/// Resolve the value of `field` (a synthetic related column) for `row`.
/// `from_field` is the relationship field that owns it.
pub fn get_related_table_values(row: &Row, field: &FieldSchema, from_field: &FieldSchema) -> Value {
    let Some(related) = field.related.as_ref() else {
        return Value::Null;
    };
    let links = row.get(&related.field);

    if from_field.is_single_related() {
        return first_related(links)
            .and_then(|r| r.get(&related.sub_field))
            .cloned()
            .unwrap_or(Value::Null);
    }

    let values: Vec<Value> = related_rows(links)
        .filter_map(|r| r.get(&related.sub_field))
        .flat_map(|v| match v {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        })
        .filter(|v| !v.is_null())
        .collect();

    let parsed = parse_many(field, values);
    if joins_for_display(field.field_type) {
        Value::String(join_display(&parsed, ", "))
    } else {
        Value::Array(parsed)
    }
}

/// Related rows of a link cell; a lone object counts as one related row.
fn related_rows(links: Option<&Value>) -> Box<dyn Iterator<Item = &Row> + '_> {
    match links {
        Some(Value::Array(items)) => Box::new(items.iter().filter_map(Value::as_object)),
        Some(Value::Object(single)) => Box::new(std::iter::once(single)),
        _ => Box::new(std::iter::empty()),
    }
}

fn first_related(links: Option<&Value>) -> Option<&Row> {
    match links {
        Some(Value::Array(items)) => items.first().and_then(Value::as_object),
        Some(Value::Object(single)) => Some(single),
        _ => None,
    }
}

/// Collapse the values gathered from many related rows according to the
/// column's own type.
fn parse_many(field: &FieldSchema, values: Vec<Value>) -> Vec<Value> {
    match field.field_type {
        FieldType::Datetime => {
            let opts = DateOptions::for_field(field);
            values
                .iter()
                .map(|v| Value::String(format_date(v, &opts)))
                .collect()
        }
        FieldType::Boolean => values.iter().map(|v| Value::Bool(truthy(v))).collect(),
        FieldType::BbReference | FieldType::BbReferenceSingle => dedup_by_id(values),
        FieldType::Array => dedup_unordered(values),
        FieldType::String
        | FieldType::Longform
        | FieldType::Options
        | FieldType::Number
        | FieldType::Bigint
        | FieldType::Attachments
        | FieldType::AttachmentSingle
        | FieldType::SignatureSingle
        | FieldType::Link
        | FieldType::Formula
        | FieldType::Auto
        | FieldType::Json
        | FieldType::Internal
        | FieldType::BarcodeQr => values,
    }
}

/// Types shown as a single comma-joined string rather than a list.
fn joins_for_display(field_type: FieldType) -> bool {
    matches!(
        field_type,
        FieldType::String
            | FieldType::Number
            | FieldType::Bigint
            | FieldType::Boolean
            | FieldType::Datetime
            | FieldType::Longform
            | FieldType::BarcodeQr
    )
}

/// De-duplicate references by `_id`. A key keeps the position of its first
/// occurrence and the value of its last.
fn dedup_by_id(values: Vec<Value>) -> Vec<Value> {
    let mut by_id: IndexMap<String, Value> = IndexMap::new();
    for value in values {
        let key = value
            .get(ID_COLUMN)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "null".to_string());
        by_id.insert(key, value);
    }
    by_id.into_values().collect()
}

/// De-duplicate by value with set semantics; output order is unspecified.
fn dedup_unordered(values: Vec<Value>) -> Vec<Value> {
    let mut unique: HashMap<String, Value> = HashMap::new();
    for value in values {
        unique.entry(value.to_string()).or_insert(value);
    }
    unique.into_values().collect()
}

/// Build a new row holding the original columns followed by a value for
/// every synthetic related column of `enriched`.
pub fn project_related_columns(row: &Row, enriched: &TableSchema) -> Row {
    let mut projected = row.clone();
    for (name, field) in enriched {
        let Some(related) = field.related.as_ref() else {
            continue;
        };
        if projected.contains_key(name) {
            continue;
        }
        let Some(from_field) = enriched.get(&related.field) else {
            log::warn!("Related column '{name}' has no owner field '{}'", related.field);
            continue;
        };
        projected.insert(name.clone(), get_related_table_values(row, field, from_field));
    }
    projected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::enrich_schema;
    use crate::schema::{RelatedColumn, RelationshipType};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn related_field(owner: &str, sub: &str, field_type: FieldType) -> FieldSchema {
        FieldSchema {
            related: Some(RelatedColumn {
                field: owner.into(),
                sub_field: sub.into(),
            }),
            ..FieldSchema::new(&format!("{owner}.{sub}"), field_type)
        }
    }

    fn link(name: &str, rel: RelationshipType) -> FieldSchema {
        FieldSchema {
            relationship_type: Some(rel),
            ..FieldSchema::new(name, FieldType::Link)
        }
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_single_side_returns_first_related_value() {
        let r = row(json!({
            "owner": [
                { "_id": "a", "name": "Ada" },
                { "_id": "b", "name": "Bob" },
                { "_id": "c", "name": "Cy" }
            ]
        }));
        let field = related_field("owner", "name", FieldType::String);
        let from = link("owner", RelationshipType::OneToMany);
        assert_eq!(get_related_table_values(&r, &field, &from), json!("Ada"));
    }

    #[test]
    fn test_single_side_missing_data_is_null() {
        let field = related_field("owner", "name", FieldType::String);
        let from = link("owner", RelationshipType::OneToMany);

        assert_eq!(get_related_table_values(&row(json!({})), &field, &from), Value::Null);
        assert_eq!(
            get_related_table_values(&row(json!({ "owner": [] })), &field, &from),
            Value::Null
        );
        assert_eq!(
            get_related_table_values(&row(json!({ "owner": [{ "_id": "a" }] })), &field, &from),
            Value::Null
        );
        assert_eq!(
            get_related_table_values(&row(json!({ "owner": "garbage" })), &field, &from),
            Value::Null
        );
    }

    #[test]
    fn test_many_side_strings_are_joined() {
        let r = row(json!({
            "tags": [{ "label": "red" }, { "label": null }, { "other": 1 }, { "label": "blue" }]
        }));
        let field = related_field("tags", "label", FieldType::String);
        let from = link("tags", RelationshipType::ManyToMany);
        assert_eq!(get_related_table_values(&r, &field, &from), json!("red, blue"));
    }

    #[test]
    fn test_many_side_numbers_are_joined() {
        let r = row(json!({ "items": [{ "qty": 1 }, { "qty": 2.5 }, { "qty": 3.0 }] }));
        let field = related_field("items", "qty", FieldType::Number);
        let from = link("items", RelationshipType::ManyToOne);
        assert_eq!(get_related_table_values(&r, &field, &from), json!("1, 2.5, 3"));
    }

    #[test]
    fn test_many_side_datetimes_are_formatted_in_order() {
        let r = row(json!({
            "events": [
                { "at": "2023-01-01T00:00:00Z" },
                { "at": "2023-01-02T00:00:00Z" }
            ]
        }));
        let field = related_field("events", "at", FieldType::Datetime);
        let from = link("events", RelationshipType::ManyToMany);
        assert_eq!(
            get_related_table_values(&r, &field, &from),
            json!("January 1 2023, 00:00, January 2 2023, 00:00")
        );
    }

    #[test]
    fn test_many_side_date_only_flags_are_honored() {
        let r = row(json!({ "events": [{ "at": "2023-01-01T00:00:00.000Z" }] }));
        let field = FieldSchema {
            date_only: true,
            ..related_field("events", "at", FieldType::Datetime)
        };
        let from = link("events", RelationshipType::ManyToMany);
        assert_eq!(get_related_table_values(&r, &field, &from), json!("January 1 2023"));
    }

    #[test]
    fn test_many_side_time_only_shows_clock_time() {
        let r = row(json!({
            "events": [
                { "at": "2023-01-01T09:30:00Z" },
                { "at": "2023-01-02T17:05:00Z" }
            ]
        }));
        let field = FieldSchema {
            time_only: true,
            ..related_field("events", "at", FieldType::Datetime)
        };
        let from = link("events", RelationshipType::ManyToMany);
        assert_eq!(get_related_table_values(&r, &field, &from), json!("09:30, 17:05"));
    }

    #[test]
    fn test_many_side_ignore_timezones_keeps_wall_clock() {
        let r = row(json!({ "events": [{ "at": "2023-01-01T09:30:00+05:00" }] }));
        let from = link("events", RelationshipType::ManyToMany);

        let local = FieldSchema {
            ignore_timezones: true,
            ..related_field("events", "at", FieldType::Datetime)
        };
        assert_eq!(
            get_related_table_values(&r, &local, &from),
            json!("January 1 2023, 09:30")
        );

        let utc = related_field("events", "at", FieldType::Datetime);
        assert_eq!(
            get_related_table_values(&r, &utc, &from),
            json!("January 1 2023, 04:30")
        );
    }

    #[test]
    fn test_many_side_booleans_are_coerced() {
        let r = row(json!({ "subs": [{ "on": 1 }, { "on": "" }, { "on": true }, { "on": 0 }] }));
        let field = related_field("subs", "on", FieldType::Boolean);
        let from = link("subs", RelationshipType::ManyToMany);
        assert_eq!(
            get_related_table_values(&r, &field, &from),
            json!("true, false, true, false")
        );
    }

    #[test]
    fn test_many_side_references_dedup_in_first_seen_order() {
        let r = row(json!({
            "teams": [
                { "members": [{ "_id": 1, "v": "a" }, { "_id": 2, "v": "b" }] },
                { "members": [{ "_id": 1, "v": "a2" }] },
                { "members": { "_id": 3, "v": "c" } }
            ]
        }));
        let field = related_field("teams", "members", FieldType::BbReference);
        let from = link("teams", RelationshipType::ManyToMany);
        let resolved = get_related_table_values(&r, &field, &from);
        let ids: Vec<_> = resolved
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["_id"].clone())
            .collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
        // Position of the first occurrence, value of the last.
        assert_eq!(resolved[0]["v"], json!("a2"));
    }

    #[test]
    fn test_many_side_array_dedups_as_set() {
        let r = row(json!({
            "posts": [{ "labels": ["x", "y"] }, { "labels": ["y", "z"] }, { "labels": "x" }]
        }));
        let field = related_field("posts", "labels", FieldType::Array);
        let from = link("posts", RelationshipType::ManyToMany);
        let resolved = get_related_table_values(&r, &field, &from);
        let mut labels: Vec<_> = resolved
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        labels.sort();
        assert_eq!(labels, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_many_side_other_types_pass_through() {
        let r = row(json!({ "docs": [{ "file": { "url": "a" } }, { "file": { "url": "b" } }] }));
        let field = related_field("docs", "file", FieldType::Json);
        let from = link("docs", RelationshipType::ManyToMany);
        assert_eq!(
            get_related_table_values(&r, &field, &from),
            json!([{ "url": "a" }, { "url": "b" }])
        );
    }

    #[test]
    fn test_many_side_missing_links_is_empty() {
        let field = related_field("tags", "label", FieldType::String);
        let from = link("tags", RelationshipType::ManyToMany);
        assert_eq!(get_related_table_values(&row(json!({})), &field, &from), json!(""));

        let field = related_field("tags", "label", FieldType::Json);
        assert_eq!(
            get_related_table_values(&row(json!({ "tags": 42 })), &field, &from),
            json!([])
        );
    }

    #[test]
    fn test_field_without_related_is_null() {
        let field = FieldSchema::new("plain", FieldType::String);
        let from = link("tags", RelationshipType::ManyToMany);
        assert_eq!(get_related_table_values(&row(json!({})), &field, &from), Value::Null);
    }

    #[test]
    fn test_project_related_columns() {
        let schema: TableSchema = [
            ("name".to_string(), FieldSchema::new("name", FieldType::String)),
            (
                "orders".to_string(),
                FieldSchema {
                    columns: Some(
                        [(
                            "total".to_string(),
                            FieldSchema {
                                visible: Some(true),
                                ..FieldSchema::new("total", FieldType::Number)
                            },
                        )]
                        .into_iter()
                        .collect(),
                    ),
                    ..link("orders", RelationshipType::ManyToMany)
                },
            ),
        ]
        .into_iter()
        .collect();
        let enriched = enrich_schema(Some(&schema)).unwrap();

        let original = row(json!({
            "name": "Ada",
            "orders": [{ "total": 5 }, { "total": 7 }]
        }));
        let projected = project_related_columns(&original, &enriched);

        let keys: Vec<_> = projected.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "orders", "orders.total"]);
        assert_eq!(projected["orders.total"], json!("5, 7"));
        assert_eq!(projected["orders"], original["orders"]);
        assert!(!original.contains_key("orders.total"));
    }
}
