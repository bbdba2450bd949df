// View export to downloadable CSV or JSON files.

use crate::enrich::enrich_schema;
use crate::error::{Result, RowSearchError};
use crate::query::ExportFormat;
use crate::related::project_related_columns;
use crate::row::{display_string, Row};
use crate::search::SearchEngine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub view: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub table_id: Option<String>,
}

/// A rendered export, ready to be sent as an attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub body: String,
}

impl SearchEngine {
    /// Export a view's rows. The format is checked before any row is read.
    pub fn export_view(&self, request: &ExportRequest) -> Result<ExportFile> {
        let format = ExportFormat::parse(request.format.as_deref())?;
        if request.view.is_empty() {
            return Err(RowSearchError::Validation("A view name is required".into()));
        }

        let view = self.resolve_view(&request.view, request.table_id.as_deref())?;
        let fetched = self.fetch_view(&view)?;

        let schema = enrich_schema(Some(&fetched.schema)).unwrap_or_default();
        let headers: Vec<String> = schema.keys().cloned().collect();
        let mut rows: Vec<Row> = fetched
            .rows
            .iter()
            .map(|row| project_related_columns(row, &schema))
            .collect();

        let body = match format {
            ExportFormat::Csv => {
                fill_empty_cells(&mut rows, &headers);
                csv_export(&headers, &rows)
            }
            ExportFormat::Json => json_export(&rows)?,
        };
        log::info!("exported {} rows of view {} as {:?}", rows.len(), request.view, format);

        Ok(ExportFile {
            filename: format!("{}.{}", request.view, format.extension()),
            content_type: format.content_type(),
            body,
        })
    }
}

/// Replace missing or `null` cells of every schema column with `""`.
pub fn fill_empty_cells(rows: &mut [Row], headers: &[String]) {
    for row in rows.iter_mut() {
        for header in headers {
            let cell = row.entry(header.clone()).or_insert(Value::Null);
            if cell.is_null() {
                *cell = Value::String(String::new());
            }
        }
    }
}

/// Quoted CSV: a header line, then one line per row.
pub fn csv_export(headers: &[String], rows: &[Row]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(csv_line(headers.iter().map(String::as_str)));
    for row in rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| row.get(h).map(display_string).unwrap_or_default())
            .collect();
        lines.push(csv_line(cells.iter().map(String::as_str)));
    }
    lines.join("\n")
}

fn csv_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    cells
        .map(|cell| format!("\"{}\"", cell.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn json_export(rows: &[Row]) -> Result<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::config::SearchConfig;
    use crate::search::mock::{fixture_catalog, CountingBackend};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (SearchEngine, Arc<CountingBackend>, Arc<CountingBackend>) {
        let docs = Arc::new(CountingBackend::new(BackendKind::Document));
        let sql = Arc::new(CountingBackend::new(BackendKind::Relational));
        let engine = SearchEngine::new(
            Arc::new(fixture_catalog()),
            docs.clone(),
            sql.clone(),
            SearchConfig::default(),
        );
        (engine, docs, sql)
    }

    fn request(view: &str, format: Option<&str>) -> ExportRequest {
        ExportRequest {
            view: view.into(),
            format: format.map(String::from),
            table_id: None,
        }
    }

    #[test]
    fn test_missing_format_rejected_without_backend_call() {
        let (engine, docs, sql) = setup();
        for format in [None, Some("xlsx")] {
            let err = engine.export_view(&request("all_ta_people", format)).unwrap_err();
            assert!(matches!(err, RowSearchError::Validation(_)));
        }
        assert_eq!(docs.calls(), 0);
        assert_eq!(sql.calls(), 0);
    }

    #[test]
    fn test_csv_export_of_all_rows_view() {
        let (engine, docs, _) = setup();
        docs.set_rows(vec![
            json!({ "_id": "p1", "name": "Ada", "age": 30, "company": [{ "_id": "c1", "title": "Acme" }] }),
            json!({ "_id": "p2", "name": "Bob \"B\"", "age": null }),
        ]);
        let file = engine.export_view(&request("all_ta_people", Some("csv"))).unwrap();
        assert_eq!(file.filename, "all_ta_people.csv");
        assert_eq!(file.content_type, "text/csv");
        assert_eq!(
            file.body,
            "\"name\",\"age\",\"company\",\"company.title\"\n\
             \"Ada\",\"30\",\"[object Object]\",\"Acme\"\n\
             \"Bob \"\"B\"\"\",\"\",\"\",\"\""
        );
    }

    #[test]
    fn test_stored_view_schema_drives_headers() {
        let (engine, docs, _) = setup();
        docs.set_rows(vec![json!({ "name": "Ada", "age": 30 })]);
        let file = engine
            .export_view(&request("people_with_notes", Some("csv")))
            .unwrap();
        assert_eq!(file.body, "\"name\",\"notes\"\n\"Ada\",\"\"");
    }

    #[test]
    fn test_json_export_keeps_nulls() {
        let (engine, docs, _) = setup();
        docs.set_rows(vec![json!({ "name": "Ada", "age": null })]);
        let file = engine.export_view(&request("all_ta_people", Some("json"))).unwrap();
        assert_eq!(file.filename, "all_ta_people.json");
        assert_eq!(file.content_type, "application/json");
        let parsed: Value = serde_json::from_str(&file.body).unwrap();
        assert_eq!(parsed[0]["age"], Value::Null);
        assert_eq!(parsed[0]["company.title"], json!(""));
    }

    #[test]
    fn test_explicit_table_id_routes_to_relational() {
        let (engine, docs, sql) = setup();
        sql.set_rows(vec![json!({ "id": 1, "total": 9.5 })]);
        let file = engine
            .export_view(&ExportRequest {
                view: "orders_export".into(),
                format: Some("csv".into()),
                table_id: Some("ta_orders".into()),
            })
            .unwrap();
        assert_eq!(file.filename, "orders_export.csv");
        assert_eq!(file.body, "\"id\",\"total\"\n\"1\",\"9.5\"");
        assert_eq!(docs.calls(), 0);
        assert_eq!(sql.fetches(), 1);
    }

    #[test]
    fn test_unresolvable_schema_is_fatal() {
        let (engine, docs, _) = setup();
        let err = engine.export_view(&request("all_ta_blank", Some("csv"))).unwrap_err();
        assert!(matches!(err, RowSearchError::Schema(_)));
        assert_eq!(docs.calls(), 0);
    }

    #[test]
    fn test_fill_empty_cells_is_idempotent() {
        let mut rows = vec![json!({ "a": null, "b": 0, "c": "x" }).as_object().cloned().unwrap()];
        let headers = vec!["a".to_string(), "b".to_string(), "d".to_string()];
        fill_empty_cells(&mut rows, &headers);
        let once = rows.clone();
        fill_empty_cells(&mut rows, &headers);
        assert_eq!(rows, once);
        assert_eq!(
            Value::Object(rows.remove(0)),
            json!({ "a": "", "b": 0, "c": "x", "d": "" })
        );
    }
}
