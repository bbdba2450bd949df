use super::{page_offset, BackendKind, BackendPage, BackendRequest, SearchBackend};
use crate::error::{Result, RowSearchError};
use crate::query::{Bookmark, SearchQuery, SortOrder, SortSpec, SortType};
use crate::row::Row;
use crate::schema::{Table, TableSchema};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQL-backed row storage. Predicates, sort and pagination are pushed
/// down into a single parameterised `SELECT`.
pub struct RelationalStore {
    conn: Mutex<Connection>,
}

/// A statement and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl RelationalStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(RelationalStore {
            conn: Mutex::new(Connection::open(path)?),
        })
    }

    /// Open an in-memory relational store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Ok(RelationalStore {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RowSearchError::Backend("relational store lock poisoned".into()))
    }

    /// Run DDL or seed statements.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    /// Insert a row into a SQL table. Structured values are stored as JSON text.
    pub fn insert_row(&self, sql_table: &str, row: &Row) -> Result<()> {
        if row.is_empty() {
            return Err(RowSearchError::Validation("Cannot insert an empty row".into()));
        }
        let columns: Vec<String> = row.keys().map(|k| quote_ident(k)).collect();
        let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(sql_table),
            columns.join(", "),
            placeholders.join(", ")
        );
        self.conn()?
            .execute(&sql, params_from_iter(row.values().map(to_sql_value)))?;
        Ok(())
    }

    fn query_rows(&self, statement: &SqlStatement, schema: &TableSchema) -> Result<Vec<Row>> {
        log::debug!("relational query: {}", statement.sql);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&statement.sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut results = stmt.query(params_from_iter(statement.params.iter()))?;

        let mut rows = Vec::new();
        while let Some(record) = results.next()? {
            let mut row = Row::new();
            for (i, column) in columns.iter().enumerate() {
                let value = from_sql_value(record.get_ref(i)?, schema, column);
                row.insert(column.clone(), value);
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

impl SearchBackend for RelationalStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn execute_query(&self, table: &Table, request: &BackendRequest) -> Result<BackendPage> {
        let limit = request.limit.max(1);
        let offset = if request.paginate {
            page_offset(request.bookmark.as_ref(), limit)?
        } else {
            0
        };

        check_columns(&table.schema, request)?;
        let statement = build_select(table.sql_table_name(), request, limit, offset)?;
        let mut rows = self.query_rows(&statement, &table.schema)?;

        let has_next_page = rows.len() > limit;
        rows.truncate(limit);

        let bookmark = if has_next_page {
            let next = u64::try_from(offset / limit)
                .ok()
                .and_then(|page| page.checked_add(1))
                .ok_or_else(|| out_of_range(offset))?;
            Some(Bookmark::Page(next))
        } else {
            None
        };

        Ok(BackendPage {
            rows,
            bookmark,
            has_next_page,
        })
    }

    fn fetch_rows(&self, table: &Table) -> Result<Vec<Row>> {
        let statement = SqlStatement {
            sql: format!("SELECT * FROM {}", quote_ident(table.sql_table_name())),
            params: Vec::new(),
        };
        self.query_rows(&statement, &table.schema)
    }
}

fn out_of_range(offset: usize) -> RowSearchError {
    RowSearchError::Validation(format!("Page offset {offset} is out of range"))
}

/// Predicate and sort columns must exist in the declared schema; SQL would
/// otherwise fail on an unknown column. Tables without a declared schema
/// are not checked.
fn check_columns(schema: &TableSchema, request: &BackendRequest) -> Result<()> {
    if schema.is_empty() {
        return Ok(());
    }
    let query = &request.query;
    let columns = query
        .string
        .keys()
        .chain(query.fuzzy.keys())
        .chain(query.range.keys())
        .chain(query.equal.keys())
        .chain(query.not_equal.keys())
        .chain(query.empty.keys())
        .chain(query.not_empty.keys())
        .chain(query.one_of.keys())
        .chain(request.sort.as_ref().map(|sort| &sort.column));
    for column in columns {
        if !schema.contains_key(column) {
            return Err(RowSearchError::Validation(format!(
                "Column '{column}' is not searchable on this table"
            )));
        }
    }
    Ok(())
}

/// Build the paged `SELECT` for a request. One extra row is fetched to
/// learn whether another page exists.
pub(crate) fn build_select(
    sql_table: &str,
    request: &BackendRequest,
    limit: usize,
    offset: usize,
) -> Result<SqlStatement> {
    let mut params = Vec::new();
    let mut sql = format!("SELECT * FROM {}", quote_ident(sql_table));

    let conditions = build_conditions(&request.query, &mut params);
    if !conditions.is_empty() {
        let joiner = if request.query.all_or { " OR " } else { " AND " };
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(joiner));
    }

    if let Some(sort) = &request.sort {
        sql.push_str(&order_by(sort));
    }

    sql.push_str(" LIMIT ? OFFSET ?");
    let fetch = limit
        .checked_add(1)
        .and_then(|n| i64::try_from(n).ok())
        .ok_or_else(|| RowSearchError::Validation(format!("Page size {limit} is out of range")))?;
    let skip = i64::try_from(offset).map_err(|_| out_of_range(offset))?;
    params.push(SqlValue::Integer(fetch));
    params.push(SqlValue::Integer(skip));

    Ok(SqlStatement { sql, params })
}

fn build_conditions(query: &SearchQuery, params: &mut Vec<SqlValue>) -> Vec<String> {
    let mut conditions = Vec::new();

    for (column, needle) in &query.string {
        conditions.push(like(column));
        params.push(SqlValue::Text(format!("{}%", escape_like(needle))));
    }
    for (column, needle) in &query.fuzzy {
        conditions.push(like(column));
        params.push(SqlValue::Text(format!("%{}%", escape_like(needle))));
    }
    for (column, bounds) in &query.range {
        let col = quote_ident(column);
        let mut parts = Vec::new();
        if let Some(low) = &bounds.low {
            parts.push(format!("{col} >= ?"));
            params.push(to_sql_value(low));
        }
        if let Some(high) = &bounds.high {
            parts.push(format!("{col} <= ?"));
            params.push(to_sql_value(high));
        }
        conditions.push(format!("({})", parts.join(" AND ")));
    }
    for (column, needle) in &query.equal {
        conditions.push(format!("{} = ?", quote_ident(column)));
        params.push(to_sql_value(needle));
    }
    for (column, needle) in &query.not_equal {
        let col = quote_ident(column);
        conditions.push(format!("({col} IS NULL OR {col} != ?)"));
        params.push(to_sql_value(needle));
    }
    for column in query.empty.keys() {
        let col = quote_ident(column);
        conditions.push(format!("({col} IS NULL OR {col} = '')"));
    }
    for column in query.not_empty.keys() {
        let col = quote_ident(column);
        conditions.push(format!("({col} IS NOT NULL AND {col} != '')"));
    }
    for (column, listed) in &query.one_of {
        let listed: &[Value] = match listed {
            Value::Array(values) => values.as_slice(),
            other => std::slice::from_ref(other),
        };
        if listed.is_empty() {
            conditions.push("0 = 1".to_string());
            continue;
        }
        let placeholders = vec!["?"; listed.len()].join(", ");
        conditions.push(format!("{} IN ({placeholders})", quote_ident(column)));
        params.extend(listed.iter().map(to_sql_value));
    }

    conditions
}

fn like(column: &str) -> String {
    format!("LOWER(CAST({} AS TEXT)) LIKE ? ESCAPE '\\'", quote_ident(column))
}

fn escape_like(needle: &Value) -> String {
    let text = match needle {
        Value::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    };
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn order_by(sort: &SortSpec) -> String {
    let col = quote_ident(&sort.column);
    let expr = match sort.sort_type {
        SortType::Number => format!("CAST({col} AS REAL)"),
        SortType::String => format!("{col} COLLATE NOCASE"),
    };
    let direction = match sort.order {
        SortOrder::Ascending => "ASC",
        SortOrder::Descending => "DESC",
    };
    format!(" ORDER BY ({col} IS NULL), {expr} {direction}")
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Convert a SQL cell to JSON. Text in columns that hold structured data
/// (links, lists, attachments) is decoded when it parses.
fn from_sql_value(value: ValueRef<'_>, schema: &TableSchema, column: &str) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            let structured = schema
                .get(column)
                .map(|f| f.field_type.holds_json())
                .unwrap_or(false);
            if structured {
                if let Ok(parsed) = serde_json::from_str::<Value>(&text) {
                    if parsed.is_array() || parsed.is_object() {
                        return parsed;
                    }
                }
            }
            Value::String(text.into_owned())
        }
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}
