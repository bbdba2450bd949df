use super::{page_offset, BackendKind, BackendPage, BackendRequest, SearchBackend};
use crate::error::{Result, RowSearchError};
use crate::query::eval;
use crate::query::{Bookmark, SortOrder, SortSpec, SortType};
use crate::row::{as_number, display_string, Row, ID_COLUMN};
use crate::schema::Table;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Column holding the owning table id on every stored row.
const TABLE_ID_COLUMN: &str = "tableId";

/// Schemaless row storage: each row is a JSON document indexed by table.
/// Predicates are evaluated in memory over the table's documents.
pub struct DocumentStore {
    conn: Mutex<Connection>,
}

impl DocumentStore {
    /// Open or create the document store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = DocumentStore {
            conn: Mutex::new(conn),
        };
        store.initialize_tables()?;
        Ok(store)
    }

    /// Open an in-memory document store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = DocumentStore {
            conn: Mutex::new(conn),
        };
        store.initialize_tables()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RowSearchError::Backend("document store lock poisoned".into()))
    }

    fn initialize_tables(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                table_id TEXT NOT NULL,
                id TEXT NOT NULL,
                data_json TEXT NOT NULL,
                PRIMARY KEY (table_id, id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_table ON documents(table_id);
            ",
        )?;
        Ok(())
    }

    /// Insert or replace a row. A missing `_id` is generated.
    /// Returns the row id; replacing keeps the row's storage position.
    pub fn upsert_row(&self, table_id: &str, row: &Row) -> Result<String> {
        let id = match row.get(ID_COLUMN) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Null) | None => format!("ro_{}", uuid::Uuid::new_v4().simple()),
            Some(other) => display_string(other),
        };

        let mut stored = Row::new();
        stored.insert(ID_COLUMN.to_string(), Value::String(id.clone()));
        stored.insert(TABLE_ID_COLUMN.to_string(), Value::String(table_id.to_string()));
        for (key, value) in row {
            if key != ID_COLUMN && key != TABLE_ID_COLUMN {
                stored.insert(key.clone(), value.clone());
            }
        }

        let data_json = serde_json::to_string(&stored)?;
        self.conn()?.execute(
            "INSERT INTO documents (table_id, id, data_json) VALUES (?1, ?2, ?3)
             ON CONFLICT(table_id, id) DO UPDATE SET data_json = excluded.data_json",
            params![table_id, id, data_json],
        )?;
        Ok(id)
    }

    /// Get a row by table and id.
    pub fn get_row(&self, table_id: &str, id: &str) -> Result<Option<Row>> {
        let data_json: Option<String> = self
            .conn()?
            .query_row(
                "SELECT data_json FROM documents WHERE table_id = ?1 AND id = ?2",
                params![table_id, id],
                |row| row.get(0),
            )
            .optional()?;
        data_json
            .map(|json| serde_json::from_str(&json).map_err(RowSearchError::from))
            .transpose()
    }

    /// List all rows of a table in storage order.
    pub fn list_rows(&self, table_id: &str) -> Result<Vec<Row>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, data_json FROM documents WHERE table_id = ?1 ORDER BY rowid")?;
        let records = stmt.query_map(params![table_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut rows = Vec::new();
        for record in records {
            let (id, data_json) = record?;
            match serde_json::from_str::<Row>(&data_json) {
                Ok(row) => rows.push(row),
                Err(e) => log::warn!("Skipping unreadable row {table_id}/{id}: {e}"),
            }
        }
        Ok(rows)
    }

    /// Delete a row. Returns whether it existed.
    pub fn delete_row(&self, table_id: &str, id: &str) -> Result<bool> {
        let deleted = self.conn()?.execute(
            "DELETE FROM documents WHERE table_id = ?1 AND id = ?2",
            params![table_id, id],
        )?;
        Ok(deleted > 0)
    }

    pub fn count_rows(&self, table_id: &str) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM documents WHERE table_id = ?1",
            params![table_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl SearchBackend for DocumentStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    fn execute_query(&self, table: &Table, request: &BackendRequest) -> Result<BackendPage> {
        let mut rows: Vec<Row> = self
            .list_rows(&table.id)?
            .into_iter()
            .filter(|row| eval::matches(row, &request.query))
            .collect();

        if let Some(sort) = &request.sort {
            rows.sort_by(|a, b| compare_rows(a, b, sort));
        }

        let offset = if request.paginate {
            page_offset(request.bookmark.as_ref(), request.limit)?
        } else {
            0
        };
        let total = rows.len();
        let end = offset.saturating_add(request.limit);
        let has_next_page = end < total;
        let page: Vec<Row> = rows.into_iter().skip(offset).take(request.limit).collect();

        Ok(BackendPage {
            rows: page,
            bookmark: has_next_page.then(|| Bookmark::Token(end.to_string())),
            has_next_page,
        })
    }

    fn fetch_rows(&self, table: &Table) -> Result<Vec<Row>> {
        self.list_rows(&table.id)
    }
}

/// Order two rows by the sort column. Missing values sort last in either
/// direction.
fn compare_rows(a: &Row, b: &Row, sort: &SortSpec) -> Ordering {
    let cell = |row: &Row| row.get(&sort.column).filter(|v| !v.is_null()).cloned();
    match sort.sort_type {
        SortType::Number => nulls_last(
            cell(a).as_ref().and_then(as_number),
            cell(b).as_ref().and_then(as_number),
            sort.order,
            |x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal),
        ),
        SortType::String => nulls_last(
            cell(a).map(|v| display_string(&v).to_lowercase()),
            cell(b).map(|v| display_string(&v).to_lowercase()),
            sort.order,
            |x, y| x.cmp(y),
        ),
    }
}

fn nulls_last<T>(
    a: Option<T>,
    b: Option<T>,
    order: SortOrder,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => match order {
            SortOrder::Ascending => cmp(&x, &y),
            SortOrder::Descending => cmp(&x, &y).reverse(),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
