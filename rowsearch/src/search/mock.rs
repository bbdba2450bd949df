// Test doubles shared by the search and export tests.

use crate::backend::{BackendKind, BackendPage, BackendRequest, SearchBackend};
use crate::catalog::Catalog;
use crate::error::{Result, RowSearchError};
use crate::query::Bookmark;
use crate::row::Row;
use crate::schema::Table;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A backend that records every call and serves canned rows.
pub(crate) struct CountingBackend {
    kind: BackendKind,
    queries: AtomicUsize,
    fetches: AtomicUsize,
    last_request: Mutex<Option<BackendRequest>>,
    rows: Mutex<Vec<Row>>,
    next_page: Mutex<Option<Bookmark>>,
    failure: Mutex<Option<String>>,
}

impl CountingBackend {
    pub fn new(kind: BackendKind) -> Self {
        CountingBackend {
            kind,
            queries: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            rows: Mutex::new(Vec::new()),
            next_page: Mutex::new(None),
            failure: Mutex::new(None),
        }
    }

    pub fn set_rows(&self, rows: Vec<Value>) {
        *self.rows.lock().unwrap() = rows
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
    }

    pub fn set_next_page(&self, bookmark: Bookmark) {
        *self.next_page.lock().unwrap() = Some(bookmark);
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Total backend calls of either kind.
    pub fn calls(&self) -> usize {
        self.queries.load(Ordering::SeqCst) + self.fetches.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<BackendRequest> {
        self.last_request.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<()> {
        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(RowSearchError::Backend(message)),
            None => Ok(()),
        }
    }
}

impl SearchBackend for CountingBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn execute_query(&self, _table: &Table, request: &BackendRequest) -> Result<BackendPage> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.check_failure()?;
        let bookmark = self.next_page.lock().unwrap().clone();
        Ok(BackendPage {
            rows: self.rows.lock().unwrap().clone(),
            has_next_page: bookmark.is_some(),
            bookmark,
        })
    }

    fn fetch_rows(&self, _table: &Table) -> Result<Vec<Row>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.rows.lock().unwrap().clone())
    }
}

/// Two tables: an internal `ta_people` with a many-to-one link and a saved
/// stats view, and an external `ta_orders`.
pub(crate) fn fixture_catalog() -> Catalog {
    Catalog::from_yaml(
        r#"
tables:
  ta_people:
    name: people
    schema:
      name: { type: string }
      age: { type: number }
      company:
        type: link
        relationshipType: many-to-one
        tableId: ta_companies
        columns:
          title: { type: string, visible: true }
          founded: { type: datetime }
    views:
      ages_by_company:
        groupBy: company
        calculation: stats
        field: age
      people_with_notes:
        schema:
          name: { type: string }
          notes: { type: longform }
  ta_orders:
    name: orders
    sourceType: external
    sqlTable: orders
    schema:
      id: { type: number }
      total: { type: number }
  ta_blank:
    name: blank
"#,
    )
    .unwrap()
}
