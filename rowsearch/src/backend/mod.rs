// Storage backends a search is dispatched to. The orchestrator hands a
// backend the normalized predicates, sort and pagination verbatim and gets
// back raw rows plus the next-page cursor.

mod document;
mod relational;

pub use document::DocumentStore;
pub use relational::RelationalStore;

use crate::error::Result;
use crate::query::{Bookmark, SearchQuery, SortSpec};
use crate::row::Row;
use crate::schema::{Table, TableSourceType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Document,
    Relational,
}

impl BackendKind {
    pub fn for_table(table: &Table) -> BackendKind {
        match table.source_type {
            TableSourceType::Internal => BackendKind::Document,
            TableSourceType::External => BackendKind::Relational,
        }
    }
}

/// A search as a backend receives it. `limit` is already clamped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BackendRequest {
    pub query: SearchQuery,
    pub sort: Option<SortSpec>,
    pub paginate: bool,
    pub bookmark: Option<Bookmark>,
    pub limit: usize,
}

/// One page of raw rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BackendPage {
    pub rows: Vec<Row>,
    pub bookmark: Option<Bookmark>,
    pub has_next_page: bool,
}

pub trait SearchBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Run a predicate search against one table.
    fn execute_query(&self, table: &Table, request: &BackendRequest) -> Result<BackendPage>;

    /// Every row of a table, in storage order. Used to materialize views.
    fn fetch_rows(&self, table: &Table) -> Result<Vec<Row>>;
}

/// Page window derived from a request: how many rows to skip.
pub(crate) fn page_offset(bookmark: Option<&Bookmark>, limit: usize) -> Result<usize> {
    use crate::error::RowSearchError;

    match bookmark {
        None => Ok(0),
        Some(Bookmark::Page(page)) => usize::try_from(*page)
            .ok()
            .and_then(|page| page.checked_mul(limit))
            .ok_or_else(|| RowSearchError::Validation(format!("Bookmark page {page} is out of range"))),
        Some(Bookmark::Token(token)) => token.parse::<usize>().map_err(|_| {
            RowSearchError::Validation(format!("Invalid bookmark '{token}'"))
        }),
    }
}
