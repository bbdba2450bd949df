// Search orchestration: validates a search, routes it to the backend that
// owns the table and post-processes the rows it returns.

#[cfg(test)]
pub(crate) mod mock;

use crate::backend::{BackendKind, BackendRequest, SearchBackend};
use crate::catalog::TableProvider;
use crate::config::SearchConfig;
use crate::enrich::enrich_schema;
use crate::error::{Result, RowSearchError};
use crate::query::{SearchParams, SearchResult};
use crate::related::project_related_columns;
use crate::row::Row;
use crate::schema::{Table, TableSchema, ViewMeta};
use crate::view::{apply_view, calculation_schema, ViewQuery};
use std::sync::Arc;

/// Prefix of the synthetic view that lists every row of a table.
pub const ALL_ROWS_VIEW_PREFIX: &str = "all_";

pub struct SearchEngine {
    tables: Arc<dyn TableProvider>,
    documents: Arc<dyn SearchBackend>,
    relational: Arc<dyn SearchBackend>,
    config: SearchConfig,
}

/// A view resolved against the catalog: the table it reads and, for saved
/// views, the stored metadata.
#[derive(Debug, Clone)]
pub struct ResolvedView {
    pub name: String,
    pub table: Table,
    pub meta: Option<ViewMeta>,
}

impl ResolvedView {
    /// Aggregation parameters. The all-rows view takes none.
    pub fn query(&self) -> ViewQuery {
        self.meta.as_ref().map(ViewQuery::from_meta).unwrap_or_default()
    }

    /// Schema of the view's rows: the stored view schema, else the
    /// calculation layout, else the table's live schema.
    pub fn schema(&self) -> Result<TableSchema> {
        if let Some(meta) = &self.meta {
            if let Some(schema) = &meta.schema {
                return Ok(schema.clone());
            }
            if let Some(calculation) = meta.calculation {
                return Ok(calculation_schema(calculation));
            }
        }
        if self.table.schema.is_empty() {
            return Err(RowSearchError::Schema(format!(
                "Unable to resolve a schema for view '{}'",
                self.name
            )));
        }
        Ok(self.table.schema.clone())
    }
}

/// Materialized rows of a view together with their schema.
#[derive(Debug, Clone)]
pub struct ViewRows {
    pub name: String,
    pub schema: TableSchema,
    pub rows: Vec<Row>,
}

impl SearchEngine {
    pub fn new(
        tables: Arc<dyn TableProvider>,
        documents: Arc<dyn SearchBackend>,
        relational: Arc<dyn SearchBackend>,
        config: SearchConfig,
    ) -> Self {
        SearchEngine {
            tables,
            documents,
            relational,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn tables(&self) -> &dyn TableProvider {
        self.tables.as_ref()
    }

    fn backend_for(&self, table: &Table) -> &dyn SearchBackend {
        match BackendKind::for_table(table) {
            BackendKind::Document => self.documents.as_ref(),
            BackendKind::Relational => self.relational.as_ref(),
        }
    }

    /// Run a row search against a table.
    pub fn search(&self, table_id: &str, params: SearchParams) -> Result<SearchResult> {
        if table_id.is_empty() {
            return Err(RowSearchError::Validation("A table id is required".into()));
        }
        let query = params.query.normalize()?;
        let table = self.tables.get_table(table_id)?;

        let kind = BackendKind::for_table(&table);
        let limit = self.config.clamp_limit(kind, params.limit);
        log::debug!(
            "search table={table_id} backend={kind:?} limit={limit} paginate={}",
            params.paginate
        );

        let request = BackendRequest {
            query,
            sort: params.sort,
            paginate: params.paginate,
            bookmark: params.bookmark,
            limit,
        };
        let page = self.backend_for(&table).execute_query(&table, &request)?;

        let enriched = enrich_schema(Some(&table.schema)).unwrap_or_default();
        let rows = page
            .rows
            .iter()
            .map(|row| project_related_columns(row, &enriched))
            .collect();

        if params.paginate {
            Ok(SearchResult {
                rows,
                bookmark: page.bookmark,
                has_next_page: Some(page.has_next_page),
            })
        } else {
            Ok(SearchResult {
                rows,
                ..Default::default()
            })
        }
    }

    /// The table schema with synthetic related columns added.
    pub fn enriched_schema(&self, table_id: &str) -> Result<TableSchema> {
        let table = self.tables.get_table(table_id)?;
        Ok(enrich_schema(Some(&table.schema)).unwrap_or_default())
    }

    /// Resolve a view name. Saved views win; otherwise `all_<tableId>`, or
    /// any name when an explicit table id is given, means every row of
    /// that table.
    pub fn resolve_view(&self, view_name: &str, table_id: Option<&str>) -> Result<ResolvedView> {
        if view_name.is_empty() {
            return Err(RowSearchError::Validation("A view name is required".into()));
        }

        let (owner, meta) = match self.tables.get_view(view_name)? {
            Some(view) => (view.meta.table_id.clone(), Some(view.meta)),
            None => {
                let owner = table_id
                    .filter(|id| !id.is_empty())
                    .or_else(|| {
                        view_name
                            .strip_prefix(ALL_ROWS_VIEW_PREFIX)
                            .filter(|id| !id.is_empty())
                    })
                    .ok_or_else(|| RowSearchError::not_found("view", view_name))?;
                (owner.to_string(), None)
            }
        };

        let table = self.tables.get_table(&owner).map_err(|e| match e {
            RowSearchError::NotFound { .. } => RowSearchError::Schema(format!(
                "Unable to resolve a schema for view '{view_name}': table '{owner}' does not exist"
            )),
            other => other,
        })?;

        Ok(ResolvedView {
            name: view_name.to_string(),
            table,
            meta,
        })
    }

    /// Materialize a resolved view: fetch the table's rows and apply the
    /// view's grouping and calculation.
    pub fn fetch_view(&self, view: &ResolvedView) -> Result<ViewRows> {
        let schema = view.schema()?;
        let rows = self.backend_for(&view.table).fetch_rows(&view.table)?;
        log::debug!("view {} read {} rows from {}", view.name, rows.len(), view.table.id);
        let rows = apply_view(rows, &view.query())?;
        Ok(ViewRows {
            name: view.name.clone(),
            schema,
            rows,
        })
    }
}
