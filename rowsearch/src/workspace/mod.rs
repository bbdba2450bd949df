use crate::backend::{BackendKind, DocumentStore, RelationalStore, SearchBackend};
use crate::catalog::{Catalog, TableProvider, CATALOG_FILE};
use crate::config::SearchConfig;
use crate::error::{Result, RowSearchError};
use crate::row::Row;
use crate::search::SearchEngine;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the document store inside a data directory.
pub const DOCUMENT_DB_FILE: &str = "_rows.db";
/// File name of the relational store inside a data directory.
pub const RELATIONAL_DB_FILE: &str = "_tables.db";

/// The main entry point for rowsearch.
/// Opens a data directory, loads the table catalog and configuration,
/// opens both row stores and wires them into a [`SearchEngine`].
pub struct Workspace {
    root: Option<PathBuf>,
    catalog: Arc<Catalog>,
    documents: Arc<DocumentStore>,
    relational: Arc<RelationalStore>,
    engine: SearchEngine,
}

impl Workspace {
    /// Open a workspace at the given data directory.
    /// Requires tables.yaml; config.yaml is optional.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(RowSearchError::Schema(format!(
                "Data directory does not exist: {}",
                root.display()
            )));
        }

        let catalog_path = root.join(CATALOG_FILE);
        if !catalog_path.exists() {
            return Err(RowSearchError::Schema(format!(
                "{CATALOG_FILE} not found in {}",
                root.display()
            )));
        }

        let catalog = Catalog::open(&catalog_path)?;
        let config = SearchConfig::load(&root)?;
        let documents = DocumentStore::open(&root.join(DOCUMENT_DB_FILE))?;
        let relational = RelationalStore::open(&root.join(RELATIONAL_DB_FILE))?;
        log::info!(
            "Opened workspace at {} ({} tables)",
            root.display(),
            catalog.tables().count()
        );

        Ok(Self::assemble(Some(root), catalog, documents, relational, config))
    }

    /// A workspace backed by in-memory stores (for testing).
    pub fn in_memory(catalog: Catalog) -> Result<Self> {
        Ok(Self::assemble(
            None,
            catalog,
            DocumentStore::open_in_memory()?,
            RelationalStore::open_in_memory()?,
            SearchConfig::default(),
        ))
    }

    fn assemble(
        root: Option<PathBuf>,
        catalog: Catalog,
        documents: DocumentStore,
        relational: RelationalStore,
        config: SearchConfig,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let documents = Arc::new(documents);
        let relational = Arc::new(relational);

        let tables: Arc<dyn TableProvider> = catalog.clone();
        let document_backend: Arc<dyn SearchBackend> = documents.clone();
        let relational_backend: Arc<dyn SearchBackend> = relational.clone();
        let engine = SearchEngine::new(tables, document_backend, relational_backend, config);

        Workspace {
            root,
            catalog,
            documents,
            relational,
            engine,
        }
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn relational(&self) -> &RelationalStore {
        &self.relational
    }

    /// Load rows into a table's store. Internal rows without an `_id` get a
    /// generated one; returns the ids written (empty for external tables).
    pub fn import_rows(&self, table_id: &str, rows: &[Row]) -> Result<Vec<String>> {
        let table = self.catalog.get_table(table_id)?;
        let mut ids = Vec::new();
        match BackendKind::for_table(&table) {
            BackendKind::Document => {
                for row in rows {
                    ids.push(self.documents.upsert_row(&table.id, row)?);
                }
            }
            BackendKind::Relational => {
                for row in rows {
                    self.relational.insert_row(table.sql_table_name(), row)?;
                }
            }
        }
        log::info!("Imported {} rows into {}", rows.len(), table.id);
        Ok(ids)
    }
}
