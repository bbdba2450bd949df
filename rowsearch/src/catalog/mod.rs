// Table and view metadata lookup.

use crate::error::{Result, RowSearchError};
use crate::schema::{parse_catalog, parse_catalog_str, CatalogDefinition, Table, View};
use std::collections::HashMap;
use std::path::Path;

pub const CATALOG_FILE: &str = "tables.yaml";

/// Read access to table and saved-view definitions.
pub trait TableProvider: Send + Sync {
    /// The table definition, or `NotFound`.
    fn get_table(&self, table_id: &str) -> Result<Table>;

    /// A saved view by its unique name, if one exists.
    fn get_view(&self, view_name: &str) -> Result<Option<View>>;
}

/// Catalog loaded from `tables.yaml`. Views are declared under their
/// owning table but looked up by name, so view names must be unique.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    definition: CatalogDefinition,
    view_owners: HashMap<String, String>,
}

impl Catalog {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_definition(parse_catalog(path)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Self::from_definition(parse_catalog_str(content)?)
    }

    pub fn from_definition(definition: CatalogDefinition) -> Result<Self> {
        let mut view_owners = HashMap::new();
        for (table_id, table) in &definition.tables {
            for view_name in table.views.keys() {
                if let Some(previous) = view_owners.insert(view_name.clone(), table_id.clone()) {
                    return Err(RowSearchError::Schema(format!(
                        "View '{view_name}' is declared by both '{previous}' and '{table_id}'"
                    )));
                }
            }
        }
        Ok(Catalog {
            definition,
            view_owners,
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.definition.tables.values()
    }
}

impl TableProvider for Catalog {
    fn get_table(&self, table_id: &str) -> Result<Table> {
        self.definition
            .tables
            .get(table_id)
            .cloned()
            .ok_or_else(|| RowSearchError::not_found("table", table_id))
    }

    fn get_view(&self, view_name: &str) -> Result<Option<View>> {
        let view = self.view_owners.get(view_name).and_then(|table_id| {
            self.definition.tables[table_id]
                .views
                .get(view_name)
                .map(|meta| View {
                    name: view_name.to_string(),
                    meta: meta.clone(),
                })
        });
        Ok(view)
    }
}
