use crate::error::{Result, RowSearchError};
use super::types::{Table, TableSchema};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level table catalog parsed from tables.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDefinition {
    #[serde(default)]
    pub tables: IndexMap<String, Table>,
}

/// Parse a tables.yaml file into a CatalogDefinition
pub fn parse_catalog(path: &Path) -> Result<CatalogDefinition> {
    let content = std::fs::read_to_string(path)?;
    parse_catalog_str(&content)
}

/// Parse a catalog YAML string into a CatalogDefinition.
/// Table ids, field names and view table ids are filled in from their keys.
pub fn parse_catalog_str(content: &str) -> Result<CatalogDefinition> {
    let mut catalog: CatalogDefinition = serde_yaml::from_str(content)?;

    for (table_id, table) in catalog.tables.iter_mut() {
        if table.id.is_empty() {
            table.id = table_id.clone();
        } else if &table.id != table_id {
            return Err(RowSearchError::Schema(format!(
                "Table '{table_id}' declares a different id '{}'",
                table.id
            )));
        }
        fill_field_names(&mut table.schema);
        for view in table.views.values_mut() {
            if view.table_id.is_empty() {
                view.table_id = table_id.clone();
            }
            if let Some(schema) = view.schema.as_mut() {
                fill_field_names(schema);
            }
        }
    }

    Ok(catalog)
}

fn fill_field_names(schema: &mut TableSchema) {
    for (key, field) in schema.iter_mut() {
        if field.name.is_empty() {
            field.name = key.clone();
        }
        if let Some(columns) = field.columns.as_mut() {
            fill_field_names(columns);
        }
    }
}
