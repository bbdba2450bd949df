mod parser;
mod types;

pub use parser::{parse_catalog, parse_catalog_str, CatalogDefinition};
pub use types::*;
