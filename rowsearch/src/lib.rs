pub mod backend;
pub mod catalog;
pub mod config;
pub mod datetime;
pub mod enrich;
pub mod error;
pub mod export;
pub mod query;
pub mod related;
pub mod row;
pub mod schema;
pub mod search;
pub mod view;
pub mod workspace;

pub use catalog::{Catalog, TableProvider};
pub use config::SearchConfig;
pub use error::{Result, RowSearchError};
pub use export::{ExportFile, ExportRequest};
pub use query::{Bookmark, ExportFormat, SearchParams, SearchQuery, SearchResult};
pub use row::Row;
pub use search::SearchEngine;
pub use workspace::Workspace;
