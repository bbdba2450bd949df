use thiserror::Error;

#[derive(Error, Debug)]
pub enum RowSearchError {
    /// The request is malformed; maps to a 400-class response.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {kind}/{id}")]
    NotFound { kind: String, id: String },

    /// The table/view configuration cannot serve the request.
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl RowSearchError {
    pub fn not_found(kind: &str, id: &str) -> Self {
        RowSearchError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    /// Whether the caller, not the system, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RowSearchError::Validation(_) | RowSearchError::NotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RowSearchError>;
