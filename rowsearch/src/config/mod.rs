use crate::backend::BackendKind;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE: &str = "config.yaml";

/// Tunables of the search engine, read from `config.yaml` in the data
/// directory. Missing keys fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Row ceiling for a single document store page.
    pub document_max_limit: usize,
    /// Row ceiling for a single relational page.
    pub relational_max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            document_max_limit: 1000,
            relational_max_limit: 5000,
        }
    }
}

impl SearchConfig {
    /// Load `config.yaml` from `dir`, or the defaults when it is absent.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(SearchConfig::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(SearchConfig::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn max_limit(&self, kind: BackendKind) -> usize {
        match kind {
            BackendKind::Document => self.document_max_limit,
            BackendKind::Relational => self.relational_max_limit,
        }
    }

    /// Clamp a requested page size: absent means the ceiling, zero means one.
    pub fn clamp_limit(&self, kind: BackendKind, requested: Option<u64>) -> usize {
        let ceiling = self.max_limit(kind).max(1);
        match requested {
            None => ceiling,
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX).clamp(1, ceiling),
        }
    }
}
