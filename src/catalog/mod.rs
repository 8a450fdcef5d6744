//! JSON catalogs backing the gateway: model configurations, characters, and
//! scenarios. Every store re-reads its file on each call; nothing is cached
//! across requests.

pub mod characters;
pub mod models;
pub mod prompt;
pub mod scenarios;

use std::fmt;
use std::path::PathBuf;

/// Errors raised by the catalog stores.
#[derive(Debug)]
pub enum CatalogError {
    /// Catalog file could not be read or written
    Io(PathBuf, std::io::Error),
    /// Catalog file contents are not valid JSON for the expected shape
    InvalidJson(PathBuf, serde_json::Error),
    /// Catalog has no entries to select from
    Empty(PathBuf),
    /// No record with the requested id
    NotFound(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Io(path, err) => {
                write!(f, "Failed to access {}: {}", path.display(), err)
            }
            CatalogError::InvalidJson(path, err) => {
                write!(f, "Invalid JSON in {}: {}", path.display(), err)
            }
            CatalogError::Empty(path) => {
                write!(f, "Catalog {} contains no entries", path.display())
            }
            CatalogError::NotFound(id) => write!(f, "'{id}' not found"),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Io(_, err) => Some(err),
            CatalogError::InvalidJson(_, err) => Some(err),
            _ => None,
        }
    }
}
