use serde::Deserialize;
use std::path::PathBuf;

use crate::{index::IndexError, models::CatalogEntry};

/// Source of catalog rows for (re)building the similarity index
///
/// Loading is synchronous file I/O; the index runs it on the blocking pool.
pub trait CatalogSource: Send + Sync {
    fn load(&self) -> Result<Vec<CatalogEntry>, IndexError>;

    /// Description for logging and debugging
    fn describe(&self) -> String;
}

/// One row of the preprocessed dataset
#[derive(Debug, Deserialize)]
struct CatalogRow {
    movie_title: String,
    #[serde(default)]
    comb: String,
    #[serde(default, alias = "id", alias = "tmdb_id")]
    movie_id: Option<u64>,
}

impl From<CatalogRow> for CatalogEntry {
    fn from(row: CatalogRow) -> Self {
        CatalogEntry {
            title: row.movie_title,
            combined_features: row.comb,
            external_id: row.movie_id.filter(|&id| id != 0),
        }
    }
}

/// Catalog stored as a CSV file with `movie_title` and `comb` columns
#[derive(Debug, Clone)]
pub struct CsvCatalog {
    path: PathBuf,
}

impl CsvCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogSource for CsvCatalog {
    fn load(&self) -> Result<Vec<CatalogEntry>, IndexError> {
        let unavailable =
            |e: csv::Error| IndexError::Unavailable(format!("{}: {}", self.path.display(), e));

        let mut reader = csv::Reader::from_path(&self.path).map_err(unavailable)?;
        let mut entries = Vec::new();
        for row in reader.deserialize::<CatalogRow>() {
            entries.push(CatalogEntry::from(row.map_err(unavailable)?));
        }

        tracing::info!(
            path = %self.path.display(),
            movies = entries.len(),
            "Catalog loaded"
        );

        Ok(entries)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Catalog held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<CatalogEntry>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }
}

impl CatalogSource for StaticCatalog {
    fn load(&self) -> Result<Vec<CatalogEntry>, IndexError> {
        Ok(self.entries.clone())
    }

    fn describe(&self) -> String {
        format!("static:{} movies", self.entries.len())
    }
}
