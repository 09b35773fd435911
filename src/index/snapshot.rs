use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::{
    matrix::{DocumentTermMatrix, SimilarityMatrix},
    IndexError,
};
use crate::models::{normalize_title, CatalogEntry};

/// Immutable (catalog, similarity matrix) pair served to queries
#[derive(Debug)]
pub struct Snapshot {
    entries: Vec<CatalogEntry>,
    /// Normalized title → first row with that title
    lookup: HashMap<String, usize>,
    similarity: SimilarityMatrix,
    vocabulary_size: usize,
    generation: u64,
    built_at: DateTime<Utc>,
}

impl Snapshot {
    /// Builds the term matrix and full similarity matrix for a catalog.
    ///
    /// CPU bound; callers on the async runtime should run it on the blocking pool.
    pub fn build(entries: Vec<CatalogEntry>, generation: u64) -> Result<Self, IndexError> {
        if entries.is_empty() {
            return Err(IndexError::Unavailable("catalog is empty".to_string()));
        }

        let dtm = DocumentTermMatrix::build(entries.iter().map(|e| e.combined_features.as_str()));
        let similarity = SimilarityMatrix::cosine(&dtm);

        let mut lookup = HashMap::with_capacity(entries.len());
        for (row, entry) in entries.iter().enumerate() {
            lookup.entry(entry.lookup_key()).or_insert(row);
        }

        Ok(Self {
            entries,
            lookup,
            similarity,
            vocabulary_size: dtm.vocabulary_size(),
            generation,
            built_at: Utc::now(),
        })
    }

    /// The `k` entries most similar to `title`, best first.
    ///
    /// The query row itself is never returned. Equal scores keep catalog order.
    pub fn top_k(&self, title: &str, k: usize) -> Result<Vec<&CatalogEntry>, IndexError> {
        let key = normalize_title(title);
        let &row = self
            .lookup
            .get(&key)
            .ok_or_else(|| IndexError::NotFound(title.trim().to_string()))?;

        let mut ranked: Vec<(usize, f64)> = self
            .similarity
            .row(row)
            .iter()
            .copied()
            .enumerate()
            .filter(|&(j, _)| j != row)
            .collect();

        // sort_by is stable, so ties stay in load order
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(j, _)| &self.entries[j])
            .collect())
    }

    pub fn contains(&self, title: &str) -> bool {
        self.lookup.contains_key(&normalize_title(title))
    }

    pub fn score(&self, i: usize, j: usize) -> f64 {
        self.similarity.get(i, j)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary_size
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}
