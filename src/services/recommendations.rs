use std::sync::Arc;

use crate::{
    error::AppResult,
    index::{IndexError, SimilarityIndex, Snapshot},
    models::{CatalogEntry, Recommendations, SimilarTitles},
    services::{catalog::CatalogSource, posters::PosterResolver},
};

pub const DEFAULT_TOP_K: usize = 10;

/// Content-based recommendations over the catalog
///
/// The single entry point used by the HTTP layer. Owns the build-on-demand policy
/// for the similarity index and pairs each similar title with a poster.
pub struct RecommendationService {
    index: Arc<SimilarityIndex>,
    catalog: Arc<dyn CatalogSource>,
    posters: PosterResolver,
    top_k: usize,
}

impl RecommendationService {
    pub fn new(
        index: Arc<SimilarityIndex>,
        catalog: Arc<dyn CatalogSource>,
        posters: PosterResolver,
    ) -> Self {
        Self {
            index,
            catalog,
            posters,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Number of similar titles returned per query
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn index(&self) -> &Arc<SimilarityIndex> {
        &self.index
    }

    /// Returns the current snapshot, building it first if nothing is cached.
    ///
    /// Concurrent callers that find the index empty queue on the index's build
    /// gate; only the first one loads the catalog, the rest join its result. An
    /// index whose first build failed stays unavailable until `rebuild` is called.
    pub async fn ensure_index(&self) -> Result<Arc<Snapshot>, IndexError> {
        let observed = self.index.generation();
        if let Some(snapshot) = self.index.snapshot().await? {
            return Ok(snapshot);
        }

        tracing::info!(catalog = %self.catalog.describe(), "Similarity index not built, building now");
        let catalog = self.catalog.clone();
        self.index
            .rebuild_since(observed, move || catalog.load())
            .await
    }

    /// Reloads the catalog and swaps in a freshly built index
    pub async fn rebuild(&self) -> AppResult<Arc<Snapshot>> {
        tracing::info!(catalog = %self.catalog.describe(), "Rebuilding similarity index");
        let catalog = self.catalog.clone();
        Ok(self.index.rebuild(move || catalog.load()).await?)
    }

    async fn similar_entries(&self, title: &str) -> Result<Vec<CatalogEntry>, IndexError> {
        let snapshot = self.ensure_index().await?;
        let entries = snapshot
            .top_k(title, self.top_k)?
            .into_iter()
            .cloned()
            .collect();
        Ok(entries)
    }

    /// Similar titles for `title`, without posters
    pub async fn similar_titles(&self, title: &str) -> AppResult<SimilarTitles> {
        let entries = self.similar_entries(title).await.map_err(log_lookup_failure(title))?;

        Ok(SimilarTitles {
            movies: entries.into_iter().map(|e| e.title).collect(),
            query: title.to_string(),
        })
    }

    /// Similar titles for `title`, each paired positionally with a poster
    pub async fn recommend(&self, title: &str) -> AppResult<Recommendations> {
        let entries = self.similar_entries(title).await.map_err(log_lookup_failure(title))?;

        let posters = self
            .posters
            .resolve_batch(
                entries
                    .iter()
                    .map(|e| (e.title.clone(), e.external_id))
                    .collect(),
            )
            .await;

        tracing::info!(
            query = %title,
            results = entries.len(),
            "Recommendations generated"
        );

        Ok(Recommendations {
            movies: entries.into_iter().map(|e| e.title).collect(),
            posters,
            query: title.to_string(),
        })
    }

    /// Every catalog title, capitalized for display in autocomplete.
    ///
    /// Served from the published snapshot when there is one. Otherwise the catalog
    /// is read directly, so autocomplete keeps working while the index is missing
    /// or unavailable. An unreadable catalog yields an empty list.
    pub async fn suggestions(&self) -> Vec<String> {
        if let Ok(Some(snapshot)) = self.index.snapshot().await {
            return capitalized_titles(snapshot.entries());
        }

        let catalog = self.catalog.clone();
        match tokio::task::spawn_blocking(move || catalog.load()).await {
            Ok(Ok(entries)) => capitalized_titles(&entries),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failed to load catalog for suggestions");
                Vec::new()
            }
            Err(e) => {
                tracing::error!(error = %e, "Suggestions task failed");
                Vec::new()
            }
        }
    }
}

fn capitalized_titles(entries: &[CatalogEntry]) -> Vec<String> {
    entries.iter().map(|e| capitalize(&e.title)).collect()
}

fn log_lookup_failure(title: &str) -> impl Fn(IndexError) -> IndexError + '_ {
    move |err| {
        match &err {
            IndexError::NotFound(_) => tracing::info!(query = %title, "Movie not in catalog"),
            IndexError::Unavailable(reason) => {
                tracing::error!(query = %title, reason = %reason, "Similarity index unavailable")
            }
        }
        err
    }
}

/// First character upper-cased, the rest lower-cased
fn capitalize(title: &str) -> String {
    let mut chars = title.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
