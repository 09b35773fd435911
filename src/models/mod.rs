use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod movie;

pub use movie::{MovieDetails, MoviePage, MovieRecord, MovieSummary};

/// A single movie in the recommendation catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    /// Display title as it appears in the dataset
    pub title: String,
    /// Cast, crew, genre and keyword tokens concatenated into one text blob
    pub combined_features: String,
    /// TMDB movie id, when the dataset carries one
    pub external_id: Option<u64>,
}

impl CatalogEntry {
    pub fn new(title: impl Into<String>, combined_features: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            combined_features: combined_features.into(),
            external_id: None,
        }
    }

    pub fn with_external_id(mut self, external_id: u64) -> Self {
        self.external_id = Some(external_id);
        self
    }

    /// Lookup key used for title matching
    pub fn lookup_key(&self) -> String {
        normalize_title(&self.title)
    }
}

/// Case-folds and trims a title so user input matches catalog rows
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Which step of the poster fallback chain produced a URL
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    DirectId,
    TitleSearch,
    Placeholder,
}

impl Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::DirectId => write!(f, "direct_id"),
            Tier::TitleSearch => write!(f, "title_search"),
            Tier::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// Display-ready poster URL for one movie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PosterResult {
    pub url: String,
    pub tier: Tier,
}

impl PosterResult {
    pub fn new(url: String, tier: Tier) -> Self {
        Self { url, tier }
    }
}

/// Similar movies for a query, paired positionally with their posters
#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub movies: Vec<String>,
    pub posters: Vec<PosterResult>,
    pub query: String,
}

/// Similar movies for a query, without poster enrichment
#[derive(Debug, Clone, Serialize)]
pub struct SimilarTitles {
    pub movies: Vec<String>,
    pub query: String,
}

// ============================================================================
// TMDB API Types
// ============================================================================

/// Response from GET /movie/{id}; everything but the poster is ignored
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    #[serde(default)]
    pub poster_path: Option<String>,
}

/// Response from GET /search/movie
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSearchResponse {
    #[serde(default)]
    pub results: Vec<TmdbMovie>,
}
