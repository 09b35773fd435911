use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// One row of the wider movie table used for browsing
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MovieRecord {
    /// TMDB movie id, 0 when the row has none
    pub id: u64,
    pub title: String,
    pub release_date: Option<NaiveDate>,
    pub vote_average: f64,
    pub popularity: f64,
    /// Space separated genre names
    pub genres: String,
    pub overview: String,
    pub tagline: String,
    /// Minutes, 0 when unknown
    pub runtime: u32,
    pub director: String,
    /// Cast list as stored in the dataset
    pub cast: String,
}

impl MovieRecord {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Self::default()
        }
    }

    /// Release year, 0 when the date is missing or unparseable
    pub fn year(&self) -> i32 {
        self.release_date.map(|date| date.year()).unwrap_or(0)
    }

    pub fn genre_list(&self) -> Vec<String> {
        self.genres.split_whitespace().map(str::to_string).collect()
    }

    /// First listed genre, shown on browse cards
    pub fn primary_genre(&self) -> &str {
        self.genres.split_whitespace().next().unwrap_or("Unknown")
    }

    /// TMDB id for poster lookup
    pub fn external_id(&self) -> Option<u64> {
        Some(self.id).filter(|&id| id != 0)
    }
}

/// Browse card: the fields shown in a movie grid
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MovieSummary {
    pub id: u64,
    pub title: String,
    pub poster: String,
    pub year: i32,
    pub rating: f64,
    pub genre: String,
}

impl MovieSummary {
    pub fn new(record: &MovieRecord, poster: String) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            poster,
            year: record.year(),
            rating: record.vote_average,
            genre: record.primary_genre().to_string(),
        }
    }
}

/// Full movie page
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MovieDetails {
    pub id: u64,
    pub title: String,
    pub poster: String,
    pub year: i32,
    pub rating: f64,
    pub genres: Vec<String>,
    pub overview: String,
    pub tagline: String,
    pub runtime: u32,
    pub director: String,
    pub cast: String,
}

impl MovieDetails {
    pub fn new(record: &MovieRecord, poster: String) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            poster,
            year: record.year(),
            rating: record.vote_average,
            genres: record.genre_list(),
            overview: record.overview.clone(),
            tagline: record.tagline.clone(),
            runtime: record.runtime,
            director: non_empty_or(&record.director, "Unknown"),
            cast: non_empty_or(&record.cast, "[]"),
        }
    }
}

/// One page of browse results
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MoviePage {
    pub movies: Vec<MovieSummary>,
    /// Matches across all pages
    pub total: usize,
    pub page: usize,
    pub pages: usize,
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
