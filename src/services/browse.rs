//! Browsing over the wider movie table
//!
//! Search, filter, sort and paginate `movies.csv`, plus single-movie lookups.
//! Every returned movie carries a poster from the same resolver the
//! recommendations use.

use chrono::NaiveDate;
use serde::Deserialize;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::OnceCell;

use crate::{
    error::{AppError, AppResult},
    models::{MovieDetails, MoviePage, MovieRecord, MovieSummary},
    services::posters::PosterResolver,
};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Source of movie table rows
pub trait MovieSource: Send + Sync {
    fn load(&self) -> AppResult<Vec<MovieRecord>>;

    /// Description for logging and debugging
    fn describe(&self) -> String;
}

/// One row of `movies.csv`; unparseable numbers and dates read as missing
#[derive(Debug, Deserialize)]
struct MovieRow {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    id: Option<f64>,
    #[serde(default)]
    title: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    release_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    vote_average: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    popularity: Option<f64>,
    #[serde(default)]
    genres: String,
    #[serde(default)]
    overview: String,
    #[serde(default)]
    tagline: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    runtime: Option<f64>,
    #[serde(default)]
    director: String,
    #[serde(default)]
    cast: String,
}

impl From<MovieRow> for MovieRecord {
    fn from(row: MovieRow) -> Self {
        // Ids and runtimes come out of pandas as floats when the column has gaps
        let whole = |value: Option<f64>| value.filter(|v| v.is_finite() && *v >= 0.0);

        MovieRecord {
            id: whole(row.id).map(|v| v as u64).unwrap_or(0),
            title: row.title,
            release_date: row.release_date,
            vote_average: row.vote_average.filter(|v| v.is_finite()).unwrap_or(0.0),
            popularity: row.popularity.filter(|v| v.is_finite()).unwrap_or(0.0),
            genres: row.genres,
            overview: row.overview,
            tagline: row.tagline,
            runtime: whole(row.runtime).map(|v| v as u32).unwrap_or(0),
            director: row.director,
            cast: row.cast,
        }
    }
}

/// Movie table stored as a CSV file
#[derive(Debug, Clone)]
pub struct CsvMovies {
    path: PathBuf,
}

impl CsvMovies {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MovieSource for CsvMovies {
    fn load(&self) -> AppResult<Vec<MovieRecord>> {
        let unavailable =
            |e: csv::Error| AppError::DataUnavailable(format!("{}: {}", self.path.display(), e));

        let mut reader = csv::Reader::from_path(&self.path).map_err(unavailable)?;
        let mut movies = Vec::new();
        for row in reader.deserialize::<MovieRow>() {
            movies.push(MovieRecord::from(row.map_err(unavailable)?));
        }

        tracing::info!(
            path = %self.path.display(),
            movies = movies.len(),
            "Browsing data loaded"
        );

        Ok(movies)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Movie table held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticMovies {
    movies: Vec<MovieRecord>,
}

impl StaticMovies {
    pub fn new(movies: Vec<MovieRecord>) -> Self {
        Self { movies }
    }
}

impl MovieSource for StaticMovies {
    fn load(&self) -> AppResult<Vec<MovieRecord>> {
        Ok(self.movies.clone())
    }

    fn describe(&self) -> String {
        format!("static:{} movies", self.movies.len())
    }
}

/// Browse ordering; unknown values keep file order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    PopularityDesc,
    RatingDesc,
    ReleaseDateDesc,
    Unsorted,
}

impl SortOrder {
    pub fn parse(value: &str) -> Self {
        match value {
            "popularity.desc" => SortOrder::PopularityDesc,
            "vote_average.desc" => SortOrder::RatingDesc,
            "release_date.desc" => SortOrder::ReleaseDateDesc,
            _ => SortOrder::Unsorted,
        }
    }
}

/// Query string of `GET /api/movies`
#[derive(Debug, Clone, Deserialize)]
pub struct BrowseQuery {
    /// Case-insensitive substring of the title
    #[serde(default)]
    pub search: String,
    /// Case-insensitive substring of the genre list; `All` disables the filter
    #[serde(default)]
    pub genre: String,
    /// Exact release year; `Any` or an unparseable value disables the filter
    #[serde(default)]
    pub year: String,
    /// Minimum rating such as `7+`; `Any` or an unparseable value disables the filter
    #[serde(default)]
    pub rating: String,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_sort() -> String {
    "popularity.desc".to_string()
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for BrowseQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            genre: String::new(),
            year: String::new(),
            rating: String::new(),
            sort: default_sort(),
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl BrowseQuery {
    fn matches(&self, movie: &MovieRecord) -> bool {
        let search = self.search.trim().to_lowercase();
        if !search.is_empty() && !movie.title.to_lowercase().contains(&search) {
            return false;
        }

        let genre = self.genre.trim().to_lowercase();
        if !genre.is_empty() && genre != "all" && !movie.genres.to_lowercase().contains(&genre) {
            return false;
        }

        if let Some(year) = active_filter(&self.year).and_then(|y| y.parse::<i32>().ok()) {
            if movie.year() != year {
                return false;
            }
        }

        if let Some(min_rating) = active_filter(&self.rating)
            .and_then(|r| r.trim_end_matches('+').trim().parse::<f64>().ok())
        {
            if movie.vote_average < min_rating {
                return false;
            }
        }

        true
    }
}

/// `None` for an empty filter value or the `Any` sentinel
fn active_filter(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty() && !value.eq_ignore_ascii_case("any")).then_some(value)
}

/// Loaded movie table with its query operations
#[derive(Debug, Clone, Default)]
pub struct MovieTable {
    movies: Vec<MovieRecord>,
}

impl MovieTable {
    pub fn new(movies: Vec<MovieRecord>) -> Self {
        Self { movies }
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    /// First movie with the given id
    pub fn find(&self, id: u64) -> Option<&MovieRecord> {
        self.movies.iter().find(|movie| movie.id == id)
    }

    /// Filters, sorts and slices the table.
    ///
    /// Returns the requested page and the number of matches across all pages.
    /// Sorts are stable, so equal keys keep file order; missing release dates
    /// sort last.
    pub fn browse(&self, query: &BrowseQuery) -> AppResult<(Vec<&MovieRecord>, usize)> {
        if query.page == 0 {
            return Err(AppError::InvalidInput("page must be at least 1".to_string()));
        }
        if query.limit == 0 {
            return Err(AppError::InvalidInput("limit must be at least 1".to_string()));
        }
        let limit = query.limit.min(MAX_PAGE_SIZE);

        let mut matches: Vec<&MovieRecord> =
            self.movies.iter().filter(|movie| query.matches(movie)).collect();

        match SortOrder::parse(&query.sort) {
            SortOrder::PopularityDesc => {
                matches.sort_by(|a, b| b.popularity.total_cmp(&a.popularity))
            }
            SortOrder::RatingDesc => {
                matches.sort_by(|a, b| b.vote_average.total_cmp(&a.vote_average))
            }
            SortOrder::ReleaseDateDesc => matches.sort_by(|a, b| b.release_date.cmp(&a.release_date)),
            SortOrder::Unsorted => {}
        }

        let total = matches.len();
        let page = matches
            .into_iter()
            .skip((query.page - 1).saturating_mul(limit))
            .take(limit)
            .collect();

        Ok((page, total))
    }
}

/// Browse and detail lookups with posters
pub struct MovieBrowser {
    source: Arc<dyn MovieSource>,
    table: OnceCell<Arc<MovieTable>>,
    posters: PosterResolver,
}

impl MovieBrowser {
    pub fn new(source: Arc<dyn MovieSource>, posters: PosterResolver) -> Self {
        Self {
            source,
            table: OnceCell::new(),
            posters,
        }
    }

    /// The movie table, loaded on first use.
    ///
    /// A failed load is not remembered; the next call tries again.
    pub async fn table(&self) -> AppResult<Arc<MovieTable>> {
        self.table
            .get_or_try_init(|| self.load_table())
            .await
            .cloned()
    }

    async fn load_table(&self) -> AppResult<Arc<MovieTable>> {
        let source = self.source.clone();
        let movies = tokio::task::spawn_blocking(move || source.load())
            .await
            .map_err(|e| AppError::Internal(format!("movie table load task failed: {}", e)))?
            .map_err(|e| {
                tracing::error!(source = %self.source.describe(), error = %e, "Error loading browsing data");
                e
            })?;

        Ok(Arc::new(MovieTable::new(movies)))
    }

    /// One page of movies matching `query`, each with a poster
    pub async fn browse(&self, query: &BrowseQuery) -> AppResult<MoviePage> {
        let table = self.table().await?;
        let (rows, total) = table.browse(query)?;

        let posters = self
            .posters
            .resolve_batch(
                rows.iter()
                    .map(|movie| (movie.title.clone(), movie.external_id()))
                    .collect(),
            )
            .await;

        let movies: Vec<MovieSummary> = rows
            .iter()
            .zip(posters)
            .map(|(movie, poster)| MovieSummary::new(movie, poster.url))
            .collect();

        let limit = query.limit.min(MAX_PAGE_SIZE);
        tracing::debug!(total, page = query.page, returned = movies.len(), "Browse page served");

        Ok(MoviePage {
            movies,
            total,
            page: query.page,
            pages: total.div_ceil(limit),
        })
    }

    /// Full details for the movie with TMDB id `id`
    pub async fn details(&self, id: u64) -> AppResult<MovieDetails> {
        let table = self.table().await?;
        let movie = table
            .find(id)
            .ok_or_else(|| AppError::NotFound("Movie not found".to_string()))?;

        let poster = self.posters.resolve(&movie.title, movie.external_id()).await;
        Ok(MovieDetails::new(movie, poster.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::posters::Placeholder;
    use std::{
        io::Write,
        sync::atomic::{AtomicUsize, Ordering},
    };

    fn movie(id: u64, title: &str, year: i32, rating: f64, popularity: f64, genres: &str) -> MovieRecord {
        MovieRecord {
            id,
            title: title.to_string(),
            release_date: NaiveDate::from_ymd_opt(year, 6, 1),
            vote_average: rating,
            popularity,
            genres: genres.to_string(),
            ..MovieRecord::default()
        }
    }

    fn sample_table() -> MovieTable {
        MovieTable::new(vec![
            movie(27205, "Inception", 2010, 8.4, 90.0, "Action Science Fiction"),
            movie(155, "The Dark Knight", 2008, 8.5, 120.0, "Drama Action Crime"),
            movie(577922, "Tenet", 2020, 7.2, 150.0, "Action Thriller"),
            movie(949, "Heat", 1995, 7.9, 40.0, "Action Crime Drama"),
            MovieRecord::new(11, "Undated Crime Story"),
        ])
    }

    fn titles(rows: &[&MovieRecord]) -> Vec<String> {
        rows.iter().map(|m| m.title.clone()).collect()
    }

    fn browser_with(source: Arc<dyn MovieSource>) -> MovieBrowser {
        let placeholder = Placeholder::new("https://api.dicebear.com/7.x/initials/svg").unwrap();
        MovieBrowser::new(source, PosterResolver::placeholder_only(placeholder))
    }

    #[test]
    fn test_default_sort_is_popularity() {
        let table = sample_table();
        let (rows, total) = table.browse(&BrowseQuery::default()).unwrap();
        assert_eq!(total, 5);
        assert_eq!(
            titles(&rows),
            vec!["Tenet", "The Dark Knight", "Inception", "Heat", "Undated Crime Story"]
        );
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let table = sample_table();
        let query = BrowseQuery {
            search: "DARK".to_string(),
            ..BrowseQuery::default()
        };
        let (rows, total) = table.browse(&query).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, 155);
    }

    #[test]
    fn test_genre_filter_and_all_sentinel() {
        let table = sample_table();
        let crime = BrowseQuery {
            genre: "crime".to_string(),
            ..BrowseQuery::default()
        };
        assert_eq!(table.browse(&crime).unwrap().1, 2);

        let all = BrowseQuery {
            genre: "All".to_string(),
            ..BrowseQuery::default()
        };
        assert_eq!(table.browse(&all).unwrap().1, 5);
    }

    #[test]
    fn test_year_filter_ignores_any_and_garbage() {
        let table = sample_table();
        let year = |value: &str| BrowseQuery {
            year: value.to_string(),
            ..BrowseQuery::default()
        };
        assert_eq!(titles(&table.browse(&year("2010")).unwrap().0), vec!["Inception"]);
        assert_eq!(table.browse(&year("Any")).unwrap().1, 5);
        assert_eq!(table.browse(&year("twenty-ten")).unwrap().1, 5);
    }

    #[test]
    fn test_rating_filter_accepts_plus_suffix() {
        let table = sample_table();
        let query = BrowseQuery {
            rating: "8+".to_string(),
            sort: "vote_average.desc".to_string(),
            ..BrowseQuery::default()
        };
        let (rows, _) = table.browse(&query).unwrap();
        assert_eq!(titles(&rows), vec!["The Dark Knight", "Inception"]);
    }

    #[test]
    fn test_release_date_sort_puts_missing_dates_last() {
        let table = sample_table();
        let query = BrowseQuery {
            sort: "release_date.desc".to_string(),
            ..BrowseQuery::default()
        };
        let (rows, _) = table.browse(&query).unwrap();
        assert_eq!(
            titles(&rows),
            vec!["Tenet", "Inception", "The Dark Knight", "Heat", "Undated Crime Story"]
        );
    }

    #[test]
    fn test_unknown_sort_keeps_file_order() {
        let table = sample_table();
        let query = BrowseQuery {
            sort: "title.asc".to_string(),
            ..BrowseQuery::default()
        };
        let (rows, _) = table.browse(&query).unwrap();
        assert_eq!(rows[0].title, "Inception");
        assert_eq!(rows[4].title, "Undated Crime Story");
    }

    #[test]
    fn test_pagination() {
        let table = sample_table();
        let page = |page: usize| BrowseQuery {
            page,
            limit: 2,
            ..BrowseQuery::default()
        };

        let (rows, total) = table.browse(&page(2)).unwrap();
        assert_eq!(total, 5);
        assert_eq!(titles(&rows), vec!["Inception", "Heat"]);

        let (rows, _) = table.browse(&page(3)).unwrap();
        assert_eq!(titles(&rows), vec!["Undated Crime Story"]);

        let (rows, total) = table.browse(&page(9)).unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 5);
    }

    #[test]
    fn test_zero_page_or_limit_is_invalid() {
        let table = sample_table();
        let zero_page = BrowseQuery {
            page: 0,
            ..BrowseQuery::default()
        };
        assert!(matches!(table.browse(&zero_page), Err(AppError::InvalidInput(_))));

        let zero_limit = BrowseQuery {
            limit: 0,
            ..BrowseQuery::default()
        };
        assert!(matches!(table.browse(&zero_limit), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_load_csv_coerces_bad_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"id,title,release_date,vote_average,popularity,genres,overview,tagline,runtime,director,cast\n\
              27205,Inception,2010-07-15,8.4,90.5,Action Science,A thief.,Your mind.,148.0,Christopher Nolan,\"['Leonardo DiCaprio']\"\n\
              155.0,The Dark Knight,not-a-date,,,Drama,,,,,\n",
        )
        .unwrap();

        let movies = CsvMovies::new(file.path()).load().unwrap();
        assert_eq!(movies.len(), 2);

        assert_eq!(movies[0].id, 27205);
        assert_eq!(movies[0].year(), 2010);
        assert_eq!(movies[0].runtime, 148);
        assert_eq!(movies[0].cast, "['Leonardo DiCaprio']");

        assert_eq!(movies[1].id, 155);
        assert_eq!(movies[1].release_date, None);
        assert_eq!(movies[1].vote_average, 0.0);
        assert_eq!(movies[1].runtime, 0);
    }

    #[test]
    fn test_missing_file_is_data_unavailable() {
        let err = CsvMovies::new("/nonexistent/movies.csv").load().unwrap_err();
        assert!(matches!(err, AppError::DataUnavailable(msg) if msg.contains("movies.csv")));
    }

    #[tokio::test]
    async fn test_browse_attaches_posters() {
        let browser = browser_with(Arc::new(StaticMovies::new(vec![
            movie(155, "The Dark Knight", 2008, 8.5, 120.0, "Drama Action"),
        ])));

        let page = browser.browse(&BrowseQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.pages, 1);
        assert_eq!(page.movies[0].genre, "Drama");
        assert!(page.movies[0].poster.contains("seed=TD"));
    }

    #[tokio::test]
    async fn test_pages_round_up_and_limit_is_capped() {
        let movies: Vec<MovieRecord> = (1..=205)
            .map(|id| MovieRecord::new(id, format!("Movie {}", id)))
            .collect();
        let browser = browser_with(Arc::new(StaticMovies::new(movies)));

        let query = BrowseQuery {
            limit: 1000,
            ..BrowseQuery::default()
        };
        let page = browser.browse(&query).await.unwrap();
        assert_eq!(page.movies.len(), MAX_PAGE_SIZE);
        assert_eq!(page.total, 205);
        assert_eq!(page.pages, 3);
    }

    #[tokio::test]
    async fn test_details() {
        let browser = browser_with(Arc::new(StaticMovies::new(sample_table().movies)));

        let details = browser.details(949).await.unwrap();
        assert_eq!(details.title, "Heat");
        assert_eq!(details.genres, vec!["Action", "Crime", "Drama"]);
        assert_eq!(details.director, "Unknown");

        let err = browser.details(1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg == "Movie not found"));
    }

    struct FlakySource {
        loads: AtomicUsize,
    }

    impl MovieSource for FlakySource {
        fn load(&self) -> AppResult<Vec<MovieRecord>> {
            if self.loads.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AppError::DataUnavailable("disk not mounted".to_string()))
            } else {
                Ok(vec![MovieRecord::new(1, "Heat")])
            }
        }

        fn describe(&self) -> String {
            "flaky".to_string()
        }
    }

    #[tokio::test]
    async fn test_failed_load_is_retried_then_cached() {
        let source = Arc::new(FlakySource {
            loads: AtomicUsize::new(0),
        });
        let browser = browser_with(source.clone());

        let err = browser.browse(&BrowseQuery::default()).await.unwrap_err();
        assert!(matches!(err, AppError::DataUnavailable(_)));

        assert_eq!(browser.browse(&BrowseQuery::default()).await.unwrap().total, 1);
        assert_eq!(browser.details(1).await.unwrap().title, "Heat");
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }
}
