pub mod browse;
pub mod catalog;
pub mod posters;
pub mod recommendations;

pub use browse::{BrowseQuery, CsvMovies, MovieBrowser, MovieSource, StaticMovies};
pub use catalog::{CatalogSource, CsvCatalog, StaticCatalog};
pub use posters::PosterResolver;
pub use recommendations::RecommendationService;
