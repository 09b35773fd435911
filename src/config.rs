use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// TMDB credential: a v3 API key or a v4 read-access token
    #[serde(default)]
    pub tmdb_api_key: Option<String>,

    /// TMDB API base URL
    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// CDN prefix prepended to TMDB poster paths
    #[serde(default = "default_tmdb_image_base_url")]
    pub tmdb_image_base_url: String,

    /// Placeholder image generator used when no artwork is found
    #[serde(default = "default_placeholder_url")]
    pub placeholder_url: String,

    /// Timeout applied to each metadata request, in seconds
    #[serde(default = "default_poster_timeout_secs")]
    pub poster_timeout_secs: u64,

    /// Path to the catalog CSV (`movie_title`, `comb` columns)
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// Path to the browsing table CSV (`id`, `title`, `release_date`, ... columns)
    #[serde(default = "default_movies_path")]
    pub movies_path: String,

    /// Bearer token for `/admin/*`; admin routes answer 403 when unset
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Redis connection URL; poster caching is disabled when unset
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Allowed CORS origins, comma separated
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Number of similar movies returned per query
    #[serde(default = "default_recommendation_count")]
    pub recommendation_count: usize,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_tmdb_image_base_url() -> String {
    "https://image.tmdb.org/t/p/w500".to_string()
}

fn default_placeholder_url() -> String {
    "https://api.dicebear.com/7.x/initials/svg".to_string()
}

fn default_poster_timeout_secs() -> u64 {
    5
}

fn default_catalog_path() -> String {
    "./Artifacts/main_data.csv".to_string()
}

fn default_movies_path() -> String {
    "./Artifacts/movies.csv".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "https://end-to-end-movie-recommendation-sys.vercel.app".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

fn default_recommendation_count() -> usize {
    10
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of variables
    pub fn from_vars<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = envy::from_iter::<_, Config>(vars)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        // An empty TMDB_API_KEY= line in .env means "no credential"
        config.tmdb_api_key = non_blank(config.tmdb_api_key);
        config.admin_token = non_blank(config.admin_token);

        Ok(config)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
