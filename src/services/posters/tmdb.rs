//! TMDB metadata provider
//!
//! Backs the two network tiers of the poster chain:
//! 1. Direct lookup: /movie/{id} → poster_path
//! 2. Title search: /search/movie?query=... → results[0].poster_path
//!
//! Every failure (timeout, non-200, malformed body, missing poster) is reported
//! as `None` so the resolver can fall through to the next tier.

use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::{sync::Arc, time::Duration};
use tracing::instrument;

use crate::{
    error::AppResult,
    models::{Tier, TmdbMovie, TmdbSearchResponse},
    services::posters::PosterTier,
};

/// Credentials longer than this are v4 read-access tokens (JWTs)
const BEARER_TOKEN_MIN_LEN: usize = 100;

/// How the TMDB credential is attached to each request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// v4 read-access token, sent as `Authorization: Bearer ...`
    Bearer(String),
    /// v3 API key, sent as the `api_key` query parameter
    ApiKey(String),
}

impl Credential {
    /// Picks the auth scheme from the credential's shape; `None` for a blank key
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        if key.is_empty() {
            None
        } else if key.len() > BEARER_TOKEN_MIN_LEN {
            Some(Credential::Bearer(key.to_string()))
        } else {
            Some(Credential::ApiKey(key.to_string()))
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credential::Bearer(token) => request.bearer_auth(token),
            Credential::ApiKey(key) => request.query(&[("api_key", key.as_str())]),
        }
    }
}

/// Thin TMDB client shared by the network tiers
#[derive(Debug, Clone)]
pub struct TmdbClient {
    http_client: HttpClient,
    api_url: String,
    image_base_url: String,
    credential: Credential,
}

impl TmdbClient {
    /// Creates a client whose every request is bounded by `timeout`
    pub fn new(
        api_url: String,
        image_base_url: String,
        credential: Credential,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            image_base_url: image_base_url.trim_end_matches('/').to_string(),
            credential,
        })
    }

    /// Display URL for a TMDB poster path
    pub fn image_url(&self, poster_path: &str) -> String {
        if poster_path.starts_with('/') {
            format!("{}{}", self.image_base_url, poster_path)
        } else {
            format!("{}/{}", self.image_base_url, poster_path)
        }
    }

    /// GET `path` and decode a 200 body; `None` on any failure
    #[instrument(skip(self, query))]
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Option<T> {
        let url = format!("{}{}", self.api_url, path);
        let request = self.credential.apply(self.http_client.get(&url)).query(query);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, timeout = e.is_timeout(), "TMDB request failed");
                return None;
            }
        };

        // Any other 2xx is a miss as well
        if response.status() != StatusCode::OK {
            tracing::debug!(url = %url, status = %response.status(), "TMDB returned non-200 status");
            return None;
        }

        match response.json::<T>().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to parse TMDB response");
                None
            }
        }
    }

    /// Poster URL for a TMDB movie id
    #[instrument(skip(self))]
    pub async fn poster_by_id(&self, movie_id: u64) -> Option<String> {
        let movie: TmdbMovie = self.get_json(&format!("/movie/{}", movie_id), &[]).await?;
        self.poster_url(movie.poster_path)
    }

    /// Poster URL of the first search hit for `title`
    #[instrument(skip(self))]
    pub async fn poster_by_title(&self, title: &str) -> Option<String> {
        let search: TmdbSearchResponse = self.get_json("/search/movie", &[("query", title)]).await?;
        let first = search.results.into_iter().next()?;
        self.poster_url(first.poster_path)
    }

    fn poster_url(&self, poster_path: Option<String>) -> Option<String> {
        poster_path
            .filter(|path| !path.trim().is_empty())
            .map(|path| self.image_url(&path))
    }
}

/// Tier 1: lookup by TMDB id, skipped when the movie has no id
pub struct DirectIdTier {
    client: Arc<TmdbClient>,
}

impl DirectIdTier {
    pub fn new(client: Arc<TmdbClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl PosterTier for DirectIdTier {
    fn tier(&self) -> Tier {
        Tier::DirectId
    }

    async fn attempt(&self, _title: &str, external_id: Option<u64>) -> Option<String> {
        match external_id {
            Some(id) if id != 0 => self.client.poster_by_id(id).await,
            _ => None,
        }
    }
}

/// Tier 2: free-text search on the title
pub struct TitleSearchTier {
    client: Arc<TmdbClient>,
}

impl TitleSearchTier {
    pub fn new(client: Arc<TmdbClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl PosterTier for TitleSearchTier {
    fn tier(&self) -> Tier {
        Tier::TitleSearch
    }

    async fn attempt(&self, title: &str, _external_id: Option<u64>) -> Option<String> {
        if title.trim().is_empty() {
            return None;
        }
        self.client.poster_by_title(title).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_client() -> TmdbClient {
        TmdbClient::new(
            "http://test.local/3/".to_string(),
            "https://image.tmdb.org/t/p/w500".to_string(),
            Credential::ApiKey("test_key".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_credential_short_key_is_api_key() {
        assert_eq!(
            Credential::from_key("0123456789abcdef"),
            Some(Credential::ApiKey("0123456789abcdef".to_string()))
        );
    }

    #[test]
    fn test_credential_long_key_is_bearer() {
        let token = "e".repeat(101);
        assert_eq!(Credential::from_key(&token), Some(Credential::Bearer(token)));
    }

    #[test]
    fn test_credential_boundary_is_api_key() {
        let key = "k".repeat(100);
        assert_eq!(Credential::from_key(&key), Some(Credential::ApiKey(key)));
    }

    #[test]
    fn test_credential_blank() {
        assert_eq!(Credential::from_key(""), None);
        assert_eq!(Credential::from_key("  "), None);
    }

    #[test]
    fn test_image_url() {
        let client = create_test_client();
        assert_eq!(
            client.image_url("/abc.jpg"),
            "https://image.tmdb.org/t/p/w500/abc.jpg"
        );
        assert_eq!(
            client.image_url("abc.jpg"),
            "https://image.tmdb.org/t/p/w500/abc.jpg"
        );
    }

    #[test]
    fn test_poster_url_ignores_blank_path() {
        let client = create_test_client();
        assert_eq!(client.poster_url(None), None);
        assert_eq!(client.poster_url(Some("".to_string())), None);
        assert_eq!(
            client.poster_url(Some("/x.jpg".to_string())),
            Some("https://image.tmdb.org/t/p/w500/x.jpg".to_string())
        );
    }

    #[tokio::test]
    async fn test_direct_tier_skips_missing_or_zero_id() {
        let tier = DirectIdTier::new(Arc::new(create_test_client()));
        assert_eq!(tier.tier(), Tier::DirectId);
        // No request is made, so the unreachable host is never contacted
        assert_eq!(tier.attempt("Inception", None).await, None);
        assert_eq!(tier.attempt("Inception", Some(0)).await, None);
    }

    #[tokio::test]
    async fn test_search_tier_skips_blank_title() {
        let tier = TitleSearchTier::new(Arc::new(create_test_client()));
        assert_eq!(tier.tier(), Tier::TitleSearch);
        assert_eq!(tier.attempt("   ", None).await, None);
    }
}
