//! Poster resolution
//!
//! Resolves a display-ready artwork URL for a movie by walking an ordered list of
//! tiers (TMDB lookup by id, TMDB title search) and falling back to a generated
//! placeholder. Resolution never fails: every tier error is absorbed here.

use std::{sync::Arc, time::Duration};

use crate::{
    config::Config,
    db::{Cache, CacheKey},
    error::AppResult,
    models::{PosterResult, Tier},
};

pub mod placeholder;
pub mod tmdb;

pub use placeholder::Placeholder;
pub use tmdb::{Credential, DirectIdTier, TitleSearchTier, TmdbClient};

const POSTER_CACHE_TTL: u64 = 604800; // 1 week

/// One fallible step of the poster chain
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PosterTier: Send + Sync {
    /// Which tier a success from this step is reported as
    fn tier(&self) -> Tier;

    /// Poster URL on success, `None` to fall through to the next tier
    async fn attempt(&self, title: &str, external_id: Option<u64>) -> Option<String>;
}

/// Tiered poster lookup with a total placeholder fallback
#[derive(Clone)]
pub struct PosterResolver {
    tiers: Arc<Vec<Box<dyn PosterTier>>>,
    placeholder: Placeholder,
    cache: Option<Cache>,
}

impl PosterResolver {
    pub fn new(tiers: Vec<Box<dyn PosterTier>>, placeholder: Placeholder) -> Self {
        Self {
            tiers: Arc::new(tiers),
            placeholder,
            cache: None,
        }
    }

    /// Resolver that never touches the network
    pub fn placeholder_only(placeholder: Placeholder) -> Self {
        Self::new(Vec::new(), placeholder)
    }

    /// Memoize network-tier results in Redis
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builds the TMDB chain from configuration.
    ///
    /// Without a credential both network tiers are skipped and every movie gets
    /// a placeholder.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let placeholder = Placeholder::new(&config.placeholder_url)?;

        let Some(credential) = config.tmdb_api_key.as_deref().and_then(Credential::from_key)
        else {
            tracing::warn!("TMDB_API_KEY is not set, posters will use placeholders");
            return Ok(Self::placeholder_only(placeholder));
        };

        let client = Arc::new(TmdbClient::new(
            config.tmdb_api_url.clone(),
            config.tmdb_image_base_url.clone(),
            credential,
            Duration::from_secs(config.poster_timeout_secs),
        )?);

        let tiers: Vec<Box<dyn PosterTier>> = vec![
            Box::new(DirectIdTier::new(client.clone())),
            Box::new(TitleSearchTier::new(client)),
        ];

        Ok(Self::new(tiers, placeholder))
    }

    /// Number of network tiers ahead of the placeholder
    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Best-effort poster for one movie
    pub async fn resolve(&self, title: &str, external_id: Option<u64>) -> PosterResult {
        if self.tiers.is_empty() {
            return self.placeholder.resolve(title);
        }

        let key = CacheKey::Poster {
            title: title.to_string(),
            external_id,
        };
        if let Some(cached) = self.cached(&key).await {
            return cached;
        }

        for tier in self.tiers.iter() {
            if let Some(url) = tier.attempt(title, external_id).await {
                tracing::debug!(title = %title, tier = %tier.tier(), "Poster resolved");
                let result = PosterResult::new(url, tier.tier());
                if let Some(cache) = &self.cache {
                    cache.set_in_background(&key, &result, POSTER_CACHE_TTL);
                }
                return result;
            }
        }

        tracing::debug!(title = %title, "No poster found, using placeholder");
        self.placeholder.resolve(title)
    }

    /// Resolves posters for many movies concurrently, preserving input order
    pub async fn resolve_batch(&self, movies: Vec<(String, Option<u64>)>) -> Vec<PosterResult> {
        let mut tasks = Vec::with_capacity(movies.len());

        for (title, external_id) in movies {
            let resolver = self.clone();
            let task_title = title.clone();
            let task =
                tokio::spawn(async move { resolver.resolve(&task_title, external_id).await });
            tasks.push((title, task));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for (title, task) in tasks {
            match task.await {
                Ok(poster) => results.push(poster),
                Err(e) => {
                    tracing::error!(title = %title, error = %e, "Poster task join error");
                    results.push(self.placeholder.resolve(&title));
                }
            }
        }

        results
    }

    async fn cached(&self, key: &CacheKey) -> Option<PosterResult> {
        let cache = self.cache.as_ref()?;
        match cache.get_from_cache::<PosterResult>(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, "Poster cache read failed");
                None
            }
        }
    }
}
