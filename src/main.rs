use std::{sync::Arc, time::Duration};

use cinematch::{
    config::Config,
    db::{create_redis_client, Cache},
    index::SimilarityIndex,
    routes::{create_router, AppState},
    services::{CsvCatalog, CsvMovies, MovieBrowser, PosterResolver, RecommendationService},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let mut posters = PosterResolver::from_config(&config)?;
    let mut cache_writer = None;
    if let Some(redis_url) = &config.redis_url {
        let (cache, handle) = Cache::new(
            create_redis_client(redis_url)?,
            Duration::from_secs(config.poster_timeout_secs),
        )
        .await;
        posters = posters.with_cache(cache);
        cache_writer = Some(handle);
        tracing::info!("Poster cache enabled");
    }

    let recommender = Arc::new(
        RecommendationService::new(
            Arc::new(SimilarityIndex::new()),
            Arc::new(CsvCatalog::new(&config.catalog_path)),
            posters.clone(),
        )
        .with_top_k(config.recommendation_count),
    );

    // Warm the index in the background so the first request rarely pays for the build
    let warmup = recommender.clone();
    tokio::spawn(async move {
        if let Err(e) = warmup.ensure_index().await {
            tracing::error!(error = %e, "Startup index build failed");
        }
    });

    let browser = Arc::new(MovieBrowser::new(
        Arc::new(CsvMovies::new(&config.movies_path)),
        posters,
    ));
    let warmup = browser.clone();
    tokio::spawn(async move {
        if let Err(e) = warmup.table().await {
            tracing::warn!(error = %e, "Browsing data not loaded at startup");
        }
    });

    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set, admin endpoints are disabled");
    }

    let state = AppState::new(recommender, browser).with_admin_token(config.admin_token.as_deref());
    let app = create_router(Arc::new(state), &config.cors_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
