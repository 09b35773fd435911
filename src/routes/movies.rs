use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{MovieDetails, MoviePage},
    routes::AppState,
    services::BrowseQuery,
};

/// Handler for searching and paging through the movie table
pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BrowseQuery>,
) -> AppResult<Json<MoviePage>> {
    Ok(Json(state.browser.browse(&query).await?))
}

/// Handler for a single movie's details
pub async fn movie_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> AppResult<Json<MovieDetails>> {
    Ok(Json(state.browser.details(id).await?))
}
