use axum::{extract::State, Extension, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    routes::{input::TitleFields, AppState},
};

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub movies: Vec<String>,
    /// Poster URLs, positionally paired with `movies`
    pub posters: Vec<String>,
    pub query: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct SimilarityResponse {
    pub movies: Vec<String>,
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<String>,
}

/// Handler for recommendations with posters
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    fields: TitleFields,
) -> AppResult<Json<RecommendResponse>> {
    let title = fields
        .movie_title_first()
        .ok_or_else(|| AppError::InvalidInput("movie_title is required".to_string()))?;

    tracing::info!(request_id = %request_id, query = %title, "Processing recommendation request");

    let recommendations = state.recommender.recommend(&title).await?;
    let count = recommendations.movies.len();

    Ok(Json(RecommendResponse {
        movies: recommendations.movies,
        posters: recommendations.posters.into_iter().map(|p| p.url).collect(),
        query: recommendations.query,
        count,
    }))
}

/// Handler for similar titles without posters
pub async fn similarity(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    fields: TitleFields,
) -> AppResult<Json<SimilarityResponse>> {
    let title = fields
        .name_first()
        .ok_or_else(|| AppError::InvalidInput("Movie name is required".to_string()))?;

    tracing::info!(request_id = %request_id, query = %title, "Processing similarity request");

    let similar = state.recommender.similar_titles(&title).await?;
    Ok(Json(SimilarityResponse {
        movies: similar.movies,
        query: similar.query,
    }))
}

/// Handler for autocomplete suggestions
pub async fn suggestions(State(state): State<Arc<AppState>>) -> Json<SuggestionsResponse> {
    let suggestions = state.recommender.suggestions().await;
    Json(SuggestionsResponse { suggestions })
}
