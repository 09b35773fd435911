use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::{error::AppResult, middleware::request_id::RequestId, routes::AppState};

#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub status: &'static str,
    pub movies: usize,
    pub vocabulary: usize,
    pub generation: u64,
    pub built_at: DateTime<Utc>,
}

/// Handler for an explicit similarity index rebuild
pub async fn rebuild(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<RebuildResponse>> {
    tracing::info!(request_id = %request_id, "Rebuild requested");

    let snapshot = state.recommender.rebuild().await?;

    Ok(Json(RebuildResponse {
        status: "rebuilt",
        movies: snapshot.len(),
        vocabulary: snapshot.vocabulary_size(),
        generation: snapshot.generation(),
        built_at: snapshot.built_at(),
    }))
}
