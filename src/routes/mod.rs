use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    middleware::{
        admin_auth::{require_admin_token, AdminToken},
        request_id::{make_span_with_request_id, request_id_middleware},
    },
    services::{browse::MovieBrowser, recommendations::RecommendationService},
};

pub mod admin;
pub mod input;
pub mod movies;
pub mod recommendations;

/// Shared application state
pub struct AppState {
    pub recommender: Arc<RecommendationService>,
    pub browser: Arc<MovieBrowser>,
    pub admin_token: AdminToken,
}

impl AppState {
    pub fn new(recommender: Arc<RecommendationService>, browser: Arc<MovieBrowser>) -> Self {
        Self {
            recommender,
            browser,
            admin_token: AdminToken::default(),
        }
    }

    pub fn with_admin_token(mut self, token: Option<&str>) -> Self {
        self.admin_token = AdminToken::new(token);
        self
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let admin = Router::new()
        .route("/admin/rebuild", post(admin::rebuild))
        .route_layer(middleware::from_fn_with_state(
            state.admin_token.clone(),
            require_admin_token,
        ));

    Router::new()
        .route("/", get(home))
        .route("/home", get(home))
        .route("/health", get(health_check))
        .route("/recommend", post(recommendations::recommend))
        .route("/similarity", post(recommendations::similarity))
        .route("/api/suggestions", get(recommendations::suggestions))
        .route("/api/movies", get(movies::list_movies))
        .route("/api/movie/:id", get(movies::movie_details))
        .merge(admin)
        .with_state(state)
        // Outermost first: request ids exist before the trace span is opened
        .layer(
            ServiceBuilder::new()
                .layer(cors_layer(cors_origins))
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
}

/// CORS restricted to the configured frontend origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
}

/// API status and endpoint listing
async fn home() -> Json<Value> {
    Json(json!({
        "status": "active",
        "message": "Backend is live",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /health",
            "recommendations": "POST /recommend",
            "similarity": "POST /similarity",
            "suggestions": "GET /api/suggestions",
            "movies": "GET /api/movies",
            "movie_details": "GET /api/movie/<id>",
            "rebuild": "POST /admin/rebuild"
        }
    }))
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let index = match state.recommender.index().snapshot().await {
        Ok(Some(snapshot)) => json!({
            "status": "ready",
            "movies": snapshot.len(),
            "generation": snapshot.generation(),
        }),
        Ok(None) => json!({ "status": "building" }),
        Err(e) => json!({ "status": "unavailable", "reason": e.to_string() }),
    };

    (StatusCode::OK, Json(json!({ "status": "active", "index": index })))
}
