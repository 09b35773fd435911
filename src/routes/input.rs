use axum::{
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::Deserialize;

use crate::error::AppError;

/// Movie title fields accepted by the query endpoints
///
/// Bodies may be JSON or form-encoded; both `movie_title` and `name` are read.
#[derive(Debug, Default, Deserialize)]
pub struct TitleFields {
    #[serde(default)]
    pub movie_title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl TitleFields {
    /// First non-blank field in `movie_title`, `name` order
    pub fn movie_title_first(&self) -> Option<String> {
        non_blank(&self.movie_title).or_else(|| non_blank(&self.name))
    }

    /// First non-blank field in `name`, `movie_title` order
    pub fn name_first(&self) -> Option<String> {
        non_blank(&self.name).or_else(|| non_blank(&self.movie_title))
    }
}

fn non_blank(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[axum::async_trait]
impl<S> FromRequest<S> for TitleFields
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let Json(fields) = Json::<TitleFields>::from_request(request, state)
                .await
                .map_err(|e| AppError::InvalidInput(e.body_text()))?;
            Ok(fields)
        } else {
            let Form(fields) = Form::<TitleFields>::from_request(request, state)
                .await
                .map_err(|e| AppError::InvalidInput(e.body_text()))?;
            Ok(fields)
        }
    }
}
