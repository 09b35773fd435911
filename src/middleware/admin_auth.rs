use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::error::AppError;

/// Shared secret guarding the admin routes; `None` disables them
#[derive(Clone, Debug, Default)]
pub struct AdminToken(Option<Arc<str>>);

impl AdminToken {
    pub fn new(token: Option<&str>) -> Self {
        Self(token.map(Arc::from))
    }

    fn accepts(&self, presented: &str) -> bool {
        self.0.as_deref().is_some_and(|expected| expected == presented)
    }
}

/// Rejects requests that do not carry `Authorization: Bearer <admin token>`
pub async fn require_admin_token(
    State(token): State<AdminToken>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if token.0.is_none() {
        return Err(AppError::Forbidden(
            "Admin endpoints are disabled".to_string(),
        ));
    }

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(presented) if token.accepts(presented) => Ok(next.run(request).await),
        _ => {
            tracing::warn!(path = %request.uri().path(), "Rejected admin request");
            Err(AppError::Unauthorized(
                "Missing or invalid admin token".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_only_the_configured_token() {
        let token = AdminToken::new(Some("s3cret"));
        assert!(token.accepts("s3cret"));
        assert!(!token.accepts("S3CRET"));
        assert!(!token.accepts(""));
    }

    #[test]
    fn test_unset_token_accepts_nothing() {
        let token = AdminToken::default();
        assert!(!token.accepts(""));
        assert!(!token.accepts("anything"));
    }
}
