//! Shared-secret authentication for the `/api` routes

use crate::error::Error;
use crate::server::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

/// Reject requests whose `Authorization` header is not exactly the
/// configured secret.
pub async fn require_api_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Error> {
    let Some(secret) = state.config.api_secret.as_deref() else {
        tracing::error!("API_SECRET is not configured; rejecting API request");
        return Err(Error::ApiSecretNotConfigured);
    };

    let Some(provided) = request
        .headers()
        .get(AUTHORIZATION)
        .filter(|value| !value.is_empty())
    else {
        return Err(Error::MissingAuthorization);
    };

    if provided.as_bytes() != secret.as_bytes() {
        tracing::warn!(path = %request.uri().path(), "Rejected request with invalid API secret");
        return Err(Error::InvalidApiSecret);
    }

    Ok(next.run(request).await)
}
