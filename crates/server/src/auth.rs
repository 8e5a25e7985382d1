use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use ghost_common::ids::now_ms;
use ghost_common::token::Claims;

use crate::app::SharedState;
use crate::error::ApiError;

/// Extractor for creator-side handlers: verifies the bearer token and
/// exposes its claims. Expired or invalid tokens reject with 401 so the
/// client can refresh and retry.
pub struct AuthCreator(pub Claims);

#[axum::async_trait]
impl FromRequestParts<SharedState> for AuthCreator {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        app: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
        let claims = app
            .token_key
            .verify(token, now_ms())
            .map_err(|err| ApiError::Unauthorized(err.to_string()))?;
        Ok(AuthCreator(claims))
    }
}
