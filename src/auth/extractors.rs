use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::{db::User, error::AppError, state::AppState};

/// The authenticated caller, resolved from `Authorization: Bearer <jwt>`
/// (or `Token <jwt>`) to an active user.
pub struct AuthUser(pub User);

fn token_from_header(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    let known = scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token");
    (known && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized("Authentication credentials were not provided.".into())
            })?;

        let token = token_from_header(header)
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header.".into()))?;

        let claims = JwtKeys::from_ref(state).verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::Unauthorized("Invalid or expired token.".into())
        })?;

        match state.store.find_user(claims.sub).await? {
            Some(user) if user.is_active => Ok(AuthUser(user)),
            Some(_) => {
                warn!(user_id = %claims.sub, "token for inactive user");
                Err(AppError::Unauthorized("User inactive or deleted.".into()))
            }
            None => {
                warn!(user_id = %claims.sub, "token for unknown user");
                Err(AppError::Unauthorized("User inactive or deleted.".into()))
            }
        }
    }
}
