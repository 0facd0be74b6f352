//! Session authentication extractor.
//!
//! Extracts a bearer token from `Authorization: Bearer <token>` and
//! verifies it against the sessions table via the identity provider.
//! Extracting this yields the verified caller identity.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use countersign_core::external::identity::IdentityProvider;
use countersign_types::error::AuthError;
use countersign_types::identity::Caller;

use crate::http::error::AppError;
use crate::state::AppState;

/// Authenticated request carrying the verified caller.
pub struct AuthSession(pub Caller);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(parts)?;
        let caller = state.identity.verify(&token).await?;
        Ok(AuthSession(caller))
    }
}

/// Extract the bearer token from the Authorization header.
fn extract_bearer(parts: &Parts) -> Result<String, AppError> {
    let Some(auth) = parts.headers.get("authorization") else {
        return Err(AppError::Auth(AuthError::MissingToken));
    };
    let auth_str = auth
        .to_str()
        .map_err(|_| AppError::Auth(AuthError::InvalidToken))?;
    auth_str
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .ok_or(AppError::Auth(AuthError::MissingToken))
}
