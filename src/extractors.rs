use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// Header that carries the signed credential.
pub const AUTH_HEADER: &str = "x-auth-token";

/// The authenticated caller, resolved from the `x-auth-token` header.
///
/// This is a pure gate: the token is verified against the server secret
/// and the embedded user id attached to the request. It never touches
/// the database; handlers that need the full user record load it
/// themselves.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTH_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized("No token, authorization denied".to_string())
            })?;

        // Malformed, expired, and bad-signature tokens are all rejected
        // the same way
        let user_id = state
            .tokens
            .verify(token)
            .map_err(|_| AppError::Unauthorized("Token is not valid".to_string()))?;

        Ok(CurrentUser { id: user_id })
    }
}
