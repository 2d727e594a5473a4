use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::{error::AccountError, state::AppState};

/// The authenticated caller of a management endpoint.
///
/// Holds `None` when the service runs without `AUTH_REQUIRED`. Otherwise the
/// bearer token must verify and its subject must still exist and be active,
/// so a blocked or deleted user is turned away on their next request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Option<Uuid>);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AccountError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if !state.config.auth_required {
            return Ok(Caller(None));
        }

        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AccountError::Unauthorized)?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(AccountError::Unauthorized)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AccountError::Unauthorized
        })?;

        match state.identity.find_active(claims.sub).await? {
            Some(user) => Ok(Caller(Some(user.id))),
            None => {
                warn!(user_id = %claims.sub, "token subject is blocked or deleted");
                Err(AccountError::Unauthorized)
            }
        }
    }
}
