//! Authorization guard: caller identity from the session cookie plus the
//! route-level and ownership checks used by the handlers.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::session::{resolve_session, SESSION_COOKIE};
use crate::db::{Montaz, User};
use crate::AppState;

fn unauthenticated() -> ApiError {
    ApiError::unauthorized("Authentication required")
}

/// Extractor for the current authenticated user.
///
/// Resolves the session cookie on every request; an absent, expired or
/// revoked session — or one owned by a deactivated account — rejects with
/// 401 before the handler runs.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(unauthenticated)?;

        let resolved = resolve_session(&state.db, &token).await?;
        let (_session, user) = resolved.ok_or_else(unauthenticated)?;
        Ok(user)
    }
}

/// Route-level gate for admin-only operations.
pub fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.role.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Administrator access required"))
    }
}

/// Resource-level ownership: admins pass, installers only for their own
/// jobs. A mismatch is a hard 403 — the job's existence is not hidden.
pub fn ensure_montaz_owner(user: &User, montaz: &Montaz) -> Result<(), ApiError> {
    if user.role.is_admin() || montaz.montazysta_id == user.id {
        Ok(())
    } else {
        Err(ApiError::forbidden("You can only access jobs assigned to you"))
    }
}
