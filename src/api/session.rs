//! Opaque session tokens with hash-at-rest storage.
//!
//! The raw token exists only in the cookie and the response that issued it;
//! the database holds its SHA-256. A leaked session table therefore yields
//! nothing usable. Expiry is lazy: stale rows are inert and filtered at
//! resolution time, there is no sweep job.

use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::db::{DbPool, Session, User};

/// Session cookie name
pub const SESSION_COOKIE: &str = "session";

/// Entropy of the raw token in bytes.
const TOKEN_BYTES: usize = 48;

/// Generate a random session token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; TOKEN_BYTES] = rng.random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create a session row and hand back the raw token for the cookie.
pub async fn create_session(
    db: &DbPool,
    user_id: i64,
    session_days: i64,
) -> Result<(String, DateTime<Utc>), sqlx::Error> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    let now = Utc::now();
    let expires_at = now + Duration::days(session_days);

    sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
        .bind(&token_hash)
        .bind(user_id)
        .bind(expires_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(db)
        .await?;

    Ok((token, expires_at))
}

/// Resolve a presented token to its session and owning user.
///
/// Returns `None` for an unknown token, an expired session, or a session
/// whose owner has been deactivated. Read-only: safe to call from contexts
/// that cannot set cookies, stale rows are left in place.
pub async fn resolve_session(
    db: &DbPool,
    token: &str,
) -> Result<Option<(Session, User)>, sqlx::Error> {
    let token_hash = hash_token(token);

    let session: Option<Session> =
        sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ?")
            .bind(&token_hash)
            .fetch_optional(db)
            .await?;

    let Some(session) = session else {
        return Ok(None);
    };

    let expired = DateTime::parse_from_rfc3339(&session.expires_at)
        .map(|t| t < Utc::now())
        .unwrap_or(true);
    if expired {
        return Ok(None);
    }

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(session.user_id)
        .fetch_optional(db)
        .await?;

    match user {
        Some(user) if user.is_active => Ok(Some((session, user))),
        _ => Ok(None),
    }
}

/// Delete the session matching a token. Idempotent — a token that was never
/// issued or is already revoked is silently accepted.
pub async fn revoke_session(db: &DbPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(hash_token(token))
        .execute(db)
        .await?;
    Ok(())
}

/// Build the session cookie carrying the raw token.
pub fn session_cookie(token: String, session_days: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::days(session_days))
        .build()
}

/// Expired empty cookie that clears the session on the client.
pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}
