//! Credential verification and the login/logout endpoints.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, Json};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::session;
use crate::db::{DbPool, LoginRequest, LoginResponse, Role, User};
use crate::AppState;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("Invalid credentials")
}

/// Check an email/password pair against the stored hash.
///
/// Fails closed: an unknown email, a deactivated account and a wrong
/// password are indistinguishable to the caller.
pub async fn authenticate(db: &DbPool, email: &str, password: &str) -> Result<User, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(db)
        .await?;

    let user = user
        .filter(|u| u.is_active)
        .ok_or_else(invalid_credentials)?;

    if !verify_password(password, &user.password_hash) {
        return Err(invalid_credentials());
    }

    Ok(user)
}

/// Login endpoint. Issues the session cookie on success.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let user = authenticate(&state.db, &request.email, &request.password).await?;

    let session_days = state.config.auth.session_days;
    let (token, _expires_at) = session::create_session(&state.db, user.id, session_days).await?;

    let jar = jar.add(session::session_cookie(
        token,
        session_days,
        state.config.auth.secure_cookies,
    ));

    tracing::info!(user_id = user.id, role = %user.role, "User logged in");

    Ok((
        jar,
        Json(LoginResponse {
            ok: true,
            to: user.role.panel_path().to_string(),
        }),
    ))
}

/// Logout endpoint. Revokes the session row and clears the cookie.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    if let Some(cookie) = jar.get(session::SESSION_COOKIE) {
        session::revoke_session(&state.db, cookie.value()).await?;
    }

    let jar = jar.add(session::clear_session_cookie());
    Ok((jar, Json(serde_json::json!({ "ok": true }))))
}

/// Make sure the configured admin account exists and can log in.
///
/// Creates the account on first startup; on later startups re-asserts
/// role and active flag but never touches the password.
pub async fn ensure_admin_user(db: &DbPool, email: &str, password: &str) -> anyhow::Result<()> {
    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(db)
        .await?;

    match existing {
        None => {
            let password_hash = hash_password(password)
                .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?;
            let now = chrono::Utc::now().to_rfc3339();
            sqlx::query(
                "INSERT INTO users (email, password_hash, role, is_active, created_at, updated_at) VALUES (?, ?, ?, 1, ?, ?)",
            )
            .bind(email)
            .bind(&password_hash)
            .bind(Role::Admin)
            .bind(&now)
            .bind(&now)
            .execute(db)
            .await?;
            tracing::info!(email, "Created admin user");
        }
        Some(user) if user.role != Role::Admin || !user.is_active => {
            sqlx::query("UPDATE users SET role = ?, is_active = 1, updated_at = ? WHERE id = ?")
                .bind(Role::Admin)
                .bind(chrono::Utc::now().to_rfc3339())
                .bind(user.id)
                .execute(db)
                .await?;
            tracing::info!(email, "Restored admin privileges for existing user");
        }
        Some(_) => {}
    }

    Ok(())
}
