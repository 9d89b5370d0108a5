//! User account management endpoints, admin only.
//!
//! Accounts are never hard-deleted; the PATCH endpoint toggles the active
//! flag instead so job history keeps a valid installer reference.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::auth::hash_password;
use crate::api::error::{ApiError, ValidationErrorBuilder};
use crate::api::guard::require_admin;
use crate::api::validation;
use crate::db::{CreateUserRequest, UpdateUserRequest, User, UserResponse, UserWithMontazeCount};
use crate::AppState;

/// List accounts with the number of montaże assigned to each.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<UserWithMontazeCount>>, ApiError> {
    require_admin(&user)?;

    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    let mut results = Vec::with_capacity(users.len());
    for u in users {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM montaze WHERE montazysta_id = ?")
                .bind(u.id)
                .fetch_one(&state.db)
                .await?;

        results.push(UserWithMontazeCount {
            user: UserResponse::from(u),
            montaze_count: count.0,
        });
    }

    Ok(Json(results))
}

fn validate_account_fields(email: &str, password: Option<&str>) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validation::validate_email(email) {
        errors.add("email", e);
    }
    if let Some(password) = password {
        if let Err(e) = validation::validate_password(password) {
            errors.add("password", e);
        }
    }

    errors.finish()
}

/// Create an account. Duplicate emails surface as 409.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    require_admin(&user)?;
    validate_account_fields(&req.email, Some(&req.password))?;

    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, role, is_active, telefon, adres, model_panela, notatka, created_at, updated_at)
        VALUES (?, ?, ?, 1, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&req.email)
    .bind(&password_hash)
    .bind(req.role)
    .bind(&req.telefon)
    .bind(&req.adres)
    .bind(&req.model_panela)
    .bind(&req.notatka)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let created: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&state.db)
        .await?;

    tracing::info!(user_id = created.id, email = %created.email, "User created");
    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

/// Update email, role, profile fields and optionally the password.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_admin(&user)?;
    validate_account_fields(&req.email, req.password.as_deref())?;

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found("User not found"))?;

    let password_hash = match &req.password {
        Some(password) => hash_password(password)
            .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?,
        None => existing.password_hash.clone(),
    };

    sqlx::query(
        r#"
        UPDATE users SET email = ?, password_hash = ?, role = ?, telefon = ?,
            adres = ?, model_panela = ?, notatka = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.email)
    .bind(&password_hash)
    .bind(req.role)
    .bind(&req.telefon)
    .bind(&req.adres)
    .bind(&req.model_panela)
    .bind(&req.notatka)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(id)
    .execute(&state.db)
    .await?;

    let updated: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(UserResponse::from(updated)))
}

/// Flip the active flag. Deactivation is the only way to retire an account.
pub async fn toggle_user_active(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    require_admin(&user)?;

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found("User not found"))?;

    sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
        .bind(!existing.is_active)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id)
        .execute(&state.db)
        .await?;

    let updated: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(user_id = id, is_active = updated.is_active, "User active flag toggled");
    Ok(Json(UserResponse::from(updated)))
}
