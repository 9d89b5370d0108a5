//! Client record endpoints, admin only. Plain CRUD with name validation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ValidationErrorBuilder};
use crate::api::guard::require_admin;
use crate::api::validation;
use crate::db::{CreateKlientRequest, Klient, UpdateKlientRequest, User};
use crate::AppState;

fn validate_names(imie: &str, nazwisko: &str) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validation::validate_name(imie, "First name") {
        errors.add("imie", e);
    }
    if let Err(e) = validation::validate_name(nazwisko, "Last name") {
        errors.add("nazwisko", e);
    }

    errors.finish()
}

pub async fn list_klienci(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<Klient>>, ApiError> {
    require_admin(&user)?;

    let klienci: Vec<Klient> = sqlx::query_as("SELECT * FROM klienci ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(klienci))
}

pub async fn create_klient(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateKlientRequest>,
) -> Result<(StatusCode, Json<Klient>), ApiError> {
    require_admin(&user)?;
    validate_names(&req.imie, &req.nazwisko)?;

    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"
        INSERT INTO klienci (imie, nazwisko, telefon, miasto, adres_faktury, rodzaj_wspolpracy, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&req.imie)
    .bind(&req.nazwisko)
    .bind(&req.telefon)
    .bind(&req.miasto)
    .bind(&req.adres_faktury)
    .bind(&req.rodzaj_wspolpracy)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let created: Klient = sqlx::query_as("SELECT * FROM klienci WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_klient(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<i64>,
    Json(req): Json<UpdateKlientRequest>,
) -> Result<Json<Klient>, ApiError> {
    require_admin(&user)?;
    validate_names(&req.imie, &req.nazwisko)?;

    let result = sqlx::query(
        r#"
        UPDATE klienci SET imie = ?, nazwisko = ?, telefon = ?, miasto = ?,
            adres_faktury = ?, rodzaj_wspolpracy = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.imie)
    .bind(&req.nazwisko)
    .bind(&req.telefon)
    .bind(&req.miasto)
    .bind(&req.adres_faktury)
    .bind(&req.rodzaj_wspolpracy)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Klient not found"));
    }

    let updated: Klient = sqlx::query_as("SELECT * FROM klienci WHERE id = ?")
        .bind(id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(updated))
}

pub async fn delete_klient(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;

    let result = sqlx::query("DELETE FROM klienci WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Klient not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
