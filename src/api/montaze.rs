//! Montaż (installation job) endpoints.
//!
//! Listing is ownership-filtered, creation is admin-or-self, updates go
//! through the job state engine, deletion is an admin-only hard delete.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ValidationErrorBuilder};
use crate::api::guard::{ensure_montaz_owner, require_admin};
use crate::api::validation;
use crate::db::{
    CreateMontazRequest, ModelChangeEntry, Montaz, MontazPatch, MontazResponse, MontazystaPublic,
    Role, User,
};
use crate::engine::{self, EngineError};
use crate::AppState;

/// Reject assignment targets that are not active installer accounts.
async fn ensure_active_installer(db: &crate::db::DbPool, id: i64) -> Result<(), ApiError> {
    let row: Option<(Role, bool)> =
        sqlx::query_as("SELECT role, is_active FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await?;

    match row {
        Some((Role::Montazysta, true)) => Ok(()),
        _ => Err(ApiError::validation_field(
            "montazystaId",
            "Assigned installer must be an active installer account",
        )),
    }
}

/// Join a montaż with its installer identity and model-change history.
async fn to_response(db: &crate::db::DbPool, montaz: Montaz) -> Result<MontazResponse, ApiError> {
    let montazysta: MontazystaPublic =
        sqlx::query_as("SELECT id, email FROM users WHERE id = ?")
            .bind(montaz.montazysta_id)
            .fetch_one(db)
            .await?;

    let historia: Vec<ModelChangeEntry> = sqlx::query_as(
        "SELECT * FROM montaz_model_changes WHERE montaz_id = ? ORDER BY id ASC",
    )
    .bind(montaz.id)
    .fetch_all(db)
    .await?;

    Ok(MontazResponse {
        montaz,
        montazysta,
        historia_zmian_modelu: historia,
    })
}

async fn load_montaz(db: &crate::db::DbPool, id: i64) -> Result<Montaz, ApiError> {
    sqlx::query_as::<_, Montaz>("SELECT * FROM montaze WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Montaż not found"))
}

/// Write every mutable column back in one statement.
async fn persist_montaz(db: &crate::db::DbPool, montaz: &Montaz) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE montaze SET
            klient_imie = ?, klient_nazwisko = ?, montazysta_id = ?, status = ?,
            uwagi = ?, adres = ?, pomiar_m2 = ?, procent_docinki = ?,
            termin_montazu = ?, termin_dostawy = ?, dni_przed_montazem = ?,
            warunek_wnoszenia = ?, notatka_primepodloga = ?, notatki_montazysty = ?,
            czy_zmiana_adresu = ?, czy_zmiana_modelu = ?, nowy_model_panela = ?,
            czy_klient_potwierdza_adres = ?, czy_klient_potwierdza_model = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&montaz.klient_imie)
    .bind(&montaz.klient_nazwisko)
    .bind(montaz.montazysta_id)
    .bind(montaz.status)
    .bind(&montaz.uwagi)
    .bind(&montaz.adres)
    .bind(montaz.pomiar_m2)
    .bind(montaz.procent_docinki)
    .bind(&montaz.termin_montazu)
    .bind(&montaz.termin_dostawy)
    .bind(montaz.dni_przed_montazem)
    .bind(&montaz.warunek_wnoszenia)
    .bind(&montaz.notatka_primepodloga)
    .bind(&montaz.notatki_montazysty)
    .bind(montaz.czy_zmiana_adresu)
    .bind(montaz.czy_zmiana_modelu)
    .bind(&montaz.nowy_model_panela)
    .bind(montaz.czy_klient_potwierdza_adres)
    .bind(montaz.czy_klient_potwierdza_model)
    .bind(&montaz.updated_at)
    .bind(montaz.id)
    .execute(db)
    .await?;
    Ok(())
}

/// List montaże. Admins see everything, installers only their own jobs.
pub async fn list_montaze(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<MontazResponse>>, ApiError> {
    let montaze: Vec<Montaz> = match user.role {
        Role::Admin => {
            sqlx::query_as("SELECT * FROM montaze ORDER BY created_at DESC")
                .fetch_all(&state.db)
                .await?
        }
        Role::Montazysta => {
            sqlx::query_as(
                "SELECT * FROM montaze WHERE montazysta_id = ? ORDER BY created_at DESC",
            )
            .bind(user.id)
            .fetch_all(&state.db)
            .await?
        }
    };

    let mut responses = Vec::with_capacity(montaze.len());
    for montaz in montaze {
        responses.push(to_response(&state.db, montaz).await?);
    }

    Ok(Json(responses))
}

fn validate_create_request(req: &CreateMontazRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validation::validate_name(&req.klient_imie, "Client first name") {
        errors.add("klientImie", e);
    }
    if let Err(e) = validation::validate_name(&req.klient_nazwisko, "Client last name") {
        errors.add("klientNazwisko", e);
    }
    if let Err(e) = validation::validate_procent_docinki(&req.procent_docinki) {
        errors.add("procentDocinki", e);
    }
    if let Err(e) = validation::validate_pomiar_m2(&req.pomiar_m2) {
        errors.add("pomiarM2", e);
    }
    if let Err(e) = validation::validate_dni_przed_montazem(&req.dni_przed_montazem) {
        errors.add("dniPrzedMontazem", e);
    }

    errors.finish()
}

/// Create a montaż. Admins may assign any installer; an installer may only
/// create a job for themselves.
pub async fn create_montaz(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateMontazRequest>,
) -> Result<(StatusCode, Json<MontazResponse>), ApiError> {
    validate_create_request(&req)?;

    if !user.role.is_admin() && req.montazysta_id != user.id {
        return Err(ApiError::forbidden(
            "You can only create jobs assigned to yourself",
        ));
    }

    ensure_active_installer(&state.db, req.montazysta_id).await?;

    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"
        INSERT INTO montaze (
            klient_imie, klient_nazwisko, montazysta_id, uwagi, adres,
            pomiar_m2, procent_docinki, termin_montazu, termin_dostawy,
            dni_przed_montazem, warunek_wnoszenia, notatka_primepodloga,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&req.klient_imie)
    .bind(&req.klient_nazwisko)
    .bind(req.montazysta_id)
    .bind(&req.uwagi)
    .bind(&req.adres)
    .bind(req.pomiar_m2)
    .bind(req.procent_docinki)
    .bind(&req.termin_montazu)
    .bind(&req.termin_dostawy)
    .bind(req.dni_przed_montazem)
    .bind(&req.warunek_wnoszenia)
    .bind(&req.notatka_primepodloga)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let montaz = load_montaz(&state.db, result.last_insert_rowid()).await?;
    tracing::info!(montaz_id = montaz.id, user_id = user.id, "Montaż created");

    Ok((StatusCode::CREATED, Json(to_response(&state.db, montaz).await?)))
}

/// Fetch a single montaż. Installers may only see their own jobs.
pub async fn get_montaz(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<i64>,
) -> Result<Json<MontazResponse>, ApiError> {
    let montaz = load_montaz(&state.db, id).await?;
    ensure_montaz_owner(&user, &montaz)?;
    Ok(Json(to_response(&state.db, montaz).await?))
}

/// Partial update through the job state engine.
pub async fn update_montaz(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<i64>,
    Json(patch): Json<MontazPatch>,
) -> Result<Json<MontazResponse>, ApiError> {
    let existing = load_montaz(&state.db, id).await?;

    let now = chrono::Utc::now().to_rfc3339();
    let outcome = engine::apply_update(&existing, patch, &user, &now).map_err(|e| match e {
        EngineError::NotOwner => {
            ApiError::forbidden("You can only modify jobs assigned to you")
        }
        EngineError::Invalid(errors) => {
            let mut builder = ValidationErrorBuilder::new();
            for (field, message) in errors {
                builder.add(field, message);
            }
            builder
                .finish()
                .expect_err("non-empty validation errors")
        }
    })?;

    if !outcome.dropped.is_empty() {
        tracing::debug!(
            montaz_id = id,
            user_id = user.id,
            dropped = ?outcome.dropped.iter().map(|f| f.as_str()).collect::<Vec<_>>(),
            "Dropped patch fields not writable by role"
        );
    }

    // Reassignment must still point at an active installer
    if outcome.montaz.montazysta_id != existing.montazysta_id {
        ensure_active_installer(&state.db, outcome.montaz.montazysta_id).await?;
    }

    persist_montaz(&state.db, &outcome.montaz).await?;

    if let Some(draft) = outcome.model_change {
        sqlx::query(
            "INSERT INTO montaz_model_changes (montaz_id, actor, description, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&draft.actor)
        .bind(&draft.description)
        .bind(&now)
        .execute(&state.db)
        .await?;
    }

    let montaz = load_montaz(&state.db, id).await?;
    Ok(Json(to_response(&state.db, montaz).await?))
}

/// Hard delete, admin only.
pub async fn delete_montaz(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;

    let result = sqlx::query("DELETE FROM montaze WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Montaż not found"));
    }

    tracing::info!(montaz_id = id, user_id = user.id, "Montaż deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::hash_password;
    use crate::api::error::ErrorCode;
    use crate::config::Config;
    use crate::db::{test_pool, DbPool, MontazStatus};

    async fn seed_user(db: &DbPool, email: &str, role: Role) -> User {
        let now = chrono::Utc::now().to_rfc3339();
        let hash = hash_password("password123").unwrap();
        sqlx::query(
            "INSERT INTO users (email, password_hash, role, is_active, created_at, updated_at) VALUES (?, ?, ?, 1, ?, ?)",
        )
        .bind(email)
        .bind(&hash)
        .bind(role)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await
        .unwrap();

        sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(db)
            .await
            .unwrap()
    }

    async fn test_state() -> Arc<AppState> {
        let db = test_pool().await;
        Arc::new(AppState::new(Config::default(), db))
    }

    fn create_request(montazysta_id: i64) -> CreateMontazRequest {
        CreateMontazRequest {
            klient_imie: "Anna".to_string(),
            klient_nazwisko: "Kowalska".to_string(),
            montazysta_id,
            uwagi: Some("parter, wąska klatka".to_string()),
            adres: None,
            pomiar_m2: Some(28.5),
            procent_docinki: Some(10.0),
            termin_montazu: None,
            termin_dostawy: None,
            dni_przed_montazem: None,
            warunek_wnoszenia: None,
            notatka_primepodloga: None,
        }
    }

    async fn seed_montaz(state: &Arc<AppState>, admin: &User, montazysta_id: i64) -> i64 {
        let (status, Json(created)) = create_montaz(
            State(state.clone()),
            admin.clone(),
            Json(create_request(montazysta_id)),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        created.montaz.id
    }

    #[tokio::test]
    async fn foreign_installer_update_is_forbidden_and_leaves_row_unchanged() {
        let state = test_state().await;
        let admin = seed_user(&state.db, "admin@primepodloga.pl", Role::Admin).await;
        let owner = seed_user(&state.db, "owner@primepodloga.pl", Role::Montazysta).await;
        let other = seed_user(&state.db, "other@primepodloga.pl", Role::Montazysta).await;
        let id = seed_montaz(&state, &admin, owner.id).await;

        let before = load_montaz(&state.db, id).await.unwrap();

        let patch = MontazPatch {
            status: Some(MontazStatus::Zakonczony),
            notatki_montazysty: Some("nie moje zlecenie".to_string()),
            ..Default::default()
        };
        let err = update_montaz(State(state.clone()), other.clone(), Path(id), Json(patch))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let after = load_montaz(&state.db, id).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn installer_reassignment_is_dropped_but_status_applies() {
        let state = test_state().await;
        let admin = seed_user(&state.db, "admin@primepodloga.pl", Role::Admin).await;
        let owner = seed_user(&state.db, "owner@primepodloga.pl", Role::Montazysta).await;
        let other = seed_user(&state.db, "other@primepodloga.pl", Role::Montazysta).await;
        let id = seed_montaz(&state, &admin, owner.id).await;

        let patch = MontazPatch {
            montazysta_id: Some(other.id),
            status: Some(MontazStatus::Zakonczony),
            ..Default::default()
        };
        let Json(updated) = update_montaz(State(state.clone()), owner.clone(), Path(id), Json(patch))
            .await
            .unwrap();

        assert_eq!(updated.montaz.montazysta_id, owner.id);
        assert_eq!(updated.montaz.status, MontazStatus::Zakonczony);
        assert_eq!(updated.montazysta.email, "owner@primepodloga.pl");
    }

    #[tokio::test]
    async fn out_of_bounds_procent_rejected_and_row_unchanged() {
        let state = test_state().await;
        let admin = seed_user(&state.db, "admin@primepodloga.pl", Role::Admin).await;
        let owner = seed_user(&state.db, "owner@primepodloga.pl", Role::Montazysta).await;
        let id = seed_montaz(&state, &admin, owner.id).await;

        let before = load_montaz(&state.db, id).await.unwrap();

        let patch = MontazPatch {
            procent_docinki: Some(25.0),
            ..Default::default()
        };
        let err = update_montaz(State(state.clone()), owner.clone(), Path(id), Json(patch))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let after = load_montaz(&state.db, id).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn model_change_history_is_append_only() {
        let state = test_state().await;
        let admin = seed_user(&state.db, "admin@primepodloga.pl", Role::Admin).await;
        let owner = seed_user(&state.db, "owner@primepodloga.pl", Role::Montazysta).await;
        let id = seed_montaz(&state, &admin, owner.id).await;

        let patch = MontazPatch {
            czy_zmiana_modelu: Some(true),
            nowy_model_panela: Some("Dąb Complete 8mm".to_string()),
            ..Default::default()
        };
        let Json(first) = update_montaz(State(state.clone()), owner.clone(), Path(id), Json(patch))
            .await
            .unwrap();
        assert_eq!(first.historia_zmian_modelu.len(), 1);

        let patch = MontazPatch {
            nowy_model_panela: Some("Jesion Classic".to_string()),
            ..Default::default()
        };
        let Json(second) = update_montaz(State(state.clone()), admin.clone(), Path(id), Json(patch))
            .await
            .unwrap();

        assert_eq!(second.historia_zmian_modelu.len(), 2);
        // The first entry survives a later edit untouched
        assert_eq!(second.historia_zmian_modelu[0], first.historia_zmian_modelu[0]);
        assert!(second.historia_zmian_modelu[0]
            .description
            .contains("Dąb Complete 8mm"));
        assert!(second.historia_zmian_modelu[1]
            .description
            .contains("Jesion Classic"));
        assert_eq!(second.historia_zmian_modelu[1].actor, "admin@primepodloga.pl");
    }

    #[tokio::test]
    async fn noop_patch_applied_twice_yields_same_state() {
        let state = test_state().await;
        let admin = seed_user(&state.db, "admin@primepodloga.pl", Role::Admin).await;
        let owner = seed_user(&state.db, "owner@primepodloga.pl", Role::Montazysta).await;
        let id = seed_montaz(&state, &admin, owner.id).await;

        let current = load_montaz(&state.db, id).await.unwrap();
        let patch = MontazPatch {
            klient_imie: Some(current.klient_imie.clone()),
            klient_nazwisko: Some(current.klient_nazwisko.clone()),
            pomiar_m2: current.pomiar_m2,
            procent_docinki: current.procent_docinki,
            ..Default::default()
        };

        let Json(once) =
            update_montaz(State(state.clone()), admin.clone(), Path(id), Json(patch.clone()))
                .await
                .unwrap();
        let Json(twice) = update_montaz(State(state.clone()), admin.clone(), Path(id), Json(patch))
            .await
            .unwrap();

        let mut a = once.montaz;
        let mut b = twice.montaz;
        // Only the touch timestamp may differ between the two applies
        a.updated_at = String::new();
        b.updated_at = String::new();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn delete_is_admin_only_and_missing_id_is_not_found() {
        let state = test_state().await;
        let admin = seed_user(&state.db, "admin@primepodloga.pl", Role::Admin).await;
        let owner = seed_user(&state.db, "owner@primepodloga.pl", Role::Montazysta).await;
        let id = seed_montaz(&state, &admin, owner.id).await;

        let err = delete_montaz(State(state.clone()), owner.clone(), Path(id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let status = delete_montaz(State(state.clone()), admin.clone(), Path(id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let err = delete_montaz(State(state.clone()), admin.clone(), Path(id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn listing_is_ownership_filtered() {
        let state = test_state().await;
        let admin = seed_user(&state.db, "admin@primepodloga.pl", Role::Admin).await;
        let a = seed_user(&state.db, "a@primepodloga.pl", Role::Montazysta).await;
        let b = seed_user(&state.db, "b@primepodloga.pl", Role::Montazysta).await;
        seed_montaz(&state, &admin, a.id).await;
        seed_montaz(&state, &admin, a.id).await;
        seed_montaz(&state, &admin, b.id).await;

        let Json(all) = list_montaze(State(state.clone()), admin.clone()).await.unwrap();
        assert_eq!(all.len(), 3);

        let Json(own) = list_montaze(State(state.clone()), a.clone()).await.unwrap();
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|m| m.montaz.montazysta_id == a.id));
    }

    #[tokio::test]
    async fn installer_creates_only_for_self_and_assignee_must_be_active_installer() {
        let state = test_state().await;
        let admin = seed_user(&state.db, "admin@primepodloga.pl", Role::Admin).await;
        let a = seed_user(&state.db, "a@primepodloga.pl", Role::Montazysta).await;
        let b = seed_user(&state.db, "b@primepodloga.pl", Role::Montazysta).await;

        let err = create_montaz(State(state.clone()), a.clone(), Json(create_request(b.id)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let (status, _) = create_montaz(State(state.clone()), a.clone(), Json(create_request(a.id)))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        // Assigning to an admin account is a validation error
        let err = create_montaz(
            State(state.clone()),
            admin.clone(),
            Json(create_request(admin.id)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        // Deactivated installers cannot take new jobs
        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(b.id)
            .execute(&state.db)
            .await
            .unwrap();
        let err = create_montaz(
            State(state.clone()),
            admin.clone(),
            Json(create_request(b.id)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }
}
