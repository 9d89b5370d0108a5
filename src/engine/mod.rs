//! Job State Engine: role-conditioned partial updates for montaże.
//!
//! Pure merge logic, no I/O. The HTTP layer loads the row, hands it here
//! together with the caller, and persists whatever comes back in a single
//! UPDATE. Validation runs against the whole incoming patch before the
//! role filter, so an out-of-bounds value fails the request even when the
//! field would have been dropped for that role.

use thiserror::Error;

use crate::api::validation;
use crate::db::{Montaz, MontazField, MontazPatch, User};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("caller is not assigned to this montaz")]
    NotOwner,
    #[error("montaz patch failed validation")]
    Invalid(Vec<(&'static str, String)>),
}

/// A model-change audit entry to append, produced when a patch marks the
/// panel model as changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelChangeDraft {
    pub actor: String,
    pub description: String,
}

#[derive(Debug)]
pub struct UpdateOutcome {
    pub montaz: Montaz,
    pub model_change: Option<ModelChangeDraft>,
    /// Fields removed by the role filter, for logging.
    pub dropped: Vec<MontazField>,
}

fn validate_patch(patch: &MontazPatch) -> Result<(), EngineError> {
    let mut errors: Vec<(&'static str, String)> = Vec::new();

    if let Some(imie) = &patch.klient_imie {
        if let Err(e) = validation::validate_name(imie, "Client first name") {
            errors.push(("klientImie", e));
        }
    }
    if let Some(nazwisko) = &patch.klient_nazwisko {
        if let Err(e) = validation::validate_name(nazwisko, "Client last name") {
            errors.push(("klientNazwisko", e));
        }
    }
    if let Err(e) = validation::validate_procent_docinki(&patch.procent_docinki) {
        errors.push(("procentDocinki", e));
    }
    if let Err(e) = validation::validate_pomiar_m2(&patch.pomiar_m2) {
        errors.push(("pomiarM2", e));
    }
    if let Err(e) = validation::validate_dni_przed_montazem(&patch.dni_przed_montazem) {
        errors.push(("dniPrzedMontazem", e));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Invalid(errors))
    }
}

/// Apply a partial update to an existing montaż on behalf of `caller`.
///
/// Ownership is checked first, then the whole patch is validated, then
/// fields the caller's role may not write are silently dropped, and the
/// survivors are merged over the existing row. Absent fields stay
/// untouched. `now` becomes the new `updated_at` and the timestamp of any
/// emitted model-change entry.
pub fn apply_update(
    existing: &Montaz,
    patch: MontazPatch,
    caller: &User,
    now: &str,
) -> Result<UpdateOutcome, EngineError> {
    if !caller.role.is_admin() && existing.montazysta_id != caller.id {
        return Err(EngineError::NotOwner);
    }

    validate_patch(&patch)?;

    let (patch, dropped) = patch.filter_for_role(caller.role);

    // A model-change edit appends to the audit history, it never rewrites it.
    let model_change = if patch.czy_zmiana_modelu == Some(true) || patch.nowy_model_panela.is_some()
    {
        let description = match &patch.nowy_model_panela {
            Some(model) => format!("Zmiana modelu paneli: {}", model),
            None => "Oznaczono zmianę modelu paneli".to_string(),
        };
        Some(ModelChangeDraft {
            actor: caller.email.clone(),
            description,
        })
    } else {
        None
    };

    let mut updated = existing.clone();
    if let Some(v) = patch.klient_imie {
        updated.klient_imie = v;
    }
    if let Some(v) = patch.klient_nazwisko {
        updated.klient_nazwisko = v;
    }
    if let Some(v) = patch.montazysta_id {
        updated.montazysta_id = v;
    }
    if let Some(v) = patch.status {
        updated.status = v;
    }
    if let Some(v) = patch.uwagi {
        updated.uwagi = Some(v);
    }
    if let Some(v) = patch.adres {
        updated.adres = Some(v);
    }
    if let Some(v) = patch.pomiar_m2 {
        updated.pomiar_m2 = Some(v);
    }
    if let Some(v) = patch.procent_docinki {
        updated.procent_docinki = Some(v);
    }
    if let Some(v) = patch.termin_montazu {
        updated.termin_montazu = Some(v);
    }
    if let Some(v) = patch.termin_dostawy {
        updated.termin_dostawy = Some(v);
    }
    if let Some(v) = patch.dni_przed_montazem {
        updated.dni_przed_montazem = Some(v);
    }
    if let Some(v) = patch.warunek_wnoszenia {
        updated.warunek_wnoszenia = Some(v);
    }
    if let Some(v) = patch.notatka_primepodloga {
        updated.notatka_primepodloga = Some(v);
    }
    if let Some(v) = patch.notatki_montazysty {
        updated.notatki_montazysty = Some(v);
    }
    if let Some(v) = patch.czy_zmiana_adresu {
        updated.czy_zmiana_adresu = v;
    }
    if let Some(v) = patch.czy_zmiana_modelu {
        updated.czy_zmiana_modelu = v;
    }
    if let Some(v) = patch.nowy_model_panela {
        updated.nowy_model_panela = Some(v);
    }
    if let Some(v) = patch.czy_klient_potwierdza_adres {
        updated.czy_klient_potwierdza_adres = v;
    }
    if let Some(v) = patch.czy_klient_potwierdza_model {
        updated.czy_klient_potwierdza_model = v;
    }
    updated.updated_at = now.to_string();

    Ok(UpdateOutcome {
        montaz: updated,
        model_change,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MontazStatus, Role};

    fn installer(id: i64) -> User {
        User {
            id,
            email: format!("montazysta{}@primepodloga.pl", id),
            password_hash: "unused".to_string(),
            role: Role::Montazysta,
            is_active: true,
            telefon: None,
            adres: None,
            model_panela: None,
            notatka: None,
            created_at: "2026-01-10T08:00:00+00:00".to_string(),
            updated_at: "2026-01-10T08:00:00+00:00".to_string(),
        }
    }

    fn admin() -> User {
        User {
            role: Role::Admin,
            email: "admin@primepodloga.pl".to_string(),
            ..installer(1)
        }
    }

    fn job(montazysta_id: i64) -> Montaz {
        Montaz {
            id: 10,
            klient_imie: "Anna".to_string(),
            klient_nazwisko: "Kowalska".to_string(),
            montazysta_id,
            status: MontazStatus::Nowy,
            uwagi: None,
            adres: Some("ul. Dębowa 5, Poznań".to_string()),
            pomiar_m2: Some(33.0),
            procent_docinki: Some(10.0),
            termin_montazu: None,
            termin_dostawy: None,
            dni_przed_montazem: None,
            warunek_wnoszenia: None,
            notatka_primepodloga: None,
            notatki_montazysty: None,
            czy_zmiana_adresu: false,
            czy_zmiana_modelu: false,
            nowy_model_panela: None,
            czy_klient_potwierdza_adres: false,
            czy_klient_potwierdza_model: false,
            created_at: "2026-01-10T08:00:00+00:00".to_string(),
            updated_at: "2026-01-10T08:00:00+00:00".to_string(),
        }
    }

    const NOW: &str = "2026-02-01T12:00:00+00:00";

    #[test]
    fn foreign_installer_is_rejected_before_anything_else() {
        let existing = job(5);
        let patch = MontazPatch {
            status: Some(MontazStatus::Zakonczony),
            ..Default::default()
        };

        let err = apply_update(&existing, patch, &installer(6), NOW).unwrap_err();
        assert!(matches!(err, EngineError::NotOwner));
    }

    #[test]
    fn installer_reassignment_is_dropped_but_status_applies() {
        let existing = job(5);
        let patch = MontazPatch {
            montazysta_id: Some(99),
            status: Some(MontazStatus::Zakonczony),
            ..Default::default()
        };

        let outcome = apply_update(&existing, patch, &installer(5), NOW).unwrap();
        assert_eq!(outcome.montaz.montazysta_id, 5);
        assert_eq!(outcome.montaz.status, MontazStatus::Zakonczony);
        assert_eq!(outcome.dropped, vec![MontazField::MontazystaId]);
    }

    #[test]
    fn out_of_bounds_procent_fails_whole_patch() {
        let existing = job(5);
        let patch = MontazPatch {
            procent_docinki: Some(25.0),
            status: Some(MontazStatus::WTrakcie),
            ..Default::default()
        };

        let err = apply_update(&existing, patch, &installer(5), NOW).unwrap_err();
        match err {
            EngineError::Invalid(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].0, "procentDocinki");
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn validation_runs_before_the_role_filter() {
        // An installer may not write klientImie, but an invalid value still
        // fails the request instead of being silently dropped.
        let existing = job(5);
        let patch = MontazPatch {
            klient_imie: Some("".to_string()),
            ..Default::default()
        };

        let err = apply_update(&existing, patch, &installer(5), NOW).unwrap_err();
        assert!(matches!(err, EngineError::Invalid(_)));
    }

    #[test]
    fn absent_fields_are_left_untouched() {
        let existing = job(5);
        let patch = MontazPatch {
            notatki_montazysty: Some("wniesione na 3. piętro".to_string()),
            ..Default::default()
        };

        let outcome = apply_update(&existing, patch, &installer(5), NOW).unwrap();
        assert_eq!(outcome.montaz.adres, existing.adres);
        assert_eq!(outcome.montaz.pomiar_m2, existing.pomiar_m2);
        assert_eq!(
            outcome.montaz.notatki_montazysty.as_deref(),
            Some("wniesione na 3. piętro")
        );
    }

    #[test]
    fn noop_patch_is_idempotent() {
        let existing = job(5);
        let patch = MontazPatch {
            klient_imie: Some(existing.klient_imie.clone()),
            adres: existing.adres.clone(),
            pomiar_m2: existing.pomiar_m2,
            ..Default::default()
        };

        let once = apply_update(&existing, patch.clone(), &admin(), NOW).unwrap();
        let twice = apply_update(&once.montaz, patch, &admin(), NOW).unwrap();
        assert_eq!(once.montaz, twice.montaz);
    }

    #[test]
    fn model_change_patch_emits_an_audit_draft() {
        let existing = job(5);
        let patch = MontazPatch {
            czy_zmiana_modelu: Some(true),
            nowy_model_panela: Some("Dąb Complete 8mm".to_string()),
            ..Default::default()
        };

        let outcome = apply_update(&existing, patch, &installer(5), NOW).unwrap();
        let draft = outcome.model_change.expect("draft expected");
        assert_eq!(draft.actor, "montazysta5@primepodloga.pl");
        assert!(draft.description.contains("Dąb Complete 8mm"));

        // A later edit emits another draft; history is append-only, the
        // caller inserts a new row instead of replacing the first.
        let patch = MontazPatch {
            nowy_model_panela: Some("Jesion Classic".to_string()),
            ..Default::default()
        };
        let second = apply_update(&outcome.montaz, patch, &admin(), NOW).unwrap();
        assert!(second.model_change.is_some());
    }

    #[test]
    fn status_transitions_are_unordered() {
        // Backward transitions are currently allowed for any permitted role.
        let mut existing = job(5);
        existing.status = MontazStatus::Zakonczony;

        let patch = MontazPatch {
            status: Some(MontazStatus::Nowy),
            ..Default::default()
        };
        let outcome = apply_update(&existing, patch, &admin(), NOW).unwrap();
        assert_eq!(outcome.montaz.status, MontazStatus::Nowy);
    }
}
