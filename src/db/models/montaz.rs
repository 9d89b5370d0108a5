//! Montaż (installation job) models and the role/field write matrix.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::user::{MontazystaPublic, Role};

/// Job lifecycle. The office creates jobs as NOWY; either role may move the
/// status in any direction — there is deliberately no ordering constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MontazStatus {
    Nowy,
    WTrakcie,
    Zakonczony,
}

impl std::fmt::Display for MontazStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MontazStatus::Nowy => write!(f, "NOWY"),
            MontazStatus::WTrakcie => write!(f, "W_TRAKCIE"),
            MontazStatus::Zakonczony => write!(f, "ZAKONCZONY"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Montaz {
    pub id: i64,
    pub klient_imie: String,
    pub klient_nazwisko: String,
    pub montazysta_id: i64,
    pub status: MontazStatus,
    pub uwagi: Option<String>,
    pub adres: Option<String>,
    pub pomiar_m2: Option<f64>,
    pub procent_docinki: Option<f64>,
    pub termin_montazu: Option<String>,
    pub termin_dostawy: Option<String>,
    pub dni_przed_montazem: Option<i64>,
    pub warunek_wnoszenia: Option<String>,
    pub notatka_primepodloga: Option<String>,
    pub notatki_montazysty: Option<String>,
    pub czy_zmiana_adresu: bool,
    pub czy_zmiana_modelu: bool,
    pub nowy_model_panela: Option<String>,
    pub czy_klient_potwierdza_adres: bool,
    pub czy_klient_potwierdza_model: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One audit entry in a job's panel-model change history. Rows are only ever
/// appended; prior entries are never rewritten.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelChangeEntry {
    pub id: i64,
    pub montaz_id: i64,
    pub actor: String,
    pub description: String,
    pub created_at: String,
}

/// Montaż joined with the installer's public identity and change history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MontazResponse {
    #[serde(flatten)]
    pub montaz: Montaz,
    pub montazysta: MontazystaPublic,
    pub historia_zmian_modelu: Vec<ModelChangeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMontazRequest {
    pub klient_imie: String,
    pub klient_nazwisko: String,
    pub montazysta_id: i64,
    pub uwagi: Option<String>,
    pub adres: Option<String>,
    pub pomiar_m2: Option<f64>,
    pub procent_docinki: Option<f64>,
    pub termin_montazu: Option<String>,
    pub termin_dostawy: Option<String>,
    pub dni_przed_montazem: Option<i64>,
    pub warunek_wnoszenia: Option<String>,
    pub notatka_primepodloga: Option<String>,
}

/// Partial update payload. Absent fields are left untouched on apply.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MontazPatch {
    pub klient_imie: Option<String>,
    pub klient_nazwisko: Option<String>,
    pub montazysta_id: Option<i64>,
    pub status: Option<MontazStatus>,
    pub uwagi: Option<String>,
    pub adres: Option<String>,
    pub pomiar_m2: Option<f64>,
    pub procent_docinki: Option<f64>,
    pub termin_montazu: Option<String>,
    pub termin_dostawy: Option<String>,
    pub dni_przed_montazem: Option<i64>,
    pub warunek_wnoszenia: Option<String>,
    pub notatka_primepodloga: Option<String>,
    pub notatki_montazysty: Option<String>,
    pub czy_zmiana_adresu: Option<bool>,
    pub czy_zmiana_modelu: Option<bool>,
    pub nowy_model_panela: Option<String>,
    pub czy_klient_potwierdza_adres: Option<bool>,
    pub czy_klient_potwierdza_model: Option<bool>,
}

/// Patch fields, one variant per [`MontazPatch`] member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MontazField {
    KlientImie,
    KlientNazwisko,
    MontazystaId,
    Status,
    Uwagi,
    Adres,
    PomiarM2,
    ProcentDocinki,
    TerminMontazu,
    TerminDostawy,
    DniPrzedMontazem,
    WarunekWnoszenia,
    NotatkaPrimepodloga,
    NotatkiMontazysty,
    CzyZmianaAdresu,
    CzyZmianaModelu,
    NowyModelPanela,
    CzyKlientPotwierdzaAdres,
    CzyKlientPotwierdzaModel,
}

impl MontazField {
    /// Wire name, for logging dropped fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            MontazField::KlientImie => "klientImie",
            MontazField::KlientNazwisko => "klientNazwisko",
            MontazField::MontazystaId => "montazystaId",
            MontazField::Status => "status",
            MontazField::Uwagi => "uwagi",
            MontazField::Adres => "adres",
            MontazField::PomiarM2 => "pomiarM2",
            MontazField::ProcentDocinki => "procentDocinki",
            MontazField::TerminMontazu => "terminMontazu",
            MontazField::TerminDostawy => "terminDostawy",
            MontazField::DniPrzedMontazem => "dniPrzedMontazem",
            MontazField::WarunekWnoszenia => "warunekWnoszenia",
            MontazField::NotatkaPrimepodloga => "notatkaPrimepodloga",
            MontazField::NotatkiMontazysty => "notatkiMontazysty",
            MontazField::CzyZmianaAdresu => "czyZmianaAdresu",
            MontazField::CzyZmianaModelu => "czyZmianaModelu",
            MontazField::NowyModelPanela => "nowyModelPanela",
            MontazField::CzyKlientPotwierdzaAdres => "czyKlientPotwierdzaAdres",
            MontazField::CzyKlientPotwierdzaModel => "czyKlientPotwierdzaModel",
        }
    }
}

const ADMIN_ONLY: &[Role] = &[Role::Admin];
const ANY_ROLE: &[Role] = &[Role::Admin, Role::Montazysta];

/// Which roles may write each patch field. Client identity, assignment and
/// office notes stay with the admin; measurement, confirmation and installer
/// note fields are open to the assigned installer as well.
pub const FIELD_RULES: &[(MontazField, &[Role])] = &[
    (MontazField::KlientImie, ADMIN_ONLY),
    (MontazField::KlientNazwisko, ADMIN_ONLY),
    (MontazField::MontazystaId, ADMIN_ONLY),
    (MontazField::Status, ANY_ROLE),
    (MontazField::Uwagi, ADMIN_ONLY),
    (MontazField::Adres, ANY_ROLE),
    (MontazField::PomiarM2, ANY_ROLE),
    (MontazField::ProcentDocinki, ANY_ROLE),
    (MontazField::TerminMontazu, ANY_ROLE),
    (MontazField::TerminDostawy, ANY_ROLE),
    (MontazField::DniPrzedMontazem, ANY_ROLE),
    (MontazField::WarunekWnoszenia, ANY_ROLE),
    (MontazField::NotatkaPrimepodloga, ADMIN_ONLY),
    (MontazField::NotatkiMontazysty, ANY_ROLE),
    (MontazField::CzyZmianaAdresu, ANY_ROLE),
    (MontazField::CzyZmianaModelu, ANY_ROLE),
    (MontazField::NowyModelPanela, ANY_ROLE),
    (MontazField::CzyKlientPotwierdzaAdres, ANY_ROLE),
    (MontazField::CzyKlientPotwierdzaModel, ANY_ROLE),
];

/// Whether `role` may write `field`, per [`FIELD_RULES`].
pub fn role_may_write(role: Role, field: MontazField) -> bool {
    FIELD_RULES
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, roles)| roles.contains(&role))
        .unwrap_or(false)
}

impl MontazPatch {
    /// Drop every field the role may not write. Returns the filtered patch
    /// and the list of dropped fields for logging.
    pub fn filter_for_role(mut self, role: Role) -> (MontazPatch, Vec<MontazField>) {
        let mut dropped = Vec::new();
        macro_rules! gate {
            ($member:ident, $field:expr) => {
                if self.$member.is_some() && !role_may_write(role, $field) {
                    self.$member = None;
                    dropped.push($field);
                }
            };
        }
        gate!(klient_imie, MontazField::KlientImie);
        gate!(klient_nazwisko, MontazField::KlientNazwisko);
        gate!(montazysta_id, MontazField::MontazystaId);
        gate!(status, MontazField::Status);
        gate!(uwagi, MontazField::Uwagi);
        gate!(adres, MontazField::Adres);
        gate!(pomiar_m2, MontazField::PomiarM2);
        gate!(procent_docinki, MontazField::ProcentDocinki);
        gate!(termin_montazu, MontazField::TerminMontazu);
        gate!(termin_dostawy, MontazField::TerminDostawy);
        gate!(dni_przed_montazem, MontazField::DniPrzedMontazem);
        gate!(warunek_wnoszenia, MontazField::WarunekWnoszenia);
        gate!(notatka_primepodloga, MontazField::NotatkaPrimepodloga);
        gate!(notatki_montazysty, MontazField::NotatkiMontazysty);
        gate!(czy_zmiana_adresu, MontazField::CzyZmianaAdresu);
        gate!(czy_zmiana_modelu, MontazField::CzyZmianaModelu);
        gate!(nowy_model_panela, MontazField::NowyModelPanela);
        gate!(czy_klient_potwierdza_adres, MontazField::CzyKlientPotwierdzaAdres);
        gate!(czy_klient_potwierdza_model, MontazField::CzyKlientPotwierdzaModel);
        (self, dropped)
    }
}
