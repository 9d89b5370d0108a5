//! Client records. Plain admin-only CRUD, no lifecycle.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Klient {
    pub id: i64,
    pub imie: String,
    pub nazwisko: String,
    pub telefon: Option<String>,
    pub miasto: Option<String>,
    pub adres_faktury: Option<String>,
    pub rodzaj_wspolpracy: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKlientRequest {
    pub imie: String,
    pub nazwisko: String,
    pub telefon: Option<String>,
    pub miasto: Option<String>,
    pub adres_faktury: Option<String>,
    pub rodzaj_wspolpracy: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKlientRequest {
    pub imie: String,
    pub nazwisko: String,
    pub telefon: Option<String>,
    pub miasto: Option<String>,
    pub adres_faktury: Option<String>,
    pub rodzaj_wspolpracy: Option<String>,
}
