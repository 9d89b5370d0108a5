//! User account and session models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account roles. Admins run the office; montażyści (installers) only see
/// and update the jobs assigned to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Montazysta,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Panel the role lands on after login.
    pub fn panel_path(&self) -> &'static str {
        match self {
            Role::Admin => "/panel-admin",
            Role::Montazysta => "/panel-montazysty",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Montazysta => write!(f, "MONTAZYSTA"),
        }
    }
}

/// Full account row. Never serialized directly — `password_hash` must not
/// leave the server, use [`UserResponse`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub telefon: Option<String>,
    pub adres: Option<String>,
    pub model_panela: Option<String>,
    pub notatka: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Public projection of a user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub telefon: Option<String>,
    pub adres: Option<String>,
    pub model_panela: Option<String>,
    pub notatka: Option<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            telefon: user.telefon,
            adres: user.adres,
            model_panela: user.model_panela,
            notatka: user.notatka,
            created_at: user.created_at,
        }
    }
}

/// User list entry with the number of montaże assigned to the account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithMontazeCount {
    #[serde(flatten)]
    pub user: UserResponse,
    pub montaze_count: i64,
}

/// Minimal installer identity joined into montaż responses.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MontazystaPublic {
    pub id: i64,
    pub email: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub token_hash: String,
    pub user_id: i64,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub ok: bool,
    /// Role-based redirect path for the frontend.
    pub to: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub telefon: Option<String>,
    pub adres: Option<String>,
    pub model_panela: Option<String>,
    pub notatka: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: String,
    /// Re-hashed when present; omitted means keep the current password.
    pub password: Option<String>,
    pub role: Role,
    pub telefon: Option<String>,
    pub adres: Option<String>,
    pub model_panela: Option<String>,
    pub notatka: Option<String>,
}
