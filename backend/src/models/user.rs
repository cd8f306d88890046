// src/models/user.rs

use std::{fmt, str::FromStr, sync::LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Allowed characters for the name part of a username.
pub static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("valid name regex"));

/// Column list matching [`User`], shared by every query that loads a user.
pub const USER_COLUMNS: &str =
    "id, name, role, password_hash, last_login, unfrozen_by_admin, created_at";

/// Account role. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            _ => Err(()),
        }
    }
}

/// Represents the 'users' table.
///
/// Identity is the pair (`name`, `role`); the `name@role` username is derived
/// from it and never stored.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub role: Role,
    /// Argon2 PHC string. Never serialized.
    pub password_hash: String,
    pub last_login: Option<DateTime<Utc>>,
    /// Admin override of the semester freeze.
    pub unfrozen_by_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn username(&self) -> String {
        format_username(&self.name, self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// User as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub role: Role,
    pub last_login: Option<DateTime<Utc>>,
    pub unfrozen_by_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username(),
            name: user.name.clone(),
            role: user.role,
            last_login: user.last_login,
            unfrozen_by_admin: user.unfrozen_by_admin,
            created_at: user.created_at,
        }
    }
}

/// Minimal user reference (course instructor, roster entries).
#[derive(Debug, Clone, Serialize)]
pub struct UserRef {
    pub id: i64,
    pub username: String,
}

pub fn format_username(name: &str, role: Role) -> String {
    format!("{}@{}", name, role)
}

/// Splits a `name@role` login string.
///
/// Anything other than exactly one `@` is a format error. An unknown role
/// cannot match any account, so it is reported as bad credentials.
pub fn parse_username(username: &str) -> Result<(String, Role), AppError> {
    let parts: Vec<&str> = username.split('@').collect();
    if parts.len() != 2 {
        return Err(AppError::BadRequest(
            "Invalid username format. Use name@role".to_string(),
        ));
    }

    let role = parts[1]
        .parse::<Role>()
        .map_err(|_| AppError::AuthError("Invalid login credentials".to_string()))?;

    Ok((parts[0].to_string(), role))
}

/// DTO for login. `username` is the combined `name@role` string.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for creating an account from a bare name (self-registration, admin add).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(
        length(min = 1, max = 50, message = "Name length must be between 1 and 50 characters."),
        regex(path = *NAME_RE, message = "Name may only contain letters, digits, '_', '.' and '-'.")
    )]
    pub name: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
}

/// Response after a successful login or account creation.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
}

/// Current user together with the derived enrollment list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: PublicUser,
    pub enrolled_courses: Vec<i64>,
}
