// src/models/registration.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::user::NAME_RE;

pub const REQUEST_COLUMNS: &str =
    "id, first_name, last_name, status, approved_at, created_at, updated_at";

/// Registration request lifecycle.
///
/// `pending -> approved -> completed`, or `pending -> rejected`.
/// `completed` and `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl RegistrationStatus {
    pub fn can_transition_to(self, next: RegistrationStatus) -> bool {
        use RegistrationStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Completed)
        )
    }
}

/// Represents the 'registration_requests' table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub status: RegistrationStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Case-insensitive identity of a requested name.
///
/// Backed by a UNIQUE column, so concurrent duplicate requests cannot both land.
pub fn name_key(first_name: &str, last_name: &str) -> String {
    format!(
        "{}\u{1f}{}",
        first_name.trim().to_lowercase(),
        last_name.trim().to_lowercase()
    )
}

/// DTO for `request-access` and `check-status`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NameRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "First and Last name are required"))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "First and Last name are required"))]
    pub last_name: String,
}

impl NameRequest {
    pub fn trimmed(&self) -> (String, String) {
        (
            self.first_name.trim().to_string(),
            self.last_name.trim().to_string(),
        )
    }
}

/// DTO for completing an approved registration.
/// `username` is only the name part; the `@student` suffix is added.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRegistrationRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(
        length(min = 1, max = 50, message = "Username length must be between 1 and 50 characters."),
        regex(path = *NAME_RE, message = "Username may only contain letters, digits, '_', '.' and '-'.")
    )]
    pub username: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_key_ignores_case_and_padding() {
        assert_eq!(name_key("Ada", "Lovelace"), name_key("  aDA ", "LOVELACE"));
        assert_ne!(name_key("Ada", "Lovelace"), name_key("Ada", "Byron"));
    }

    #[test]
    fn name_key_keeps_first_and_last_apart() {
        assert_ne!(name_key("ab", "c"), name_key("a", "bc"));
    }

    #[test]
    fn only_forward_transitions_are_allowed() {
        use RegistrationStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Completed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Rejected));
    }

    #[test]
    fn blank_names_fail_validation() {
        let req = NameRequest {
            first_name: "".to_string(),
            last_name: "Doe".to_string(),
        };
        assert!(req.validate().is_err());
    }
}
