// src/models/setting.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Admin-facing settings document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPayload {
    /// Instant after which non-unfrozen students can no longer log in.
    #[serde(default)]
    pub semester_completion_date: Option<String>,
}

/// Parses a semester completion date.
///
/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates, which mean
/// midnight UTC of that day.
pub fn parse_completion_date(raw: &str) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "Invalid semesterCompletionDate '{}': expected YYYY-MM-DD or RFC 3339",
                raw
            ))
        })
}

/// True when a student login must be refused at `now`.
pub fn is_frozen(completion: Option<DateTime<Utc>>, unfrozen_by_admin: bool, now: DateTime<Utc>) -> bool {
    match completion {
        Some(deadline) => !unfrozen_by_admin && now > deadline,
        None => false,
    }
}
