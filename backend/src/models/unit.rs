// src/models/unit.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use validator::Validate;

use super::not_blank;
use crate::{error::AppError, utils::html::clean_html};

pub const UNIT_COLUMNS: &str = "id, chapter_id, title, unit_type, video_url, pdf_url, body_text, \
                                quiz_id, position, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UnitType {
    Video,
    Pdf,
    Text,
    Quiz,
}

/// Unit payload, discriminated by type.
///
/// Serialized as `"type": "...", "content": {...}` next to the unit's other fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum UnitContent {
    #[serde(rename_all = "camelCase")]
    Video { video_url: String },
    #[serde(rename_all = "camelCase")]
    Pdf { pdf_url: String },
    Text { text: String },
    /// Reference to a quiz record.
    Quiz { quiz: i64 },
}

impl UnitContent {
    pub fn unit_type(&self) -> UnitType {
        match self {
            UnitContent::Video { .. } => UnitType::Video,
            UnitContent::Pdf { .. } => UnitType::Pdf,
            UnitContent::Text { .. } => UnitType::Text,
            UnitContent::Quiz { .. } => UnitType::Quiz,
        }
    }

    pub fn quiz_id(&self) -> Option<i64> {
        match self {
            UnitContent::Quiz { quiz } => Some(*quiz),
            _ => None,
        }
    }

    /// Builds the content for `kind` from loosely-typed client input.
    ///
    /// Only the field matching `kind` is read; it must be present and valid.
    pub fn from_input(kind: UnitType, input: ContentInput) -> Result<Self, AppError> {
        fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::BadRequest(format!("content.{} is required", field)))
        }

        match kind {
            UnitType::Video => {
                let video_url = required(input.video_url, "videoUrl")?;
                match Url::parse(&video_url) {
                    Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                    _ => return Err(AppError::BadRequest("Invalid video URL".to_string())),
                }
                Ok(UnitContent::Video { video_url })
            }
            UnitType::Pdf => {
                let pdf_url = required(input.pdf_url, "pdfUrl")?;
                if !pdf_url.starts_with('/') && Url::parse(&pdf_url).is_err() {
                    return Err(AppError::BadRequest(
                        "PDF location must be a URL or an absolute path".to_string(),
                    ));
                }
                Ok(UnitContent::Pdf { pdf_url })
            }
            UnitType::Text => {
                let text = clean_html(&required(input.text, "text")?);
                if text.trim().is_empty() {
                    return Err(AppError::BadRequest("content.text is required".to_string()));
                }
                Ok(UnitContent::Text { text })
            }
            UnitType::Quiz => {
                let quiz = input
                    .quiz
                    .ok_or_else(|| AppError::BadRequest("content.quiz is required".to_string()))?;
                Ok(UnitContent::Quiz { quiz })
            }
        }
    }
}

/// Raw row of the 'units' table.
#[derive(Debug, Clone, FromRow)]
pub struct UnitRow {
    pub id: i64,
    pub chapter_id: i64,
    pub title: String,
    pub unit_type: UnitType,
    pub video_url: Option<String>,
    pub pdf_url: Option<String>,
    pub body_text: Option<String>,
    pub quiz_id: Option<i64>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UnitRow {
    pub fn into_unit(self) -> Result<Unit, AppError> {
        let content = match self.unit_type {
            UnitType::Video => self.video_url.map(|video_url| UnitContent::Video { video_url }),
            UnitType::Pdf => self.pdf_url.map(|pdf_url| UnitContent::Pdf { pdf_url }),
            UnitType::Text => self.body_text.map(|text| UnitContent::Text { text }),
            UnitType::Quiz => self.quiz_id.map(|quiz| UnitContent::Quiz { quiz }),
        }
        .ok_or_else(|| {
            AppError::InternalServerError(format!("unit {} has no content for its type", self.id))
        })?;

        Ok(Unit {
            id: self.id,
            chapter_id: self.chapter_id,
            title: self.title,
            content,
            position: self.position,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A single content item within a chapter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: i64,
    pub chapter_id: i64,
    pub title: String,
    #[serde(flatten)]
    pub content: UnitContent,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-side content object; only the field matching the unit type is used.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentInput {
    pub video_url: Option<String>,
    pub pdf_url: Option<String>,
    pub text: Option<String>,
    pub quiz: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUnitRequest {
    #[validate(length(min = 1, max = 200), custom(function = not_blank))]
    pub title: String,
    #[serde(rename = "type")]
    pub unit_type: UnitType,
    #[serde(default)]
    pub content: ContentInput,
}

/// DTO for updating a unit. The type is fixed at creation.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUnitRequest {
    #[validate(length(min = 1, max = 200), custom(function = not_blank))]
    pub title: Option<String>,
    pub content: Option<ContentInput>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn video_requires_http_url() {
        let ok = UnitContent::from_input(
            UnitType::Video,
            ContentInput {
                video_url: Some("https://www.youtube.com/watch?v=abc".into()),
                ..Default::default()
            },
        );
        assert!(ok.is_ok());

        let bad = UnitContent::from_input(
            UnitType::Video,
            ContentInput {
                video_url: Some("not a url".into()),
                ..Default::default()
            },
        );
        assert!(matches!(bad, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn content_must_match_type() {
        let input = ContentInput {
            text: Some("hello".into()),
            ..Default::default()
        };
        assert!(UnitContent::from_input(UnitType::Pdf, input).is_err());
    }

    #[test]
    fn pdf_accepts_absolute_path() {
        let content = UnitContent::from_input(
            UnitType::Pdf,
            ContentInput {
                pdf_url: Some("/uploads/notes.pdf".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(content.unit_type(), UnitType::Pdf);
    }

    #[test]
    fn text_is_sanitized() {
        let content = UnitContent::from_input(
            UnitType::Text,
            ContentInput {
                text: Some("<p>ok</p><script>bad()</script>".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            content,
            UnitContent::Text {
                text: "<p>ok</p>".into()
            }
        );
    }

    #[test]
    fn unit_serializes_type_and_content_side_by_side() {
        let unit = UnitRow {
            id: 7,
            chapter_id: 3,
            title: "Week 1 quiz".into(),
            unit_type: UnitType::Quiz,
            video_url: None,
            pdf_url: None,
            body_text: None,
            quiz_id: Some(11),
            position: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
        .into_unit()
        .unwrap();

        let value = serde_json::to_value(&unit).unwrap();
        assert_eq!(value["type"], json!("quiz"));
        assert_eq!(value["content"], json!({ "quiz": 11 }));
        assert_eq!(value["chapterId"], json!(3));
    }

    #[test]
    fn row_without_matching_column_is_rejected() {
        let row = UnitRow {
            id: 1,
            chapter_id: 1,
            title: "Broken".into(),
            unit_type: UnitType::Video,
            video_url: None,
            pdf_url: Some("/x.pdf".into()),
            body_text: None,
            quiz_id: None,
            position: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(row.into_unit().is_err());
    }
}
