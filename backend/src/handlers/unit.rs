// src/handlers/unit.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    db,
    error::AppError,
    handlers::{
        chapter::{chapter_course, ensure_quiz_exists},
        course::authorize_course,
    },
    models::{
        unit::{UNIT_COLUMNS, UnitContent, UnitRow, UpdateUnitRequest},
        user::User,
    },
};

async fn fetch_unit(pool: &SqlitePool, id: i64) -> Result<UnitRow, AppError> {
    let sql = format!("SELECT {} FROM units WHERE id = ?", UNIT_COLUMNS);
    sqlx::query_as::<_, UnitRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Unit not found".to_string()))
}

/// Updates a unit's title and/or content. The unit type stays fixed, so new
/// content must carry the field for the existing type.
pub async fn update_unit(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUnitRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let current = fetch_unit(&pool, id).await?;
    let course_id = chapter_course(&pool, current.chapter_id).await?;
    authorize_course(&pool, &user, course_id).await?;

    let content = match payload.content {
        Some(input) => {
            let content = UnitContent::from_input(current.unit_type, input)?;
            ensure_quiz_exists(&pool, &content).await?;
            content
        }
        None => current.clone().into_unit()?.content,
    };

    let title = payload
        .title
        .map(|t| t.trim().to_string())
        .unwrap_or(current.title);

    let (video_url, pdf_url, body_text, quiz_id) = match &content {
        UnitContent::Video { video_url } => (Some(video_url.clone()), None, None, None),
        UnitContent::Pdf { pdf_url } => (None, Some(pdf_url.clone()), None, None),
        UnitContent::Text { text } => (None, None, Some(text.clone()), None),
        UnitContent::Quiz { quiz } => (None, None, None, Some(*quiz)),
    };

    let sql = format!(
        r#"
        UPDATE units
        SET title = ?, video_url = ?, pdf_url = ?, body_text = ?, quiz_id = ?, updated_at = ?
        WHERE id = ?
        RETURNING {}
        "#,
        UNIT_COLUMNS
    );
    let unit = sqlx::query_as::<_, UnitRow>(&sql)
        .bind(title)
        .bind(video_url)
        .bind(pdf_url)
        .bind(body_text)
        .bind(quiz_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update unit: {:?}", e);
            AppError::from(e)
        })?
        .ok_or_else(|| AppError::NotFound("Unit not found".to_string()))?
        .into_unit()?;

    Ok(Json(unit))
}

/// Deletes a unit. Its chapter's unit list is derived, so it drops out at once.
pub async fn delete_unit(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let current = fetch_unit(&pool, id).await?;
    let course_id = chapter_course(&pool, current.chapter_id).await?;
    authorize_course(&pool, &user, course_id).await?;

    let mut tx = db::begin_write(&pool).await?;

    let result = sqlx::query("DELETE FROM units WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Unit not found".to_string()));
    }

    sqlx::query("UPDATE chapters SET updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(current.chapter_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("{} deleted unit {}", user.username(), id);
    Ok(Json(json!({ "message": "Unit deleted" })))
}
