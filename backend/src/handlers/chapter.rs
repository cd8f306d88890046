// src/handlers/chapter.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{Executor, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    db,
    error::AppError,
    handlers::course::authorize_course,
    models::{
        course::{CHAPTER_COLUMNS, ChapterRequest, ChapterRow},
        unit::{CreateUnitRequest, UNIT_COLUMNS, UnitContent, UnitRow},
        user::User,
    },
};

/// Returns the course a chapter belongs to.
pub(crate) async fn chapter_course<'e, E>(executor: E, chapter_id: i64) -> Result<i64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, i64>("SELECT course_id FROM chapters WHERE id = ?")
        .bind(chapter_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("Chapter not found".to_string()))
}

/// Checks that a quiz referenced by a unit exists.
pub(crate) async fn ensure_quiz_exists<'e, E>(executor: E, content: &UnitContent) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    if let Some(quiz_id) = content.quiz_id() {
        sqlx::query_scalar::<_, i64>("SELECT id FROM quizzes WHERE id = ?")
            .bind(quiz_id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;
    }
    Ok(())
}

/// Renames a chapter.
pub async fn update_chapter(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
    Json(payload): Json<ChapterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let course_id = chapter_course(&pool, id).await?;
    authorize_course(&pool, &user, course_id).await?;

    let sql = format!(
        "UPDATE chapters SET title = ?, updated_at = ? WHERE id = ? RETURNING {}",
        CHAPTER_COLUMNS
    );
    let chapter = sqlx::query_as::<_, ChapterRow>(&sql)
        .bind(payload.title.trim())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Chapter not found".to_string()))?;

    Ok(Json(chapter))
}

/// Deletes a chapter and its units.
///
/// The course's chapter list is derived from `chapters.course_id`, so the
/// chapter disappears from it as soon as the row is gone.
pub async fn delete_chapter(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = db::begin_write(&pool).await?;

    let course_id = chapter_course(&mut *tx, id).await?;
    authorize_course(&mut *tx, &user, course_id).await?;

    let removed_units = sqlx::query("DELETE FROM units WHERE chapter_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM chapters WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE courses SET updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to delete chapter: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!(
        "{} deleted chapter {} ({} units) from course {}",
        user.username(),
        id,
        removed_units,
        course_id
    );
    Ok(Json(json!({ "message": "Chapter deleted" })))
}

/// Appends a unit to a chapter.
pub async fn add_unit(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<User>,
    Path(chapter_id): Path<i64>,
    Json(payload): Json<CreateUnitRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let content = UnitContent::from_input(payload.unit_type, payload.content)?;

    let mut tx = db::begin_write(&pool).await?;

    let course_id = chapter_course(&mut *tx, chapter_id).await?;
    authorize_course(&mut *tx, &user, course_id).await?;
    ensure_quiz_exists(&mut *tx, &content).await?;

    let (video_url, pdf_url, body_text) = match &content {
        UnitContent::Video { video_url } => (Some(video_url.as_str()), None, None),
        UnitContent::Pdf { pdf_url } => (None, Some(pdf_url.as_str()), None),
        UnitContent::Text { text } => (None, None, Some(text.as_str())),
        UnitContent::Quiz { .. } => (None, None, None),
    };

    let now = Utc::now();
    let sql = format!(
        r#"
        INSERT INTO units
            (chapter_id, title, unit_type, video_url, pdf_url, body_text, quiz_id,
             position, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM units WHERE chapter_id = ?), ?, ?)
        RETURNING {}
        "#,
        UNIT_COLUMNS
    );
    let unit = sqlx::query_as::<_, UnitRow>(&sql)
        .bind(chapter_id)
        .bind(payload.title.trim())
        .bind(content.unit_type())
        .bind(video_url)
        .bind(pdf_url)
        .bind(body_text)
        .bind(content.quiz_id())
        .bind(chapter_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?
        .into_unit()?;

    sqlx::query("UPDATE chapters SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(chapter_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(unit)))
}
