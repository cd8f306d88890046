// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::{AppError, is_foreign_key_violation},
    models::{
        quiz::{
            CreateQuizRequest, QUIZ_COLUMNS, Quiz, SubmitQuizRequest, UpdateQuizRequest, grade,
        },
        user::User,
    },
};

async fn fetch_quiz(pool: &SqlitePool, id: i64) -> Result<Quiz, AppError> {
    let sql = format!("SELECT {} FROM quizzes WHERE id = ?", QUIZ_COLUMNS);
    sqlx::query_as::<_, Quiz>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
}

/// Lists all quizzes. Public.
pub async fn list_quizzes(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let sql = format!("SELECT {} FROM quizzes ORDER BY id", QUIZ_COLUMNS);
    let quizzes = sqlx::query_as::<_, Quiz>(&sql).fetch_all(&pool).await?;
    Ok(Json(quizzes))
}

/// Retrieves a single quiz. Public.
pub async fn get_quiz(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_quiz(&pool, id).await?))
}

/// Creates a quiz. Admin or teacher.
pub async fn create_quiz(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let now = Utc::now();
    let sql = format!(
        "INSERT INTO quizzes (title, questions, created_at, updated_at) VALUES (?, ?, ?, ?) \
         RETURNING {}",
        QUIZ_COLUMNS
    );
    let quiz = sqlx::query_as::<_, Quiz>(&sql)
        .bind(payload.title.trim())
        .bind(SqlJson(&payload.questions))
        .bind(now)
        .bind(now)
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create quiz: {:?}", e);
            AppError::from(e)
        })?;

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Updates a quiz. Fields are optional. Admin or teacher.
pub async fn update_quiz(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.title.is_none() && payload.questions.is_none() {
        return Ok(Json(fetch_quiz(&pool, id).await?));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE quizzes SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title.trim().to_string());
    }

    if let Some(questions) = payload.questions {
        separated.push("questions = ");
        separated.push_bind_unseparated(SqlJson(questions));
    }

    separated.push("updated_at = ");
    separated.push_bind_unseparated(Utc::now());

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update quiz: {:?}", e);
        AppError::from(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(Json(fetch_quiz(&pool, id).await?))
}

/// Deletes a quiz. A quiz still referenced by a unit cannot be deleted.
/// Admin or teacher.
pub async fn delete_quiz(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let references = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM units WHERE quiz_id = ?")
        .bind(id)
        .fetch_one(&pool)
        .await?;
    if references > 0 {
        return Err(AppError::Conflict(
            "Quiz is used by a unit; delete the unit first".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM quizzes WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::Conflict("Quiz is used by a unit; delete the unit first".to_string())
            } else {
                tracing::error!("Failed to delete quiz: {:?}", e);
                AppError::from(e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(Json(json!({ "message": "Quiz deleted" })))
}

/// Grades a submission against the stored answer key. Any authenticated user.
pub async fn submit_quiz(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_quiz(&pool, id).await?;
    let result = grade(&quiz.questions, &payload.answers);

    tracing::info!(
        "{} scored {}/{} on quiz {}",
        user.username(),
        result.score,
        result.total,
        quiz.id
    );

    Ok(Json(result))
}
