// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::SEMESTER_COMPLETION_KEY,
    db,
    error::AppError,
    models::{
        setting::{SettingsPayload, parse_completion_date},
        user::{CreateAccountRequest, PublicUser, Role, USER_COLUMNS, User},
    },
    utils::hash::hash_password,
};

async fn create_account(
    pool: &SqlitePool,
    payload: CreateAccountRequest,
    role: Role,
) -> Result<User, AppError> {
    payload.validate()?;

    let password_hash = hash_password(&payload.password)?;
    let user = db::insert_user(pool, &payload.name, role, &password_hash).await?;
    tracing::info!("Admin created {}", user.username());
    Ok(user)
}

/// Creates a teacher account `name@teacher`.
/// Admin only.
pub async fn add_teacher(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = create_account(&pool, payload, Role::Teacher).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Teacher added successfully",
            "username": user.username(),
            "id": user.id,
        })),
    ))
}

/// Creates a student account `name@student`.
/// Admin only.
pub async fn add_student(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = create_account(&pool, payload, Role::Student).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Student added successfully",
            "username": user.username(),
            "id": user.id,
        })),
    ))
}

async fn list_by_role(pool: &SqlitePool, role: Role) -> Result<Vec<PublicUser>, AppError> {
    let sql = format!(
        "SELECT {} FROM users WHERE role = ? ORDER BY name",
        USER_COLUMNS
    );
    let users = sqlx::query_as::<_, User>(&sql)
        .bind(role)
        .fetch_all(pool)
        .await?;

    Ok(users.iter().map(PublicUser::from).collect())
}

/// Lists all teachers. Admin only.
pub async fn list_teachers(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(list_by_role(&pool, Role::Teacher).await?))
}

/// Lists all students. Admin only.
pub async fn list_students(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(list_by_role(&pool, Role::Student).await?))
}

/// Deletes the user `id` only if it has `role`.
async fn delete_with_role(pool: &SqlitePool, id: i64, role: Role) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM users WHERE id = ? AND role = ?")
        .bind(id)
        .bind(role)
        .execute(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete {}: {:?}", role, e);
            AppError::from(e)
        })?;

    Ok(result.rows_affected() > 0)
}

/// Deletes a teacher. Their courses remain, without an instructor.
/// Admin only.
pub async fn delete_teacher(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !delete_with_role(&pool, id, Role::Teacher).await? {
        return Err(AppError::NotFound("Teacher not found".to_string()));
    }
    Ok(Json(json!({ "message": "Teacher deleted successfully" })))
}

/// Deletes a student and their enrollments.
/// Admin only.
pub async fn delete_student(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !delete_with_role(&pool, id, Role::Student).await? {
        return Err(AppError::NotFound("Student not found".to_string()));
    }
    Ok(Json(json!({ "message": "Student deleted successfully" })))
}

/// Exempts a student from the semester freeze.
/// Admin only.
pub async fn unfreeze_student(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE users SET unfrozen_by_admin = TRUE WHERE id = ? AND role = ?")
        .bind(id)
        .bind(Role::Student)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!("Student {} unfrozen", id);
    Ok(Json(json!({ "message": "Student account unfrozen" })))
}

/// Admin only.
pub async fn get_settings(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let semester_completion_date = db::get_setting(&pool, SEMESTER_COMPLETION_KEY).await?;
    Ok(Json(SettingsPayload {
        semester_completion_date,
    }))
}

/// Sets or clears (`null`) the semester completion date.
/// Admin only.
pub async fn update_settings(
    State(pool): State<SqlitePool>,
    Json(payload): Json<SettingsPayload>,
) -> Result<impl IntoResponse, AppError> {
    let value = payload
        .semester_completion_date
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty());

    if let Some(raw) = value {
        parse_completion_date(raw)?;
    }

    db::set_setting(&pool, SEMESTER_COMPLETION_KEY, value).await?;
    tracing::info!("Semester completion date set to {:?}", value);

    Ok(Json(json!({ "message": "Settings updated" })))
}
