// src/handlers/registration.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    db,
    error::{AppError, is_unique_violation},
    models::{
        registration::{
            CompleteRegistrationRequest, NameRequest, REQUEST_COLUMNS, RegistrationRequest,
            RegistrationStatus, name_key,
        },
        user::{AuthResponse, PublicUser, Role},
    },
    utils::{hash::hash_password, jwt::sign_jwt},
};

fn required_names(payload: &NameRequest) -> Result<(String, String), AppError> {
    let (first_name, last_name) = payload.trimmed();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(AppError::BadRequest(
            "First and Last name are required".to_string(),
        ));
    }
    Ok((first_name, last_name))
}

async fn find_by_name(
    pool: &SqlitePool,
    first_name: &str,
    last_name: &str,
) -> Result<Option<RegistrationRequest>, AppError> {
    let sql = format!(
        "SELECT {} FROM registration_requests WHERE name_key = ?",
        REQUEST_COLUMNS
    );
    let request = sqlx::query_as::<_, RegistrationRequest>(&sql)
        .bind(name_key(first_name, last_name))
        .fetch_optional(pool)
        .await?;
    Ok(request)
}

/// Step 1: a prospective student asks for an account.
///
/// Names are unique case-insensitively; the UNIQUE `name_key` column makes
/// the duplicate check and the insert one atomic step.
pub async fn request_access(
    State(pool): State<SqlitePool>,
    Json(payload): Json<NameRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let (first_name, last_name) = required_names(&payload)?;
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO registration_requests
            (first_name, last_name, name_key, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&first_name)
    .bind(&last_name)
    .bind(name_key(&first_name, &last_name))
    .bind(RegistrationStatus::Pending)
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("A request for this name already exists.".to_string())
        } else {
            tracing::error!("Failed to store registration request: {:?}", e);
            AppError::from(e)
        }
    })?;

    tracing::info!("Registration requested for {} {}", first_name, last_name);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Request submitted successfully. Please wait for admin approval."
        })),
    ))
}

/// Returns the request record for a name so the client can poll its status.
pub async fn check_status(
    State(pool): State<SqlitePool>,
    Json(payload): Json<NameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (first_name, last_name) = required_names(&payload)?;

    let request = find_by_name(&pool, &first_name, &last_name)
        .await?
        .ok_or_else(|| AppError::NotFound("No request found for this name.".to_string()))?;

    Ok(Json(request))
}

/// Step 3: turns an approved request into a student account.
///
/// The account insert and the approved -> completed transition share one
/// transaction, and the transition is conditional on the row still being
/// approved, so a request can be completed at most once.
pub async fn complete_registration(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<CompleteRegistrationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    // Hash before opening the transaction to keep it short.
    let password_hash = hash_password(&payload.password)?;

    let mut tx = db::begin_write(&pool).await?;

    let request_id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM registration_requests WHERE name_key = ? AND status = ?",
    )
    .bind(name_key(&payload.first_name, &payload.last_name))
    .bind(RegistrationStatus::Approved)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::BadRequest("Registration not approved or not found.".to_string()))?;

    let user = db::insert_user(&mut *tx, &payload.username, Role::Student, &password_hash).await?;

    let updated = sqlx::query(
        "UPDATE registration_requests SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(RegistrationStatus::Completed)
    .bind(Utc::now())
    .bind(request_id)
    .bind(RegistrationStatus::Approved)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Registration was already completed.".to_string(),
        ));
    }

    tx.commit().await?;
    tracing::info!("Registration completed for {}", user.username());

    let token = sign_jwt(user.id, &config.jwt_secret, config.jwt_expiration)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: PublicUser::from(&user),
            token,
        }),
    ))
}

/// Lists pending requests, newest first.
/// Admin only.
pub async fn list_pending(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let sql = format!(
        "SELECT {} FROM registration_requests WHERE status = ? ORDER BY created_at DESC, id DESC",
        REQUEST_COLUMNS
    );
    let requests = sqlx::query_as::<_, RegistrationRequest>(&sql)
        .bind(RegistrationStatus::Pending)
        .fetch_all(&pool)
        .await?;

    Ok(Json(requests))
}

/// Applies a status transition to a request, enforcing the state machine.
async fn transition(
    pool: &SqlitePool,
    id: i64,
    next: RegistrationStatus,
) -> Result<RegistrationRequest, AppError> {
    let sql = format!(
        "SELECT {} FROM registration_requests WHERE id = ?",
        REQUEST_COLUMNS
    );
    let current = sqlx::query_as::<_, RegistrationRequest>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Request not found".to_string()))?;

    if !current.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "Request is {:?}, cannot move to {:?}",
            current.status, next
        )));
    }

    let now = Utc::now();
    let approved_at = if next == RegistrationStatus::Approved {
        Some(now)
    } else {
        current.approved_at
    };

    let sql = format!(
        "UPDATE registration_requests SET status = ?, approved_at = ?, updated_at = ? \
         WHERE id = ? AND status = ? RETURNING {}",
        REQUEST_COLUMNS
    );
    sqlx::query_as::<_, RegistrationRequest>(&sql)
        .bind(next)
        .bind(approved_at)
        .bind(now)
        .bind(id)
        .bind(current.status)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::Conflict("Request changed concurrently, retry".to_string()))
}

/// Moves a pending request to approved and stamps the approval time.
/// Admin only.
pub async fn approve_request(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let request = transition(&pool, id, RegistrationStatus::Approved).await?;
    tracing::info!(
        "Approved registration for {} {}",
        request.first_name,
        request.last_name
    );
    Ok(Json(json!({ "message": "Request approved", "request": request })))
}

/// Moves a pending request to rejected.
/// Admin only.
pub async fn reject_request(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let request = transition(&pool, id, RegistrationStatus::Rejected).await?;
    tracing::info!(
        "Rejected registration for {} {}",
        request.first_name,
        request.last_name
    );
    Ok(Json(json!({ "message": "Request rejected", "request": request })))
}
