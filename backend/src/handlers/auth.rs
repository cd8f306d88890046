// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    db,
    error::AppError,
    models::{
        setting::is_frozen,
        user::{
            AuthResponse, CreateAccountRequest, LoginRequest, MeResponse, PublicUser, Role, User,
            parse_username,
        },
    },
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Self-registration of a student account `name@student`.
///
/// Returns 201 Created with the user and a token.
pub async fn register(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let password_hash = hash_password(&payload.password)?;
    let user = db::insert_user(&pool, &payload.name, Role::Student, &password_hash).await?;
    tracing::info!("Registered student {}", user.username());

    let token = sign_jwt(user.id, &config.jwt_secret, config.jwt_expiration)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: PublicUser::from(&user),
            token,
        }),
    ))
}

/// Authenticates a `name@role` username and returns a token.
///
/// Students are refused once the semester completion date has passed unless
/// an admin unfroze them.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("Login attempt for: {}", payload.username);

    // Format errors take precedence over length checks.
    let (name, role) = parse_username(&payload.username)?;
    payload.validate()?;

    let user = db::fetch_user_by_identity(&pool, &name, role)
        .await?
        .ok_or_else(|| {
            tracing::info!("User not found: {}", payload.username);
            AppError::AuthError("Invalid login credentials".to_string())
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        tracing::info!("Password mismatch for: {}", payload.username);
        return Err(AppError::AuthError("Invalid login credentials".to_string()));
    }

    let now = Utc::now();

    if user.role == Role::Student && !user.unfrozen_by_admin {
        let completion = db::semester_completion(&pool).await?;
        if is_frozen(completion, user.unfrozen_by_admin, now) {
            tracing::info!("Frozen student refused: {}", payload.username);
            return Err(AppError::Forbidden(
                "Account is frozen due to semester completion. Contact admin.".to_string(),
            ));
        }
    }

    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(now)
        .bind(user.id)
        .execute(&pool)
        .await?;

    let token = sign_jwt(user.id, &config.jwt_secret, config.jwt_expiration)?;
    tracing::info!("Login successful: {}", payload.username);

    let user = User {
        last_login: Some(now),
        ..user
    };

    Ok(Json(AuthResponse {
        user: PublicUser::from(&user),
        token,
    }))
}

/// Returns the authenticated user and the courses they are enrolled in.
pub async fn me(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    let enrolled_courses = db::enrolled_course_ids(&pool, user.id).await?;

    Ok(Json(MeResponse {
        user: PublicUser::from(&user),
        enrolled_courses,
    }))
}
