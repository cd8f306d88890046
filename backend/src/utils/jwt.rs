// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    db,
    error::AppError,
    models::user::{Role, User},
    state::AppState,
};

/// JWT Claims structure.
///
/// Only the user id is embedded; role and freeze state are read from the
/// database on every request.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - the user id, as a string.
    pub sub: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// Signs a new HS256 token for `user_id`.
pub fn sign_jwt(user_id: i64, secret: &str, expiration_seconds: u64) -> Result<String, AppError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs();

    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + expiration_seconds) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies a token and returns the user id it was issued for.
pub fn verify_jwt(token: &str, secret: &str) -> Result<i64, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    token_data
        .claims
        .sub
        .parse::<i64>()
        .map_err(|_| AppError::AuthError("Invalid token".to_string()))
}

/// Axum Middleware: Authentication.
///
/// Validates `Authorization: Bearer <token>`, loads the user it names and
/// injects that [`User`] into the request extensions. A token for a deleted
/// user is rejected like a bad token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthError("Please authenticate.".to_string()))?;

    let user_id = verify_jwt(token, &state.config.jwt_secret)?;

    let user = db::fetch_user(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::AuthError("Please authenticate.".to_string()))?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Rejects the request unless the authenticated user's role is in `allowed`.
///
/// Must run after [`auth_middleware`].
fn require_role(req: &Request<Body>, allowed: &[Role]) -> Result<(), AppError> {
    let user = req
        .extensions()
        .get::<User>()
        .ok_or_else(|| AppError::AuthError("Please authenticate.".to_string()))?;

    if !allowed.contains(&user.role) {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }
    Ok(())
}

/// Admin only.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    require_role(&req, &[Role::Admin])?;
    Ok(next.run(req).await)
}

/// Admin or teacher.
pub async fn staff_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    require_role(&req, &[Role::Admin, Role::Teacher])?;
    Ok(next.run(req).await)
}

/// Student only.
pub async fn student_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    require_role(&req, &[Role::Student])?;
    Ok(next.run(req).await)
}
