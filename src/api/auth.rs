use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::middleware::CurrentUser;
use super::{ApiError, ApiJson, SharedState};
use crate::auth::{self as credentials, INVALID_CREDENTIALS};
use crate::models::Member;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub user: Member,
}

pub fn public_routes() -> Router<SharedState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn protected_routes() -> Router<SharedState> {
    Router::new().route("/auth/logout", post(logout))
}

async fn register(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    credentials::validate_registration(&req.name, &email, &req.password)?;

    let cost = state.auth.bcrypt_cost;
    let password = req.password;
    let hash = tokio::task::spawn_blocking(move || credentials::hash_password(&password, cost))
        .await
        .map_err(|e| ApiError::Internal(format!("Hashing task failed: {}", e)))??;

    let name = req.name.trim().to_string();
    let user = state
        .db
        .call(move |db| db.create_user(&name, &email, &hash))
        .await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user.to_member())))
}

async fn login(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password are required".into(),
        ));
    }
    let email = req.email.trim().to_lowercase();
    let user = state
        .db
        .call(move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    let password = req.password;
    let hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || credentials::verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Verification task failed: {}", e)))?;
    if !verified {
        tracing::info!(user_id = %user.id, "login rejected");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let settings = state.auth;
    let user_id = user.id;
    let session = state
        .db
        .call(move |db| db.issue_session(user_id, &settings))
        .await?;
    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user: user.to_member(),
    }))
}

async fn logout(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let token = current.token;
    state.db.call(move |db| db.delete_session(&token)).await?;
    tracing::info!(user_id = %current.member.id, "logged out");
    Ok(StatusCode::NO_CONTENT)
}
