//! JSON HTTP API mounted under `/api/v1`.
//!
//! | Module        | Routes                                                |
//! |---------------|-------------------------------------------------------|
//! | `auth`        | `/auth/register`, `/auth/login`, `/auth/logout`       |
//! | `projects`    | `/projects`, `/projects/{id}/indicator-ranges`        |
//! | `users`       | `/users`, `/users/{id}/projects`                      |
//! | `iterations`  | `/iterations`, `/iterations/{id}/analysis`            |
//! | `tasks`       | `/tasks`                                              |
//! | `work_items`  | `/bugs`, `/improvements`                              |
//! | `indicators`  | `/indicators`, ranges, causes, actions, metrics       |
//!
//! Everything except health, register and login sits behind
//! [`middleware::require_auth`].

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::get,
};
use prodyo_core::DomainError;
use serde::de::DeserializeOwned;

use crate::auth::AuthSettings;
use crate::errors::TrackerError;
use crate::store::DbHandle;

mod auth;
mod indicators;
pub mod input;
mod iterations;
pub mod middleware;
mod projects;
mod tasks;
mod users;
mod work_items;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub auth: AuthSettings,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::Validation(msg) => ApiError::BadRequest(msg),
            TrackerError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            TrackerError::Conflict(msg) => ApiError::Conflict(msg),
            TrackerError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            TrackerError::Database(_) | TrackerError::Other(_) => internal(&err),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// Store errors carry a `TrackerError` when the caller can act on them;
/// anything else is a 500.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<TrackerError>() {
            Ok(tracked) => tracked.into(),
            Err(other) => internal(&other),
        }
    }
}

fn internal(err: &dyn std::fmt::Display) -> ApiError {
    tracing::error!(error = %err, "request failed");
    ApiError::Internal("Internal server error".to_string())
}

/// `Json` whose rejection is a 400 in the `{"error": ...}` shape.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router(state: &SharedState) -> Router<SharedState> {
    let protected = Router::new()
        .merge(auth::protected_routes())
        .merge(projects::routes())
        .merge(users::routes())
        .merge(iterations::routes())
        .merge(tasks::routes())
        .merge(work_items::routes())
        .merge(indicators::routes())
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let v1 = Router::new()
        .route("/health", get(health_check))
        .merge(auth::public_routes())
        .merge(protected);

    Router::new()
        .nest("/api/v1", v1)
        .route("/health", get(health_check))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "healthy"}))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use chrono::Duration;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::store::Db;

    pub fn test_state() -> SharedState {
        let db = Db::new_in_memory().unwrap();
        Arc::new(AppState {
            db: DbHandle::new(db),
            auth: AuthSettings {
                session_ttl: Duration::hours(1),
                bcrypt_cost: 4,
            },
        })
    }

    pub fn test_app() -> (Router, SharedState) {
        let state = test_state();
        (api_router(&state).with_state(state.clone()), state)
    }

    /// App plus a bearer token for a registered user.
    pub async fn authed_app() -> (Router, SharedState, String) {
        let (app, state) = test_app();
        let response = send(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(serde_json::json!({
                "name": "Ada",
                "email": "ada@example.com",
                "password": "correct horse"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let response = send(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(serde_json::json!({
                "email": "ada@example.com",
                "password": "correct horse"
            })),
        )
        .await;
        let body: serde_json::Value = body_json(response.into_body()).await;
        let token = body["token"].as_str().unwrap().to_string();
        (app, state, token)
    }

    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    pub async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Creates a project and an iteration through the API; returns their ids.
    pub async fn project_with_iteration(app: &Router, token: &str) -> (String, String) {
        let response = send(
            app,
            Method::POST,
            "/api/v1/projects",
            Some(token),
            Some(serde_json::json!({"name": "Apollo"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let project: serde_json::Value = body_json(response.into_body()).await;
        let project_id = project["id"].as_str().unwrap().to_string();

        let response = send(
            app,
            Method::POST,
            "/api/v1/iterations",
            Some(token),
            Some(serde_json::json!({
                "project_id": project_id,
                "number": 1,
                "start_at": "2026-03-01",
                "end_at": "2026-03-11"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let iteration: serde_json::Value = body_json(response.into_body()).await;
        (project_id, iteration["id"].as_str().unwrap().to_string())
    }
}
