use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiError, ApiJson, SharedState};
use crate::models::{Page, PageRequest, Pagination};

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/users/{id}/projects", get(list_member_projects))
}

async fn list_users(
    State(state): State<SharedState>,
    Query(page): Query<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (members, total) = state.db.call(move |db| db.list_members(&page)).await?;
    Ok(Json(Page {
        data: members,
        pagination: Pagination::new(&page, total),
    }))
}

async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.db.call(move |db| db.get_user(id)).await?;
    match user {
        Some(user) => Ok(Json(user.to_member())),
        None => Err(ApiError::NotFound(format!("User {} not found", id))),
    }
}

async fn update_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_lowercase();
    let user = state
        .db
        .call(move |db| db.update_user(id, &name, &email))
        .await?;
    tracing::info!(user_id = %id, "user updated");
    Ok(Json(user.to_member()))
}

async fn delete_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.db.call(move |db| db.delete_user(id)).await?;
    match deleted {
        true => {
            tracing::info!(user_id = %id, "user deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        false => Err(ApiError::NotFound(format!("User {} not found", id))),
    }
}

/// Projects the user is a member of, each with its iteration count.
async fn list_member_projects(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (projects, total) = state
        .db
        .call(move |db| db.list_projects_by_member(id, &page))
        .await?;
    Ok(Json(Page {
        data: projects,
        pagination: Pagination::new(&page, total),
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};

    fn ada_id(state: &crate::api::SharedState) -> uuid::Uuid {
        state
            .db
            .lock_sync()
            .unwrap()
            .get_user_by_email("ada@example.com")
            .unwrap()
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_members_directory_is_paginated() {
        let (app, state, token) = authed_app().await;
        {
            let db = state.db.lock_sync().unwrap();
            for i in 0..4 {
                db.create_user(&format!("User {}", i), &format!("u{}@example.com", i), "x")
                    .unwrap();
            }
        }

        let response = send(
            &app,
            Method::GET,
            "/api/v1/users?page=2&page_size=2",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["pagination"]["total"], 5);
        assert_eq!(body["pagination"]["total_pages"], 3);
        assert_eq!(body["pagination"]["has_next"], true);
        assert_eq!(body["pagination"]["has_prev"], true);
    }

    #[tokio::test]
    async fn test_get_user_and_missing_user() {
        let (app, state, token) = authed_app().await;
        let id = state
            .db
            .lock_sync()
            .unwrap()
            .get_user_by_email("ada@example.com")
            .unwrap()
            .unwrap()
            .id;

        let response = send(&app, Method::GET, &format!("/api/v1/users/{}", id), Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(body["name"], "Ada");

        let response = send(
            &app,
            Method::GET,
            &format!("/api/v1/users/{}", uuid::Uuid::new_v4()),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_user_normalizes_email_and_requires_fields() {
        let (app, state, token) = authed_app().await;
        let uri = format!("/api/v1/users/{}", ada_id(&state));

        let response = send(
            &app,
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({"name": " Ada Lovelace ", "email": "Lovelace@Example.com"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["name"], "Ada Lovelace");
        assert_eq!(body["email"], "lovelace@example.com");
        assert!(body.get("password_hash").is_none());

        let response = send(&app, Method::PUT, &uri, Some(&token), Some(json!({"name": "Ada"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["error"], "Name and email are required");

        let response = send(
            &app,
            Method::PUT,
            &format!("/api/v1/users/{}", uuid::Uuid::new_v4()),
            Some(&token),
            Some(json!({"name": "Nobody", "email": "nobody@example.com"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_user_email_clash_is_conflict() {
        let (app, state, token) = authed_app().await;
        state
            .db
            .lock_sync()
            .unwrap()
            .create_user("Grace", "grace@example.com", "x")
            .unwrap();

        let response = send(
            &app,
            Method::PUT,
            &format!("/api/v1/users/{}", ada_id(&state)),
            Some(&token),
            Some(json!({"name": "Ada", "email": "GRACE@example.com"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_delete_user() {
        let (app, state, token) = authed_app().await;
        let grace = state
            .db
            .lock_sync()
            .unwrap()
            .create_user("Grace", "grace@example.com", "x")
            .unwrap();
        let uri = format!("/api/v1/users/{}", grace.id);

        let response = send(&app, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = send(&app, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = send(&app, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_member_projects_include_iteration_counts() {
        let (app, state, token) = authed_app().await;
        let ada = ada_id(&state);
        let response = send(
            &app,
            Method::POST,
            "/api/v1/projects",
            Some(&token),
            Some(json!({"name": "Apollo", "member_ids": [ada]})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let project: Value = body_json(response.into_body()).await;
        for number in 1..=2 {
            let response = send(
                &app,
                Method::POST,
                "/api/v1/iterations",
                Some(&token),
                Some(json!({
                    "project_id": project["id"],
                    "number": number,
                    "start_at": "2026-03-01",
                    "end_at": "2026-03-11"
                })),
            )
            .await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }
        project_with_iteration(&app, &token).await;

        let response = send(
            &app,
            Method::GET,
            &format!("/api/v1/users/{}/projects", ada),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = body_json(response.into_body()).await;
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["id"], project["id"]);
        assert_eq!(data[0]["iterations_count"], 2);
        assert_eq!(data[0]["members"][0]["email"], "ada@example.com");
        assert_eq!(body["pagination"]["total"], 1);

        let response = send(
            &app,
            Method::GET,
            &format!("/api/v1/users/{}/projects", uuid::Uuid::new_v4()),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
