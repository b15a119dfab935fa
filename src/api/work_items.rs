//! Bugs and improvements share one shape and one set of handlers.

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
use crate::models::WorkItemKind;
use crate::store::NewWorkItem;

#[derive(Deserialize)]
pub struct CreateWorkItemRequest {
    pub task_id: Uuid,
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub points: i64,
}

#[derive(Deserialize)]
pub struct WorkItemFilter {
    pub task_id: Option<Uuid>,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .merge(kind_routes(WorkItemKind::Bug, "/bugs"))
        .merge(kind_routes(WorkItemKind::Improvement, "/improvements"))
}

fn kind_routes(kind: WorkItemKind, base: &str) -> Router<SharedState> {
    Router::new()
        .route(
            base,
            get(
                move |state: State<SharedState>, query: Query<WorkItemFilter>| {
                    list_items(kind, state, query)
                },
            )
            .post(
                move |state: State<SharedState>, body: ApiJson<CreateWorkItemRequest>| {
                    create_item(kind, state, body)
                },
            ),
        )
        .route(
            &format!("{}/{{id}}", base),
            get(move |state: State<SharedState>, path: Path<Uuid>| get_item(kind, state, path)),
        )
}

async fn list_items(
    kind: WorkItemKind,
    State(state): State<SharedState>,
    Query(filter): Query<WorkItemFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .db
        .call(move |db| db.list_work_items(kind, filter.task_id))
        .await?;
    Ok(Json(items))
}

async fn create_item(
    kind: WorkItemKind,
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CreateWorkItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = NewWorkItem {
        task_id: req.task_id,
        assignee_id: req.assignee_id,
        number: req.number,
        description: req.description,
        points: req.points,
    };
    let item = state
        .db
        .call(move |db| db.create_work_item(kind, new))
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn get_item(
    kind: WorkItemKind,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state.db.call(move |db| db.get_work_item(kind, id)).await?;
    match item {
        Some(item) => Ok(Json(item)),
        None => Err(ApiError::NotFound(format!("{} {} not found", kind.entity(), id))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    async fn task_id(app: &axum::Router, token: &str) -> String {
        let (_, iteration_id) = project_with_iteration(app, token).await;
        let response = send(
            app,
            Method::POST,
            "/api/v1/tasks",
            Some(token),
            Some(json!({"iteration_id": iteration_id, "name": "t"})),
        )
        .await;
        let task: serde_json::Value = body_json(response.into_body()).await;
        task["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_bug_and_improvement_routes() {
        let (app, _, token) = authed_app().await;
        let task_id = task_id(&app, &token).await;

        let response = send(
            &app,
            Method::POST,
            "/api/v1/bugs",
            Some(&token),
            Some(json!({"task_id": task_id, "number": 1, "description": "crash", "points": 3})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let bug: serde_json::Value = body_json(response.into_body()).await;

        let response = send(
            &app,
            Method::GET,
            &format!("/api/v1/bugs/{}", bug["id"].as_str().unwrap()),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &app,
            Method::GET,
            &format!("/api/v1/improvements/{}", bug["id"].as_str().unwrap()),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(
            &app,
            Method::GET,
            &format!("/api/v1/bugs?task_id={}", task_id),
            Some(&token),
            None,
        )
        .await;
        let bugs: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert_eq!(bugs.len(), 1);

        let response = send(
            &app,
            Method::GET,
            &format!("/api/v1/tasks/{}", task_id),
            Some(&token),
            None,
        )
        .await;
        let task: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(task["bugs"][0]["points"], 3);
        assert_eq!(task["improvements"], json!([]));
    }

    #[tokio::test]
    async fn test_improvement_for_missing_task_is_not_found() {
        let (app, _, token) = authed_app().await;
        let response = send(
            &app,
            Method::POST,
            "/api/v1/improvements",
            Some(&token),
            Some(json!({"task_id": uuid::Uuid::new_v4(), "points": 1})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
