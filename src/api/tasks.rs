use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiError, ApiJson, SharedState, input};
use crate::errors::TrackerError;
use crate::store::{NewTask, TaskChanges};

/// Either seconds as a JSON number or text accepted by
/// [`input::parse_timer`].
#[derive(Deserialize)]
#[serde(untagged)]
pub enum TimerInput {
    Seconds(i64),
    Text(String),
}

impl TimerInput {
    fn seconds(&self) -> Result<i64, TrackerError> {
        match self {
            TimerInput::Seconds(secs) => Ok(*secs),
            TimerInput::Text(text) => input::parse_timer(text),
        }
    }
}

fn default_points() -> i64 {
    1
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub iteration_id: Uuid,
    #[serde(flatten)]
    pub fields: TaskFieldsRequest,
}

/// Full task body for create and replace. Omitted points count as 1.
#[derive(Deserialize)]
pub struct TaskFieldsRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub assignee_id: Option<Uuid>,
    pub status: Option<String>,
    pub timer: Option<TimerInput>,
    #[serde(default = "default_points")]
    pub points: i64,
}

impl TaskFieldsRequest {
    fn into_new_task(self) -> Result<NewTask, TrackerError> {
        Ok(NewTask {
            name: self.name,
            description: self.description,
            assignee_id: self.assignee_id,
            status: input::parse_status(self.status.as_deref())?,
            timer: self.timer.as_ref().map(TimerInput::seconds).transpose()?.unwrap_or(0),
            points: self.points,
        })
    }
}

#[derive(Deserialize)]
pub struct PatchTaskRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub status: Option<String>,
    pub timer: Option<TimerInput>,
    pub points: Option<i64>,
}

impl PatchTaskRequest {
    fn into_changes(self) -> Result<TaskChanges, TrackerError> {
        Ok(TaskChanges {
            name: self.name,
            description: self.description,
            assignee_id: self.assignee_id,
            status: self
                .status
                .as_deref()
                .map(|s| s.parse())
                .transpose()?,
            timer: self.timer.as_ref().map(TimerInput::seconds).transpose()?,
            points: self.points,
        })
    }
}

#[derive(Deserialize)]
pub struct TaskFilter {
    pub iteration_id: Option<Uuid>,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task)
                .put(replace_task)
                .patch(patch_task)
                .delete(delete_task),
        )
}

async fn list_tasks(
    State(state): State<SharedState>,
    Query(filter): Query<TaskFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let tasks = state
        .db
        .call(move |db| db.list_tasks(filter.iteration_id))
        .await?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let iteration_id = req.iteration_id;
    let new = req.fields.into_new_task()?;
    let task = state
        .db
        .call(move |db| db.create_task(iteration_id, new))
        .await?;
    tracing::debug!(task_id = %task.id, %iteration_id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state.db.call(move |db| db.get_task(id)).await?;
    match task {
        Some(task) => Ok(Json(task)),
        None => Err(ApiError::NotFound(format!("Task {} not found", id))),
    }
}

async fn replace_task(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<TaskFieldsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = req.into_new_task()?;
    let task = state.db.call(move |db| db.replace_task(id, fields)).await?;
    Ok(Json(task))
}

async fn patch_task(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<PatchTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let changes = req.into_changes()?;
    let task = state.db.call(move |db| db.patch_task(id, changes)).await?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.db.call(move |db| db.delete_task(id)).await?;
    match deleted {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(ApiError::NotFound(format!("Task {} not found", id))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_task_defaults() {
        let (app, _, token) = authed_app().await;
        let (_, iteration_id) = project_with_iteration(&app, &token).await;
        let response = send(
            &app,
            Method::POST,
            "/api/v1/tasks",
            Some(&token),
            Some(json!({"iteration_id": iteration_id, "name": "Write docs", "timer": "90m"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let task: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(task["status"], "NotStarted");
        assert_eq!(task["points"], 1);
        assert_eq!(task["timer"], 5400);
        assert!(task["assignee"].is_null());
        assert_eq!(task["bugs"], json!([]));
    }

    #[tokio::test]
    async fn test_timer_accepts_seconds_and_rejects_garbage() {
        let (app, _, token) = authed_app().await;
        let (_, iteration_id) = project_with_iteration(&app, &token).await;
        let response = send(
            &app,
            Method::POST,
            "/api/v1/tasks",
            Some(&token),
            Some(json!({"iteration_id": iteration_id, "name": "a", "timer": 7200})),
        )
        .await;
        let task: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(task["timer"], 7200);

        let response = send(
            &app,
            Method::POST,
            "/api/v1/tasks",
            Some(&token),
            Some(json!({"iteration_id": iteration_id, "name": "b", "timer": "soon"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert!(body["error"].as_str().unwrap().contains("invalid duration format"));
    }

    #[tokio::test]
    async fn test_unknown_status_is_bad_request() {
        let (app, _, token) = authed_app().await;
        let (_, iteration_id) = project_with_iteration(&app, &token).await;
        let response = send(
            &app,
            Method::POST,
            "/api/v1/tasks",
            Some(&token),
            Some(json!({"iteration_id": iteration_id, "name": "a", "status": "Done"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_patch_put_and_delete() {
        let (app, _, token) = authed_app().await;
        let (_, iteration_id) = project_with_iteration(&app, &token).await;
        let response = send(
            &app,
            Method::POST,
            "/api/v1/tasks",
            Some(&token),
            Some(json!({
                "iteration_id": iteration_id,
                "name": "Ship",
                "description": "release 1.0",
                "points": 5
            })),
        )
        .await;
        let task: serde_json::Value = body_json(response.into_body()).await;
        let uri = format!("/api/v1/tasks/{}", task["id"].as_str().unwrap());

        let response = send(
            &app,
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({"status": "in_progress"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let patched: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(patched["status"], "InProgress");
        assert_eq!(patched["description"], "release 1.0");
        assert_eq!(patched["points"], 5);

        let response = send(
            &app,
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({"name": "Ship it"})),
        )
        .await;
        let replaced: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(replaced["name"], "Ship it");
        assert_eq!(replaced["description"], "");
        assert_eq!(replaced["status"], "NotStarted");

        let response = send(
            &app,
            Method::GET,
            &format!("/api/v1/tasks?iteration_id={}", iteration_id),
            Some(&token),
            None,
        )
        .await;
        let listed: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert_eq!(listed.len(), 1);

        let response = send(&app, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = send(&app, Method::PATCH, &uri, Some(&token), Some(json!({}))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_task_for_missing_iteration_is_not_found() {
        let (app, _, token) = authed_app().await;
        let response = send(
            &app,
            Method::POST,
            "/api/v1/tasks",
            Some(&token),
            Some(json!({"iteration_id": uuid::Uuid::new_v4(), "name": "a"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
