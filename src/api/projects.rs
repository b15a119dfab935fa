use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use prodyo_core::IndicatorType;
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiError, ApiJson, SharedState};
use crate::models::{Page, PageRequest, Pagination};
use crate::store::{NewProject, ProjectChanges};

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
}

/// `member_ids` omitted keeps the current members; `[]` removes them all.
#[derive(Deserialize)]
pub struct UpdateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub member_ids: Option<Vec<Uuid>>,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/{id}/indicator-ranges", get(list_ranges))
        .route(
            "/projects/{id}/indicator-ranges/{indicator_type}",
            get(get_range_by_type),
        )
}

async fn list_projects(
    State(state): State<SharedState>,
    Query(page): Query<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (projects, total) = state.db.call(move |db| db.list_projects(&page)).await?;
    Ok(Json(Page {
        data: projects,
        pagination: Pagination::new(&page, total),
    }))
}

async fn create_project(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CreateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = NewProject {
        name: req.name,
        description: req.description,
        color: req.color,
        member_ids: req.member_ids,
    };
    let project = state.db.call(move |db| db.create_project(new)).await?;
    tracing::info!(project_id = %project.id, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let project = state.db.call(move |db| db.get_project(id)).await?;
    match project {
        Some(project) => Ok(Json(project)),
        None => Err(ApiError::NotFound(format!("Project {} not found", id))),
    }
}

async fn update_project(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let changes = ProjectChanges {
        name: req.name,
        description: req.description,
        color: req.color,
        member_ids: req.member_ids,
    };
    let project = state
        .db
        .call(move |db| db.update_project(id, changes))
        .await?;
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.db.call(move |db| db.delete_project(id)).await?;
    match deleted {
        true => {
            tracing::info!(project_id = %id, "project deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        false => Err(ApiError::NotFound(format!("Project {} not found", id))),
    }
}

async fn list_ranges(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let ranges = state
        .db
        .call(move |db| {
            db.require_project(id)?;
            db.get_ranges_by_project(id)
        })
        .await?;
    Ok(Json(ranges))
}

async fn get_range_by_type(
    State(state): State<SharedState>,
    Path((id, indicator_type)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let indicator_type: IndicatorType = indicator_type.parse()?;
    let range = state
        .db
        .call(move |db| db.get_range_by_type(id, indicator_type))
        .await?;
    match range {
        Some(range) => Ok(Json(range)),
        None => Err(ApiError::NotFound(format!(
            "No {} range for project {}",
            indicator_type, id
        ))),
    }
}
