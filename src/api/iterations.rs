use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiError, ApiJson, SharedState, input};
use crate::store::NewIteration;

#[derive(Deserialize)]
pub struct CreateIterationRequest {
    pub project_id: Uuid,
    pub number: i64,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "input::time")]
    pub start_at: DateTime<Utc>,
    #[serde(deserialize_with = "input::time")]
    pub end_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct IterationFilter {
    pub project_id: Option<Uuid>,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/iterations", get(list_iterations).post(create_iteration))
        .route(
            "/iterations/{id}",
            get(get_iteration).delete(delete_iteration),
        )
        .route("/iterations/{id}/analysis", get(get_analysis))
        .route("/iterations/{id}/causes-actions", get(get_causes_and_actions))
}

async fn list_iterations(
    State(state): State<SharedState>,
    Query(filter): Query<IterationFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let iterations = state
        .db
        .call(move |db| db.list_iterations(filter.project_id))
        .await?;
    Ok(Json(iterations))
}

async fn create_iteration(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CreateIterationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = NewIteration {
        project_id: req.project_id,
        number: req.number,
        description: req.description,
        start_at: req.start_at,
        end_at: req.end_at,
    };
    let iteration = state.db.call(move |db| db.create_iteration(new)).await?;
    Ok((StatusCode::CREATED, Json(iteration)))
}

async fn get_iteration(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let iteration = state.db.call(move |db| db.get_iteration(id)).await?;
    match iteration {
        Some(iteration) => Ok(Json(iteration)),
        None => Err(ApiError::NotFound(format!("Iteration {} not found", id))),
    }
}

async fn delete_iteration(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.db.call(move |db| db.delete_iteration(id)).await?;
    match deleted {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(ApiError::NotFound(format!("Iteration {} not found", id))),
    }
}

async fn get_analysis(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let analysis = state.db.call(move |db| db.iteration_analysis(id)).await?;
    Ok(Json(analysis))
}

async fn get_causes_and_actions(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let found = state
        .db
        .call(move |db| db.causes_and_actions_for_iteration(id))
        .await?;
    Ok(Json(found))
}
