//! Indicators, their range configuration, and the causes and actions
//! recorded against degraded readings.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
};
use chrono::{DateTime, Utc};
use prodyo_core::{
    ActionChanges, ActionFields, IndicatorType, IndicatorValues, MetricKind, NewCause,
    ProductivityLevel, ProductivityRange, WorkStatus,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiError, ApiJson, SharedState, input};
use crate::errors::TrackerError;
use crate::store::NewAction;

const MISSING_RANGE: &str = "Indicator range not found. Please create an indicator range first.";

#[derive(Deserialize)]
pub struct IndicatorQuery {
    pub iteration_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct CreateIndicatorRequest {
    pub iteration_id: Uuid,
}

#[derive(Deserialize)]
pub struct SetRangeRequest {
    pub project_id: Uuid,
    pub indicator_type: String,
    pub range: ProductivityRange,
}

#[derive(Deserialize)]
pub struct DefaultRangesRequest {
    pub project_id: Uuid,
}

#[derive(Deserialize)]
pub struct CreateCauseRequest {
    pub indicator_range_id: Uuid,
    pub metric: String,
    pub description: String,
    pub productivity_level: String,
}

#[derive(Deserialize)]
pub struct CreateActionRequest {
    pub indicator_range_id: Uuid,
    pub metric: String,
    pub cause_description: String,
    pub description: String,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "input::optional_time")]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "input::optional_time")]
    pub end_at: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
}

/// Omitted fields keep their stored value.
#[derive(Deserialize)]
pub struct PatchActionRequest {
    pub description: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "input::optional_time")]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "input::optional_time")]
    pub end_at: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct MetricValuesRequest {
    pub speed_value: f64,
    pub rework_value: f64,
    pub instability_value: f64,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/indicators", get(get_by_iteration).post(create_indicator))
        .route("/indicators/ranges", post(set_range))
        .route("/indicators/ranges/default", post(create_default_ranges))
        .route("/indicators/ranges/{id}", delete(delete_range))
        .route("/indicators/causes", post(create_cause))
        .route("/indicators/actions", post(create_action))
        .route("/indicators/actions/{id}", patch(patch_action))
        .route("/indicators/{id}/metrics", put(update_metrics))
        .route("/indicators/{id}/metrics/recalculate", post(recalculate_metrics))
        .route("/indicators/{id}/summary", get(get_summary))
}

/// Rewrites the generic range 404 into the hint clients show to users.
fn range_hint(err: anyhow::Error) -> ApiError {
    match err.downcast::<TrackerError>() {
        Ok(TrackerError::NotFound {
            entity: "Indicator range",
            ..
        }) => ApiError::NotFound(MISSING_RANGE.to_string()),
        Ok(other) => other.into(),
        Err(other) => other.into(),
    }
}

async fn get_by_iteration(
    State(state): State<SharedState>,
    Query(query): Query<IndicatorQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(iteration_id) = query.iteration_id else {
        return Err(ApiError::BadRequest(
            "iteration_id query parameter is required".to_string(),
        ));
    };
    let indicator = state
        .db
        .call(move |db| db.get_indicator_by_iteration(iteration_id))
        .await?;
    match indicator {
        Some(indicator) => Ok(Json(indicator)),
        None => Err(ApiError::NotFound(format!(
            "No indicator for iteration {}",
            iteration_id
        ))),
    }
}

async fn create_indicator(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CreateIndicatorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let indicator = state
        .db
        .call(move |db| db.create_indicator(req.iteration_id))
        .await?;
    tracing::info!(
        indicator_id = %indicator.id,
        iteration_id = %indicator.iteration_id,
        "indicator created"
    );
    Ok((StatusCode::CREATED, Json(indicator)))
}

async fn set_range(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<SetRangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let indicator_type: IndicatorType = req.indicator_type.parse()?;
    let project_id = req.project_id;
    let range = req.range;
    let id = state
        .db
        .call(move |db| db.set_range(project_id, indicator_type, range))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": id,
            "project_id": project_id,
            "indicator_type": indicator_type,
            "range": range,
        })),
    ))
}

async fn create_default_ranges(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<DefaultRangesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project_id = req.project_id;
    let ranges = state
        .db
        .call(move |db| db.create_default_ranges(project_id))
        .await?;
    tracing::info!(%project_id, "default ranges applied");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "project_id": project_id,
            "ranges": ranges,
        })),
    ))
}

async fn delete_range(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.call(move |db| db.delete_range(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_cause(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CreateCauseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = NewCause {
        indicator_range_id: req.indicator_range_id,
        metric: req.metric.parse::<MetricKind>()?,
        description: req.description,
        productivity_level: req.productivity_level.parse::<ProductivityLevel>()?,
    };
    let cause = state
        .db
        .call(move |db| db.create_cause(new))
        .await
        .map_err(range_hint)?;
    Ok((StatusCode::CREATED, Json(cause)))
}

async fn create_action(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CreateActionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = NewAction {
        indicator_range_id: req.indicator_range_id,
        metric: req.metric.parse::<MetricKind>()?,
        cause_description: req.cause_description,
        fields: ActionFields {
            description: req.description,
            status: input::parse_status(req.status.as_deref())?,
            start_at: req.start_at,
            end_at: req.end_at,
            assignee_id: req.assignee_id,
        },
    };
    let action = state
        .db
        .call(move |db| db.create_action(new))
        .await
        .map_err(range_hint)?;
    tracing::info!(
        action_id = %action.id,
        cause_id = %action.cause.id,
        metric = %action.cause.metric,
        "remediation action created"
    );
    Ok((StatusCode::CREATED, Json(action)))
}

async fn patch_action(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<PatchActionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let changes = ActionChanges {
        description: req.description,
        status: req
            .status
            .as_deref()
            .map(str::parse::<WorkStatus>)
            .transpose()
            .map_err(TrackerError::from)?,
        start_at: req.start_at,
        end_at: req.end_at,
        assignee_id: req.assignee_id,
    };
    let action = state.db.call(move |db| db.patch_action(id, changes)).await?;
    Ok(Json(action))
}

async fn update_metrics(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<MetricValuesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let values = IndicatorValues {
        speed: req.speed_value,
        rework: req.rework_value,
        instability: req.instability_value,
    };
    let indicator = state
        .db
        .call(move |db| db.update_metric_values(id, values))
        .await?;
    Ok(Json(indicator))
}

async fn recalculate_metrics(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let indicator = state.db.call(move |db| db.recalculate_metrics(id)).await?;
    Ok(Json(indicator))
}

async fn get_summary(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (indicator, metrics) = state
        .db
        .call(move |db| {
            let indicator = db.require_indicator(id)?;
            let iteration = db.require_iteration(indicator.iteration_id)?;
            let ranges = db.project_range_set(iteration.project_id)?;
            let metrics = indicator.summary(&ranges);
            Ok((indicator, metrics))
        })
        .await?;
    Ok(Json(serde_json::json!({
        "indicator_id": indicator.id,
        "iteration_id": indicator.iteration_id,
        "metrics": metrics,
    })))
}
