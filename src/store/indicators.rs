use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use prodyo_core::{
    IndicatorValues, IterationAnalysis, IterationCalculator, ProductivityLevel, TaskSample,
    aggregate_values, elapsed_days,
};
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use super::{Db, is_unique_violation};
use crate::errors::TrackerError;
use crate::models::Indicator;

const INDICATOR_COLUMNS: &str =
    "id, iteration_id, speed_value, rework_value, instability_value, created_at, updated_at";

fn indicator_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Indicator> {
    Ok(Indicator {
        id: row.get(0)?,
        iteration_id: row.get(1)?,
        speed_value: row.get(2)?,
        rework_value: row.get(3)?,
        instability_value: row.get(4)?,
        speed_level: ProductivityLevel::Unclassified,
        rework_level: ProductivityLevel::Unclassified,
        instability_level: ProductivityLevel::Unclassified,
        causes: Vec::new(),
        actions: Vec::new(),
        created_at: row.get::<_, DateTime<Utc>>(5)?,
        updated_at: row.get::<_, DateTime<Utc>>(6)?,
    })
}

impl Db {
    /// Attach levels from the project's current ranges and the causes and
    /// actions recorded against those ranges.
    fn hydrate_indicator(&self, mut indicator: Indicator) -> Result<Indicator> {
        let iteration = self.require_iteration(indicator.iteration_id)?;
        let ranges = self.project_range_set(iteration.project_id)?;
        indicator.classify(&ranges);
        indicator.causes = self.list_causes_by_project(iteration.project_id)?;
        indicator.actions = self.list_actions_by_project(iteration.project_id)?;
        Ok(indicator)
    }

    /// One indicator per iteration; a second create is a conflict.
    pub fn create_indicator(&self, iteration_id: Uuid) -> Result<Indicator> {
        self.require_iteration(iteration_id)?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        match self.conn.execute(
            "INSERT INTO indicators (id, iteration_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![id, iteration_id, now],
        ) {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(TrackerError::Conflict(format!(
                    "Iteration {} already has an indicator",
                    iteration_id
                ))
                .into());
            }
            Err(e) => return Err(e).context("Failed to insert indicator"),
        }
        self.get_indicator(id)?
            .context("Indicator not found after insert")
    }

    pub fn get_indicator(&self, id: Uuid) -> Result<Option<Indicator>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM indicators WHERE id = ?1", INDICATOR_COLUMNS),
                params![id],
                indicator_from_row,
            )
            .optional()
            .context("Failed to query indicator")?;
        row.map(|i| self.hydrate_indicator(i)).transpose()
    }

    pub fn require_indicator(&self, id: Uuid) -> Result<Indicator> {
        self.get_indicator(id)?
            .ok_or_else(|| TrackerError::not_found("Indicator", id).into())
    }

    pub fn get_indicator_by_iteration(&self, iteration_id: Uuid) -> Result<Option<Indicator>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM indicators WHERE iteration_id = ?1",
                    INDICATOR_COLUMNS
                ),
                params![iteration_id],
                indicator_from_row,
            )
            .optional()
            .context("Failed to query indicator by iteration")?;
        row.map(|i| self.hydrate_indicator(i)).transpose()
    }

    /// Persist aggregate values. Non-finite values are rejected.
    pub fn update_metric_values(&self, id: Uuid, values: IndicatorValues) -> Result<Indicator> {
        values.validate().map_err(TrackerError::from)?;
        let count = self
            .conn
            .execute(
                "UPDATE indicators SET speed_value = ?1, rework_value = ?2,
                 instability_value = ?3, updated_at = ?4 WHERE id = ?5",
                params![
                    values.speed,
                    values.rework,
                    values.instability,
                    Utc::now(),
                    id
                ],
            )
            .context("Failed to update indicator metrics")?;
        if count == 0 {
            return Err(TrackerError::not_found("Indicator", id).into());
        }
        self.require_indicator(id)
    }

    fn iteration_samples(&self, iteration_id: Uuid) -> Result<Vec<TaskSample>> {
        Ok(self
            .list_tasks(Some(iteration_id))?
            .iter()
            .map(|t| t.sample())
            .collect())
    }

    /// Recompute the stored aggregates from the iteration's current tasks.
    pub fn recalculate_metrics(&self, id: Uuid) -> Result<Indicator> {
        let indicator = self.require_indicator(id)?;
        let iteration = self.require_iteration(indicator.iteration_id)?;
        let samples = self.iteration_samples(iteration.id)?;
        let values = aggregate_values(&samples, elapsed_days(iteration.start_at, iteration.end_at));
        tracing::debug!(
            indicator_id = %id,
            tasks = samples.len(),
            speed = values.speed,
            rework = values.rework,
            instability = values.instability,
            "metrics recalculated"
        );
        self.update_metric_values(id, values)
    }

    /// Per-task classified series for charting. Nothing is persisted.
    pub fn iteration_analysis(&self, iteration_id: Uuid) -> Result<IterationAnalysis> {
        let iteration = self.require_iteration(iteration_id)?;
        let ranges = self.project_range_set(iteration.project_id)?;
        let samples = self.iteration_samples(iteration_id)?;
        tracing::debug!(
            iteration_id = %iteration_id,
            tasks = samples.len(),
            ranges = ranges.len(),
            "building iteration analysis"
        );
        Ok(IterationCalculator::new(&samples, &ranges).analyse(iteration_id))
    }
}
