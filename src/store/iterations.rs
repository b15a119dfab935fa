use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use super::Db;
use crate::errors::TrackerError;
use crate::models::Iteration;

#[derive(Debug, Clone)]
pub struct NewIteration {
    pub project_id: Uuid,
    pub number: i64,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

const ITERATION_COLUMNS: &str =
    "id, project_id, number, description, start_at, end_at, created_at, updated_at";

fn iteration_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Iteration> {
    Ok(Iteration {
        id: row.get(0)?,
        project_id: row.get(1)?,
        number: row.get(2)?,
        description: row.get(3)?,
        start_at: row.get(4)?,
        end_at: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl Db {
    pub fn create_iteration(&self, new: NewIteration) -> Result<Iteration> {
        if new.end_at < new.start_at {
            return Err(TrackerError::validation("end_at must not be before start_at").into());
        }
        self.require_project(new.project_id)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        self.conn
            .execute(
                "INSERT INTO iterations
                 (id, project_id, number, description, start_at, end_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    id,
                    new.project_id,
                    new.number,
                    new.description,
                    new.start_at,
                    new.end_at,
                    now
                ],
            )
            .context("Failed to insert iteration")?;
        self.get_iteration(id)?
            .context("Iteration not found after insert")
    }

    pub fn get_iteration(&self, id: Uuid) -> Result<Option<Iteration>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM iterations WHERE id = ?1", ITERATION_COLUMNS),
                params![id],
                iteration_from_row,
            )
            .optional()
            .context("Failed to query iteration")
    }

    /// Fetches the iteration or raises `NotFound`.
    pub fn require_iteration(&self, id: Uuid) -> Result<Iteration> {
        self.get_iteration(id)?
            .ok_or_else(|| TrackerError::not_found("Iteration", id).into())
    }

    /// Iterations ordered by number, optionally limited to one project.
    pub fn list_iterations(&self, project_id: Option<Uuid>) -> Result<Vec<Iteration>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM iterations
                 WHERE (?1 IS NULL OR project_id = ?1)
                 ORDER BY number, start_at",
                ITERATION_COLUMNS
            ))
            .context("Failed to prepare list_iterations")?;
        let rows = stmt
            .query_map(params![project_id], iteration_from_row)
            .context("Failed to query iterations")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read iteration row")
    }

    pub fn delete_iteration(&self, id: Uuid) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM iterations WHERE id = ?1", params![id])
            .context("Failed to delete iteration")?;
        Ok(count > 0)
    }
}
