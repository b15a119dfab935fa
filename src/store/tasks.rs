use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use prodyo_core::WorkStatus;
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use super::{Db, parse_column};
use crate::errors::TrackerError;
use crate::models::{Task, WorkItemKind};

/// Every writable task field. Used for inserts and full replacement.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub name: String,
    pub description: String,
    pub assignee_id: Option<Uuid>,
    pub status: WorkStatus,
    pub timer: i64,
    pub points: i64,
}

impl NewTask {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TrackerError::validation("name is required").into());
        }
        if self.timer < 0 {
            return Err(TrackerError::validation("timer must not be negative").into());
        }
        if self.points < 0 {
            return Err(TrackerError::validation("points must not be negative").into());
        }
        Ok(())
    }
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub status: Option<WorkStatus>,
    pub timer: Option<i64>,
    pub points: Option<i64>,
}

struct TaskRow {
    id: Uuid,
    iteration_id: Uuid,
    name: String,
    description: String,
    assignee_id: Option<Uuid>,
    status: String,
    timer: i64,
    points: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const TASK_COLUMNS: &str =
    "id, iteration_id, name, description, assignee_id, status, timer, points, created_at, updated_at";

fn task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        iteration_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        assignee_id: row.get(4)?,
        status: row.get(5)?,
        timer: row.get(6)?,
        points: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl Db {
    fn hydrate_task(&self, row: TaskRow) -> Result<Task> {
        let status: WorkStatus = parse_column(&row.status, "tasks.status")?;
        Ok(Task {
            id: row.id,
            iteration_id: row.iteration_id,
            name: row.name,
            description: row.description,
            assignee: self.member(row.assignee_id)?,
            status,
            timer: row.timer,
            points: row.points,
            bugs: self.list_work_items(WorkItemKind::Bug, Some(row.id))?,
            improvements: self.list_work_items(WorkItemKind::Improvement, Some(row.id))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    pub fn create_task(&self, iteration_id: Uuid, new: NewTask) -> Result<Task> {
        new.validate()?;
        self.require_iteration(iteration_id)?;
        if let Some(assignee) = new.assignee_id {
            self.require_user(assignee)?;
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        self.conn
            .execute(
                "INSERT INTO tasks
                 (id, iteration_id, name, description, assignee_id, status, timer, points, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    id,
                    iteration_id,
                    new.name,
                    new.description,
                    new.assignee_id,
                    new.status.as_str(),
                    new.timer,
                    new.points,
                    now
                ],
            )
            .context("Failed to insert task")?;
        self.get_task(id)?.context("Task not found after insert")
    }

    pub fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                params![id],
                task_row,
            )
            .optional()
            .context("Failed to query task")?;
        row.map(|r| self.hydrate_task(r)).transpose()
    }

    pub fn require_task(&self, id: Uuid) -> Result<Task> {
        self.get_task(id)?
            .ok_or_else(|| TrackerError::not_found("Task", id).into())
    }

    /// Tasks in creation order, optionally limited to one iteration.
    pub fn list_tasks(&self, iteration_id: Option<Uuid>) -> Result<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM tasks WHERE (?1 IS NULL OR iteration_id = ?1) ORDER BY created_at",
                TASK_COLUMNS
            ))
            .context("Failed to prepare list_tasks")?;
        let rows = stmt
            .query_map(params![iteration_id], task_row)
            .context("Failed to query tasks")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read task row")?;
        rows.into_iter().map(|r| self.hydrate_task(r)).collect()
    }

    /// Overwrites every writable field. A `None` assignee clears it.
    pub fn replace_task(&self, id: Uuid, fields: NewTask) -> Result<Task> {
        fields.validate()?;
        if let Some(assignee) = fields.assignee_id {
            self.require_user(assignee)?;
        }
        let count = self
            .conn
            .execute(
                "UPDATE tasks SET name = ?1, description = ?2, assignee_id = ?3, status = ?4,
                 timer = ?5, points = ?6, updated_at = ?7 WHERE id = ?8",
                params![
                    fields.name,
                    fields.description,
                    fields.assignee_id,
                    fields.status.as_str(),
                    fields.timer,
                    fields.points,
                    Utc::now(),
                    id
                ],
            )
            .context("Failed to update task")?;
        if count == 0 {
            return Err(TrackerError::not_found("Task", id).into());
        }
        self.get_task(id)?.context("Task not found after update")
    }

    pub fn patch_task(&self, id: Uuid, changes: TaskChanges) -> Result<Task> {
        let current = self.require_task(id)?;
        let fields = NewTask {
            name: changes.name.unwrap_or(current.name),
            description: changes.description.unwrap_or(current.description),
            assignee_id: changes
                .assignee_id
                .or_else(|| current.assignee.map(|m| m.id)),
            status: changes.status.unwrap_or(current.status),
            timer: changes.timer.unwrap_or(current.timer),
            points: changes.points.unwrap_or(current.points),
        };
        self.replace_task(id, fields)
    }

    pub fn delete_task(&self, id: Uuid) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])
            .context("Failed to delete task")?;
        Ok(count > 0)
    }
}
