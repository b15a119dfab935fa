use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use super::Db;
use crate::errors::TrackerError;
use crate::models::{WorkItem, WorkItemKind};

#[derive(Debug, Clone)]
pub struct NewWorkItem {
    pub task_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub number: i64,
    pub description: String,
    pub points: i64,
}

struct WorkItemRow {
    id: Uuid,
    task_id: Uuid,
    assignee_id: Option<Uuid>,
    number: i64,
    description: String,
    points: i64,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

const WORK_ITEM_COLUMNS: &str =
    "id, task_id, assignee_id, number, description, points, created_at, updated_at";

fn work_item_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkItemRow> {
    Ok(WorkItemRow {
        id: row.get(0)?,
        task_id: row.get(1)?,
        assignee_id: row.get(2)?,
        number: row.get(3)?,
        description: row.get(4)?,
        points: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl Db {
    fn hydrate_work_item(&self, row: WorkItemRow) -> Result<WorkItem> {
        Ok(WorkItem {
            id: row.id,
            task_id: row.task_id,
            assignee: self.member(row.assignee_id)?,
            number: row.number,
            description: row.description,
            points: row.points,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    pub fn create_work_item(&self, kind: WorkItemKind, new: NewWorkItem) -> Result<WorkItem> {
        if new.points < 0 {
            return Err(TrackerError::validation("points must not be negative").into());
        }
        if !self.exists("tasks", new.task_id)? {
            return Err(TrackerError::not_found("Task", new.task_id).into());
        }
        if let Some(assignee) = new.assignee_id {
            self.require_user(assignee)?;
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {} (id, task_id, assignee_id, number, description, points, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    kind.table()
                ),
                params![
                    id,
                    new.task_id,
                    new.assignee_id,
                    new.number,
                    new.description,
                    new.points,
                    now
                ],
            )
            .with_context(|| format!("Failed to insert into {}", kind.table()))?;
        self.get_work_item(kind, id)?
            .with_context(|| format!("{} not found after insert", kind.entity()))
    }

    pub fn get_work_item(&self, kind: WorkItemKind, id: Uuid) -> Result<Option<WorkItem>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE id = ?1",
                    WORK_ITEM_COLUMNS,
                    kind.table()
                ),
                params![id],
                work_item_row,
            )
            .optional()
            .with_context(|| format!("Failed to query {}", kind.table()))?;
        row.map(|r| self.hydrate_work_item(r)).transpose()
    }

    /// Items ordered by number, optionally limited to one task.
    pub fn list_work_items(
        &self,
        kind: WorkItemKind,
        task_id: Option<Uuid>,
    ) -> Result<Vec<WorkItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM {} WHERE (?1 IS NULL OR task_id = ?1) ORDER BY number, created_at",
                WORK_ITEM_COLUMNS,
                kind.table()
            ))
            .with_context(|| format!("Failed to prepare list of {}", kind.table()))?;
        let rows = stmt
            .query_map(params![task_id], work_item_row)
            .with_context(|| format!("Failed to query {}", kind.table()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read work item row")?;
        rows.into_iter()
            .map(|r| self.hydrate_work_item(r))
            .collect()
    }
}
