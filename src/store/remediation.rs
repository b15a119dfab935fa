use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use prodyo_core::{
    ActionChanges, ActionFields, MetricKind, NewCause, ProductivityLevel, WorkStatus,
};
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use super::{Db, parse_column};
use crate::errors::TrackerError;
use crate::models::{Action, Cause, CausesAndActions};

/// Input for the combined cause + action insert.
#[derive(Debug, Clone)]
pub struct NewAction {
    pub indicator_range_id: Uuid,
    pub metric: MetricKind,
    pub cause_description: String,
    pub fields: ActionFields,
}

struct CauseRow {
    id: Uuid,
    indicator_range_id: Uuid,
    metric: String,
    description: String,
    productivity_level: String,
    created_at: DateTime<Utc>,
}

impl CauseRow {
    fn into_cause(self) -> Result<Cause> {
        Ok(Cause {
            id: self.id,
            indicator_range_id: self.indicator_range_id,
            metric: parse_column::<MetricKind>(&self.metric, "causes.metric")?,
            description: self.description,
            productivity_level: parse_column::<ProductivityLevel>(
                &self.productivity_level,
                "causes.productivity_level",
            )?,
            created_at: self.created_at,
        })
    }
}

struct ActionRow {
    id: Uuid,
    indicator_range_id: Uuid,
    description: String,
    status: String,
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
    assignee_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cause: CauseRow,
}

const CAUSE_COLUMNS: &str =
    "c.id, c.indicator_range_id, c.metric, c.description, c.productivity_level, c.created_at";

const ACTION_SELECT: &str = "SELECT a.id, a.indicator_range_id, a.description, a.status, \
     a.start_at, a.end_at, a.assignee_id, a.created_at, a.updated_at, \
     c.id, c.indicator_range_id, c.metric, c.description, c.productivity_level, c.created_at \
     FROM actions a JOIN causes c ON c.id = a.cause_id";

fn cause_row_at(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<CauseRow> {
    Ok(CauseRow {
        id: row.get(offset)?,
        indicator_range_id: row.get(offset + 1)?,
        metric: row.get(offset + 2)?,
        description: row.get(offset + 3)?,
        productivity_level: row.get(offset + 4)?,
        created_at: row.get(offset + 5)?,
    })
}

fn cause_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CauseRow> {
    cause_row_at(row, 0)
}

fn action_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActionRow> {
    Ok(ActionRow {
        id: row.get(0)?,
        indicator_range_id: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        start_at: row.get(4)?,
        end_at: row.get(5)?,
        assignee_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        cause: cause_row_at(row, 9)?,
    })
}

fn insert_cause(conn: &rusqlite::Connection, new: &NewCause) -> Result<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO causes (id, indicator_range_id, metric, description, productivity_level, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            new.indicator_range_id,
            new.metric.as_str(),
            new.description,
            new.productivity_level.as_str(),
            Utc::now()
        ],
    )
    .context("Failed to insert cause")?;
    Ok(id)
}

impl Db {
    fn hydrate_action(&self, row: ActionRow) -> Result<Action> {
        let status: WorkStatus = parse_column(&row.status, "actions.status")?;
        Ok(Action {
            id: row.id,
            indicator_range_id: row.indicator_range_id,
            cause: row.cause.into_cause()?,
            description: row.description,
            status,
            start_at: row.start_at,
            end_at: row.end_at,
            assignee: self.member(row.assignee_id)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    /// The range must exist and track the indicator `metric` feeds.
    fn require_range_for(&self, id: Uuid, metric: MetricKind) -> Result<()> {
        let range = self
            .get_range(id)?
            .ok_or_else(|| TrackerError::not_found("Indicator range", id))?;
        if range.indicator_type != metric.indicator_type() {
            return Err(TrackerError::validation(format!(
                "Metric {} does not apply to a {} range",
                metric, range.indicator_type
            ))
            .into());
        }
        Ok(())
    }

    /// True when any cause or action still references the range.
    pub(super) fn range_has_remediation(&self, range_id: Uuid) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM causes WHERE indicator_range_id = ?1)
                      + (SELECT COUNT(*) FROM actions WHERE indicator_range_id = ?1)",
                params![range_id],
                |row| row.get(0),
            )
            .context("Failed to count range remediation")?;
        Ok(count > 0)
    }

    pub fn create_cause(&self, new: NewCause) -> Result<Cause> {
        new.validate().map_err(TrackerError::from)?;
        self.require_range_for(new.indicator_range_id, new.metric)?;
        let id = insert_cause(&self.conn, &new)?;
        self.get_cause(id)?.context("Cause not found after insert")
    }

    pub fn get_cause(&self, id: Uuid) -> Result<Option<Cause>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM causes c WHERE c.id = ?1", CAUSE_COLUMNS),
                params![id],
                cause_row,
            )
            .optional()
            .context("Failed to query cause")?;
        row.map(CauseRow::into_cause).transpose()
    }

    /// Creates a Critical cause and the action that remediates it in one
    /// transaction.
    pub fn create_action(&self, new: NewAction) -> Result<Action> {
        self.require_range_for(new.indicator_range_id, new.metric)?;
        new.fields.validate().map_err(TrackerError::from)?;
        if let Some(assignee) = new.fields.assignee_id {
            self.require_user(assignee)?;
        }
        let cause = NewCause {
            indicator_range_id: new.indicator_range_id,
            metric: new.metric,
            description: new.cause_description,
            productivity_level: ProductivityLevel::Critical,
        };
        cause.validate().map_err(TrackerError::from)?;

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let cause_id = insert_cause(&tx, &cause)?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        let fields = &new.fields;
        tx.execute(
            "INSERT INTO actions
             (id, indicator_range_id, cause_id, description, status, start_at, end_at,
              assignee_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                id,
                new.indicator_range_id,
                cause_id,
                fields.description,
                fields.status.as_str(),
                fields.start_at,
                fields.end_at,
                fields.assignee_id,
                now
            ],
        )
        .context("Failed to insert action")?;
        tx.commit().context("Failed to commit cause and action")?;

        self.get_action(id)?.context("Action not found after insert")
    }

    pub fn get_action(&self, id: Uuid) -> Result<Option<Action>> {
        let row = self
            .conn
            .query_row(
                &format!("{} WHERE a.id = ?1", ACTION_SELECT),
                params![id],
                action_row,
            )
            .optional()
            .context("Failed to query action")?;
        row.map(|r| self.hydrate_action(r)).transpose()
    }

    pub fn require_action(&self, id: Uuid) -> Result<Action> {
        self.get_action(id)?
            .ok_or_else(|| TrackerError::not_found("Action", id).into())
    }

    /// Writes every mutable field of the action. Writers holding separate
    /// connections are last-writer-wins.
    pub fn update_action(&self, id: Uuid, fields: &ActionFields) -> Result<Action> {
        fields.validate().map_err(TrackerError::from)?;
        if let Some(assignee) = fields.assignee_id {
            self.require_user(assignee)?;
        }
        let count = self
            .conn
            .execute(
                "UPDATE actions SET description = ?1, status = ?2, start_at = ?3, end_at = ?4,
                 assignee_id = ?5, updated_at = ?6 WHERE id = ?7",
                params![
                    fields.description,
                    fields.status.as_str(),
                    fields.start_at,
                    fields.end_at,
                    fields.assignee_id,
                    Utc::now(),
                    id
                ],
            )
            .context("Failed to update action")?;
        if count == 0 {
            return Err(TrackerError::not_found("Action", id).into());
        }
        self.require_action(id)
    }

    /// Read-modify-write with no version check; the returned row is a fresh
    /// read. Within one process the read and the write happen under the
    /// `DbHandle` mutex, so concurrent patches apply one after the other and
    /// disjoint fields all survive. Only writers on separate connections can
    /// overwrite each other's fields.
    pub fn patch_action(&self, id: Uuid, changes: ActionChanges) -> Result<Action> {
        let mut fields = self.require_action(id)?.fields();
        if changes.is_empty() {
            return Err(TrackerError::validation("No fields to update").into());
        }
        changes.apply(&mut fields);
        self.update_action(id, &fields)
    }

    pub fn list_causes_by_project(&self, project_id: Uuid) -> Result<Vec<Cause>> {
        self.query_causes(
            &format!(
                "SELECT {} FROM causes c
                 JOIN indicator_ranges r ON r.id = c.indicator_range_id
                 WHERE r.project_id = ?1 ORDER BY c.created_at",
                CAUSE_COLUMNS
            ),
            project_id,
        )
    }

    fn query_causes(&self, sql: &str, key: Uuid) -> Result<Vec<Cause>> {
        let mut stmt = self.conn.prepare(sql).context("Failed to prepare cause query")?;
        let rows = stmt
            .query_map(params![key], cause_row)
            .context("Failed to query causes")?;
        let mut causes = Vec::new();
        for row in rows {
            causes.push(row.context("Failed to read cause row")?.into_cause()?);
        }
        Ok(causes)
    }

    pub fn list_actions_by_project(&self, project_id: Uuid) -> Result<Vec<Action>> {
        self.query_actions(
            &format!(
                "{} JOIN indicator_ranges r ON r.id = a.indicator_range_id
                 WHERE r.project_id = ?1 ORDER BY a.created_at",
                ACTION_SELECT
            ),
            project_id,
        )
    }

    fn query_actions(&self, sql: &str, key: Uuid) -> Result<Vec<Action>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .context("Failed to prepare action query")?;
        let rows = stmt
            .query_map(params![key], action_row)
            .context("Failed to query actions")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read action row")?;
        rows.into_iter().map(|r| self.hydrate_action(r)).collect()
    }

    /// Causes and actions attached to any range of the iteration's project.
    pub fn causes_and_actions_for_iteration(&self, iteration_id: Uuid) -> Result<CausesAndActions> {
        let iteration = self.require_iteration(iteration_id)?;
        Ok(CausesAndActions {
            iteration_id,
            causes: self.list_causes_by_project(iteration.project_id)?,
            actions: self.list_actions_by_project(iteration.project_id)?,
        })
    }
}
