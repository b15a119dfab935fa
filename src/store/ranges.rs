use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use prodyo_core::{IndicatorType, ProductivityRange, RangeSet, RangeValues};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::{Db, parse_column};
use crate::errors::TrackerError;
use crate::models::{IndicatorRange, range_set};

struct RangeRow {
    id: Uuid,
    project_id: Uuid,
    indicator_type: String,
    bounds: [f64; 6],
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RangeRow {
    fn into_range(self) -> Result<IndicatorRange> {
        let indicator_type: IndicatorType =
            parse_column(&self.indicator_type, "indicator_ranges.indicator_type")?;
        let [ok_min, ok_max, alert_min, alert_max, critical_min, critical_max] = self.bounds;
        Ok(IndicatorRange {
            id: self.id,
            project_id: self.project_id,
            indicator_type,
            range: ProductivityRange {
                ok: RangeValues::new(ok_min, ok_max),
                alert: RangeValues::new(alert_min, alert_max),
                critical: RangeValues::new(critical_min, critical_max),
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const RANGE_COLUMNS: &str = "id, project_id, indicator_type, ok_min, ok_max, alert_min, alert_max, \
                             critical_min, critical_max, created_at, updated_at";

fn range_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RangeRow> {
    Ok(RangeRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        indicator_type: row.get(2)?,
        bounds: [
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
        ],
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Insert or overwrite the bands for `(project_id, indicator_type)` and
/// return the stored row's id. On conflict the existing id is kept.
fn upsert_range(
    conn: &Connection,
    project_id: Uuid,
    indicator_type: IndicatorType,
    range: &ProductivityRange,
) -> Result<Uuid> {
    let now = Utc::now();
    conn.query_row(
        "INSERT INTO indicator_ranges
         (id, project_id, indicator_type, ok_min, ok_max, alert_min, alert_max,
          critical_min, critical_max, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
         ON CONFLICT (project_id, indicator_type) DO UPDATE SET
            ok_min = excluded.ok_min,
            ok_max = excluded.ok_max,
            alert_min = excluded.alert_min,
            alert_max = excluded.alert_max,
            critical_min = excluded.critical_min,
            critical_max = excluded.critical_max,
            updated_at = excluded.updated_at
         RETURNING id",
        params![
            Uuid::new_v4(),
            project_id,
            indicator_type.as_str(),
            range.ok.min,
            range.ok.max,
            range.alert.min,
            range.alert.max,
            range.critical.min,
            range.critical.max,
            now
        ],
        |row| row.get(0),
    )
    .with_context(|| format!("Failed to upsert {} range", indicator_type))
}

impl Db {
    pub fn set_range(
        &self,
        project_id: Uuid,
        indicator_type: IndicatorType,
        range: ProductivityRange,
    ) -> Result<Uuid> {
        range.validate().map_err(TrackerError::from)?;
        self.require_project(project_id)?;
        let id = upsert_range(&self.conn, project_id, indicator_type, &range)?;
        tracing::debug!(%project_id, %indicator_type, range_id = %id, "range stored");
        Ok(id)
    }

    /// Seeds the three default ranges atomically, overwriting any bands
    /// already configured for those types.
    pub fn create_default_ranges(&self, project_id: Uuid) -> Result<Vec<IndicatorRange>> {
        self.require_project(project_id)?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        for indicator_type in IndicatorType::ALL {
            upsert_range(&tx, project_id, indicator_type, &indicator_type.default_range())?;
        }
        tx.commit().context("Failed to commit default ranges")?;
        self.get_ranges_by_project(project_id)
    }

    /// Ranges in `IndicatorType::ALL` order.
    pub fn get_ranges_by_project(&self, project_id: Uuid) -> Result<Vec<IndicatorRange>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM indicator_ranges WHERE project_id = ?1",
                RANGE_COLUMNS
            ))
            .context("Failed to prepare get_ranges_by_project")?;
        let rows = stmt
            .query_map(params![project_id], range_row)
            .context("Failed to query ranges")?;
        let mut ranges = Vec::new();
        for row in rows {
            let r = row.context("Failed to read range row")?;
            ranges.push(r.into_range()?);
        }
        ranges.sort_by_key(|r| r.indicator_type);
        Ok(ranges)
    }

    pub fn get_range_by_type(
        &self,
        project_id: Uuid,
        indicator_type: IndicatorType,
    ) -> Result<Option<IndicatorRange>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM indicator_ranges WHERE project_id = ?1 AND indicator_type = ?2",
                    RANGE_COLUMNS
                ),
                params![project_id, indicator_type.as_str()],
                range_row,
            )
            .optional()
            .context("Failed to query range by type")?;
        row.map(RangeRow::into_range).transpose()
    }

    pub fn get_range(&self, id: Uuid) -> Result<Option<IndicatorRange>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM indicator_ranges WHERE id = ?1", RANGE_COLUMNS),
                params![id],
                range_row,
            )
            .optional()
            .context("Failed to query range")?;
        row.map(RangeRow::into_range).transpose()
    }

    /// Removes one range. Stored indicator values stay; that type reads as
    /// `Unclassified` afterwards. A range that still carries causes or
    /// actions is kept so the remediation history survives.
    pub fn delete_range(&self, id: Uuid) -> Result<()> {
        if self.range_has_remediation(id)? {
            return Err(TrackerError::Conflict(format!(
                "Indicator range {} has recorded causes or actions",
                id
            ))
            .into());
        }
        let count = self
            .conn
            .execute("DELETE FROM indicator_ranges WHERE id = ?1", params![id])
            .context("Failed to delete range")?;
        if count == 0 {
            return Err(TrackerError::not_found("Indicator range", id).into());
        }
        Ok(())
    }

    /// Types without a configured range classify as `Unclassified`.
    pub fn project_range_set(&self, project_id: Uuid) -> Result<RangeSet> {
        let set = range_set(&self.get_ranges_by_project(project_id)?);
        if set.is_empty() {
            tracing::debug!(project_id = %project_id, "no indicator ranges configured");
        }
        Ok(set)
    }
}
