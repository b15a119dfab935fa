use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use super::Db;
use crate::errors::TrackerError;
use crate::models::{Member, PageRequest, Project, ProjectSummary};

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub color: String,
    pub member_ids: Vec<Uuid>,
}

/// Full-replacement update. `member_ids: None` leaves membership untouched.
#[derive(Debug, Clone)]
pub struct ProjectChanges {
    pub name: String,
    pub description: String,
    pub color: String,
    pub member_ids: Option<Vec<Uuid>>,
}

impl Db {
    /// Insert a project and its member links in one transaction. Every member
    /// must be an existing user.
    pub fn create_project(&self, new: NewProject) -> Result<Project> {
        if new.name.trim().is_empty() {
            return Err(TrackerError::validation("name is required").into());
        }
        for member_id in &new.member_ids {
            self.require_user(*member_id)?;
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "INSERT INTO projects (id, name, description, color, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, new.name, new.description, new.color, now],
        )
        .context("Failed to insert project")?;
        for member_id in &new.member_ids {
            tx.execute(
                "INSERT OR IGNORE INTO project_members (project_id, user_id) VALUES (?1, ?2)",
                params![id, member_id],
            )
            .context("Failed to insert project member")?;
        }
        tx.commit().context("Failed to commit project insert")?;

        self.get_project(id)?.context("Project not found after insert")
    }

    /// One page of projects in creation order, plus the total.
    pub fn list_projects(&self, page: &PageRequest) -> Result<(Vec<Project>, u64)> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))
            .context("Failed to count projects")?;

        let mut stmt = self
            .conn
            .prepare("SELECT id FROM projects ORDER BY created_at, name LIMIT ?1 OFFSET ?2")
            .context("Failed to prepare list_projects")?;
        let ids = stmt
            .query_map(
                params![i64::from(page.page_size()), page.offset() as i64],
                |row| row.get::<_, Uuid>(0),
            )
            .context("Failed to query projects")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read project row")?;

        let mut projects = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(project) = self.get_project(id)? {
                projects.push(project);
            }
        }
        Ok((projects, total.max(0) as u64))
    }

    /// One page of the projects `member_id` belongs to, each with its
    /// iteration count, plus the total.
    pub fn list_projects_by_member(
        &self,
        member_id: Uuid,
        page: &PageRequest,
    ) -> Result<(Vec<ProjectSummary>, u64)> {
        self.require_user(member_id)?;
        let total: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM project_members WHERE user_id = ?1",
                params![member_id],
                |row| row.get(0),
            )
            .context("Failed to count member projects")?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT p.id, (SELECT COUNT(*) FROM iterations i WHERE i.project_id = p.id)
                 FROM projects p JOIN project_members pm ON pm.project_id = p.id
                 WHERE pm.user_id = ?1
                 ORDER BY p.created_at, p.name LIMIT ?2 OFFSET ?3",
            )
            .context("Failed to prepare list_projects_by_member")?;
        let rows = stmt
            .query_map(
                params![member_id, i64::from(page.page_size()), page.offset() as i64],
                |row| Ok((row.get::<_, Uuid>(0)?, row.get::<_, i64>(1)?)),
            )
            .context("Failed to query member projects")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read member project row")?;

        let mut summaries = Vec::with_capacity(rows.len());
        for (id, iterations) in rows {
            if let Some(project) = self.get_project(id)? {
                summaries.push(ProjectSummary {
                    project,
                    iterations_count: iterations.max(0) as u64,
                });
            }
        }
        Ok((summaries, total.max(0) as u64))
    }

    pub fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, description, color, created_at, updated_at
                 FROM projects WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Project {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        color: row.get(3)?,
                        members: Vec::new(),
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()
            .context("Failed to query project")?;
        match row {
            Some(mut project) => {
                project.members = self.project_members(id)?;
                Ok(Some(project))
            }
            None => Ok(None),
        }
    }

    fn project_members(&self, project_id: Uuid) -> Result<Vec<Member>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT u.id, u.name, u.email FROM project_members pm
                 JOIN users u ON u.id = pm.user_id
                 WHERE pm.project_id = ?1 ORDER BY u.name",
            )
            .context("Failed to prepare project_members")?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok(Member {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                })
            })
            .context("Failed to query project members")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read project member row")
    }

    pub fn update_project(&self, id: Uuid, changes: ProjectChanges) -> Result<Project> {
        if changes.name.trim().is_empty() {
            return Err(TrackerError::validation("name is required").into());
        }
        if let Some(member_ids) = &changes.member_ids {
            for member_id in member_ids {
                self.require_user(*member_id)?;
            }
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let count = tx
            .execute(
                "UPDATE projects SET name = ?1, description = ?2, color = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![changes.name, changes.description, changes.color, Utc::now(), id],
            )
            .context("Failed to update project")?;
        if count == 0 {
            return Err(TrackerError::not_found("Project", id).into());
        }
        if let Some(member_ids) = &changes.member_ids {
            tx.execute(
                "DELETE FROM project_members WHERE project_id = ?1",
                params![id],
            )
            .context("Failed to clear project members")?;
            for member_id in member_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO project_members (project_id, user_id) VALUES (?1, ?2)",
                    params![id, member_id],
                )
                .context("Failed to insert project member")?;
            }
        }
        tx.commit().context("Failed to commit project update")?;

        self.get_project(id)?.context("Project not found after update")
    }

    /// Deletes the project; iterations, ranges and everything under them go
    /// with it.
    pub fn delete_project(&self, id: Uuid) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1", params![id])
            .context("Failed to delete project")?;
        Ok(count > 0)
    }

    pub fn require_project(&self, id: Uuid) -> Result<()> {
        if self.exists("projects", id)? {
            Ok(())
        } else {
            Err(TrackerError::not_found("Project", id).into())
        }
    }
}
