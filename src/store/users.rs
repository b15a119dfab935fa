use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use super::{Db, is_unique_violation};
use crate::errors::TrackerError;
use crate::models::{Member, PageRequest, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl Db {
    /// Insert a user. A duplicate email raises `TrackerError::Conflict`.
    pub fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Result<User> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        match self.conn.execute(
            "INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, name, email, password_hash, now],
        ) {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(TrackerError::Conflict(format!(
                    "Email {} is already registered",
                    email
                ))
                .into());
            }
            Err(e) => return Err(e).context("Failed to insert user"),
        }
        self.get_user(id)?.context("User not found after insert")
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()
            .context("Failed to query user")
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email],
                user_from_row,
            )
            .optional()
            .context("Failed to query user by email")
    }

    /// Rename a user or change their email. A taken email raises
    /// `TrackerError::Conflict`.
    pub fn update_user(&self, id: Uuid, name: &str, email: &str) -> Result<User> {
        if name.trim().is_empty() || email.trim().is_empty() {
            return Err(TrackerError::validation("Name and email are required").into());
        }
        match self.conn.execute(
            "UPDATE users SET name = ?1, email = ?2, updated_at = ?3 WHERE id = ?4",
            params![name, email, Utc::now(), id],
        ) {
            Ok(0) => return Err(TrackerError::not_found("User", id).into()),
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(TrackerError::Conflict(format!(
                    "Email {} is already registered",
                    email
                ))
                .into());
            }
            Err(e) => return Err(e).context("Failed to update user"),
        }
        self.get_user(id)?.context("User not found after update")
    }

    /// Removes the user with their sessions and memberships. Tasks and
    /// actions they were assigned to become unassigned.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .context("Failed to delete user")?;
        Ok(count > 0)
    }

    /// One page of the member directory, ordered by name, plus the total.
    pub fn list_members(&self, page: &PageRequest) -> Result<(Vec<Member>, u64)> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .context("Failed to count users")?;

        let mut stmt = self
            .conn
            .prepare("SELECT id, name, email FROM users ORDER BY name, email LIMIT ?1 OFFSET ?2")
            .context("Failed to prepare list_members")?;
        let rows = stmt
            .query_map(
                params![i64::from(page.page_size()), page.offset() as i64],
                |row| {
                    Ok(Member {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                    })
                },
            )
            .context("Failed to query members")?;
        let members = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read member row")?;
        Ok((members, total.max(0) as u64))
    }

    /// Fails with `NotFound` unless the user exists.
    pub fn require_user(&self, id: Uuid) -> Result<()> {
        if self.exists("users", id)? {
            Ok(())
        } else {
            Err(TrackerError::not_found("User", id).into())
        }
    }

    pub(crate) fn member(&self, id: Option<Uuid>) -> Result<Option<Member>> {
        let Some(id) = id else {
            return Ok(None);
        };
        Ok(self.get_user(id)?.map(|u| u.to_member()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_fetch_user() -> Result<()> {
        let db = Db::new_in_memory()?;
        let user = db.create_user("Ada", "ada@example.com", "hash")?;
        assert_eq!(user.email, "ada@example.com");

        let fetched = db.get_user(user.id)?.expect("user should exist");
        assert_eq!(fetched.name, "Ada");
        assert_eq!(fetched.password_hash, "hash");

        let by_email = db.get_user_by_email("ada@example.com")?;
        assert_eq!(by_email.map(|u| u.id), Some(user.id));
        Ok(())
    }

    #[test]
    fn test_duplicate_email_is_conflict() -> Result<()> {
        let db = Db::new_in_memory()?;
        db.create_user("Ada", "ada@example.com", "hash")?;
        let err = db
            .create_user("Other Ada", "ada@example.com", "hash")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::Conflict(_))
        ));
        Ok(())
    }

    #[test]
    fn test_list_members_pages_by_name() -> Result<()> {
        let db = Db::new_in_memory()?;
        for name in ["Carol", "Alice", "Bob"] {
            db.create_user(name, &format!("{}@example.com", name.to_lowercase()), "h")?;
        }
        let req = PageRequest {
            page: Some(1),
            page_size: Some(2),
        };
        let (members, total) = db.list_members(&req)?;
        assert_eq!(total, 3);
        let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);

        let req = PageRequest {
            page: Some(2),
            page_size: Some(2),
        };
        let (members, _) = db.list_members(&req)?;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "Carol");
        Ok(())
    }

    #[test]
    fn test_require_user_missing_is_not_found() -> Result<()> {
        let db = Db::new_in_memory()?;
        let err = db.require_user(Uuid::new_v4()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::NotFound { entity: "User", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_update_user_checks_fields_and_email_clash() -> Result<()> {
        let db = Db::new_in_memory()?;
        let ada = db.create_user("Ada", "ada@example.com", "hash")?;
        db.create_user("Grace", "grace@example.com", "hash")?;

        let renamed = db.update_user(ada.id, "Ada Lovelace", "lovelace@example.com")?;
        assert_eq!(renamed.name, "Ada Lovelace");
        assert_eq!(renamed.email, "lovelace@example.com");
        assert_eq!(renamed.password_hash, "hash");

        let err = db.update_user(ada.id, " ", "x@example.com").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::Validation(_))
        ));
        let err = db
            .update_user(ada.id, "Ada", "grace@example.com")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::Conflict(_))
        ));
        let err = db
            .update_user(Uuid::new_v4(), "Nobody", "nobody@example.com")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::NotFound { entity: "User", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_delete_user_drops_sessions() -> Result<()> {
        let db = Db::new_in_memory()?;
        let ada = db.create_user("Ada", "ada@example.com", "hash")?;
        db.create_session(ada.id, "tok", Utc::now() + chrono::Duration::hours(1))?;

        assert!(db.delete_user(ada.id)?);
        assert!(db.get_user(ada.id)?.is_none());
        assert!(db.find_session("tok")?.is_none());
        assert!(!db.delete_user(ada.id)?);
        Ok(())
    }
}
