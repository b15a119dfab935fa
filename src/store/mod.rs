//! SQLite persistence.
//!
//! `Db` owns a single connection; the per-aggregate `impl Db` blocks live in
//! the submodules. Async callers go through `DbHandle`, which serializes
//! access behind a mutex and runs each closure on the blocking pool.
//!
//! | Module        | Tables                                   |
//! |---------------|------------------------------------------|
//! | `users`       | `users`                                  |
//! | `sessions`    | `sessions`                               |
//! | `projects`    | `projects`, `project_members`            |
//! | `iterations`  | `iterations`                             |
//! | `tasks`       | `tasks`                                  |
//! | `work_items`  | `bugs`, `improvements`                   |
//! | `ranges`      | `indicator_ranges`                       |
//! | `indicators`  | `indicators`                             |
//! | `remediation` | `causes`, `actions`                      |

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

mod indicators;
mod iterations;
mod projects;
mod ranges;
mod remediation;
mod sessions;
mod tasks;
mod users;
mod work_items;

pub use iterations::NewIteration;
pub use projects::{NewProject, ProjectChanges};
pub use remediation::NewAction;
pub use tasks::{NewTask, TaskChanges};
pub use work_items::NewWorkItem;

/// Async-safe handle to the database.
///
/// All access runs on tokio's blocking pool so synchronous SQLite I/O never
/// occupies an async worker.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<Db>>,
}

impl DbHandle {
    pub fn new(db: Db) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run `f` with exclusive access to the connection. Everything moved into
    /// `f` must be owned.
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Db) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Blocking access for startup and tests. Never call from a request path.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, Db>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))
    }
}

pub struct Db {
    conn: Connection,
}

impl Db {
    /// Open (or create) the database file and bring the schema up to date.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        tracing::debug!("database schema ready");
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS users (
                    id BLOB PRIMARY KEY,
                    name TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    id BLOB PRIMARY KEY,
                    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    token TEXT NOT NULL UNIQUE,
                    expires_at TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS projects (
                    id BLOB PRIMARY KEY,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    color TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS project_members (
                    project_id BLOB NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    PRIMARY KEY (project_id, user_id)
                );

                CREATE TABLE IF NOT EXISTS iterations (
                    id BLOB PRIMARY KEY,
                    project_id BLOB NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    number INTEGER NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    start_at TEXT NOT NULL,
                    end_at TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id BLOB PRIMARY KEY,
                    iteration_id BLOB NOT NULL REFERENCES iterations(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    assignee_id BLOB REFERENCES users(id) ON DELETE SET NULL,
                    status TEXT NOT NULL DEFAULT 'NotStarted',
                    timer INTEGER NOT NULL DEFAULT 0,
                    points INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS bugs (
                    id BLOB PRIMARY KEY,
                    task_id BLOB NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                    assignee_id BLOB REFERENCES users(id) ON DELETE SET NULL,
                    number INTEGER NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    points INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS improvements (
                    id BLOB PRIMARY KEY,
                    task_id BLOB NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                    assignee_id BLOB REFERENCES users(id) ON DELETE SET NULL,
                    number INTEGER NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    points INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS indicator_ranges (
                    id BLOB PRIMARY KEY,
                    project_id BLOB NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    indicator_type TEXT NOT NULL,
                    ok_min REAL NOT NULL,
                    ok_max REAL NOT NULL,
                    alert_min REAL NOT NULL,
                    alert_max REAL NOT NULL,
                    critical_min REAL NOT NULL,
                    critical_max REAL NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE (project_id, indicator_type)
                );

                CREATE TABLE IF NOT EXISTS indicators (
                    id BLOB PRIMARY KEY,
                    iteration_id BLOB NOT NULL UNIQUE REFERENCES iterations(id) ON DELETE CASCADE,
                    speed_value REAL NOT NULL DEFAULT 0,
                    rework_value REAL NOT NULL DEFAULT 0,
                    instability_value REAL NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS causes (
                    id BLOB PRIMARY KEY,
                    indicator_range_id BLOB NOT NULL REFERENCES indicator_ranges(id) ON DELETE CASCADE,
                    metric TEXT NOT NULL,
                    description TEXT NOT NULL,
                    productivity_level TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS actions (
                    id BLOB PRIMARY KEY,
                    indicator_range_id BLOB NOT NULL REFERENCES indicator_ranges(id) ON DELETE CASCADE,
                    cause_id BLOB NOT NULL REFERENCES causes(id) ON DELETE CASCADE,
                    description TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'NotStarted',
                    start_at TEXT,
                    end_at TEXT,
                    assignee_id BLOB REFERENCES users(id) ON DELETE SET NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
                CREATE INDEX IF NOT EXISTS idx_iterations_project ON iterations(project_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_iteration ON tasks(iteration_id);
                CREATE INDEX IF NOT EXISTS idx_bugs_task ON bugs(task_id);
                CREATE INDEX IF NOT EXISTS idx_improvements_task ON improvements(task_id);
                CREATE INDEX IF NOT EXISTS idx_causes_range ON causes(indicator_range_id);
                CREATE INDEX IF NOT EXISTS idx_actions_range ON actions(indicator_range_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    /// True when a row with `id` exists in `table`. Table names are always
    /// compile-time constants.
    fn exists(&self, table: &'static str, id: Uuid) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?1", table);
        let found = self
            .conn
            .query_row(&sql, params![id], |_| Ok(()))
            .optional()
            .with_context(|| format!("Failed to look up {} row", table))?;
        Ok(found.is_some())
    }
}

/// True for a UNIQUE constraint failure.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Parse a stored enum column, attaching the column name on failure.
fn parse_column<T>(value: &str, column: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("Failed to parse {} column", column))
}
