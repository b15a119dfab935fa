//! Schema setup without starting the server: `prodyo init-db`.

use std::path::Path;

use anyhow::Result;

pub fn cmd_init_db(db_path: &Path) -> Result<()> {
    prodyo::server::open_db(db_path)?;
    tracing::info!(db = %db_path.display(), "database initialized");
    println!("Database initialized at {}", db_path.display());
    Ok(())
}
