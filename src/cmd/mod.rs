//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `serve`   | `Serve`          |
//! | `init_db` | `InitDb`         |
//! | `config`  | `Config`         |

use std::path::Path;

use anyhow::Result;
use prodyo::config::ProdyoToml;

pub mod config;
pub mod init_db;
pub mod serve;

pub use config::cmd_config;
pub use init_db::cmd_init_db;
pub use serve::cmd_serve;

/// File values with `PRODYO_*` overrides applied. A missing file means
/// defaults.
pub fn load_config(path: &Path) -> Result<ProdyoToml> {
    let mut config = ProdyoToml::load_or_default(path)?;
    config.apply_env()?;
    Ok(config)
}
