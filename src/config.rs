//! Service configuration read from `prodyo.toml`.
//!
//! Values are layered file → environment → CLI. Every key has a default, so
//! a missing file or an empty section is valid.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! cors_permissive = false
//!
//! [database]
//! path = "prodyo.db"
//!
//! [auth]
//! session_ttl_hours = 24
//! bcrypt_cost = 12
//!
//! [logging]
//! format = "fmt"
//! filter = "prodyo=info,tower_http=info"
//! ```
//!
//! | Variable                   | Overrides                |
//! |----------------------------|--------------------------|
//! | `PRODYO_HOST`              | `server.host`            |
//! | `PRODYO_PORT`              | `server.port`            |
//! | `PRODYO_DB_PATH`           | `database.path`          |
//! | `PRODYO_SESSION_TTL_HOURS` | `auth.session_ttl_hours` |
//! | `PRODYO_BCRYPT_COST`       | `auth.bcrypt_cost`       |
//! | `PRODYO_LOG_FORMAT`        | `logging.format`         |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::AuthSettings;

pub const CONFIG_FILE: &str = "prodyo.toml";

const BCRYPT_MIN_COST: u32 = 4;
const BCRYPT_MAX_COST: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Fmt,
    /// One JSON object per event
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Fmt => write!(f, "fmt"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fmt" | "text" => Ok(LogFormat::Fmt),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid log format '{}'. Valid values: fmt, json", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow any origin. Meant for local frontend development.
    #[serde(default)]
    pub cors_permissive: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_permissive: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("prodyo.db")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u32,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

fn default_session_ttl_hours() -> u32 {
    24
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directives. `PRODYO_LOG` wins over this at startup.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

pub fn default_log_filter() -> String {
    "prodyo=info,tower_http=info".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProdyoToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl ProdyoToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse prodyo.toml")
    }

    /// Returns defaults when `path` does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize prodyo.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies `PRODYO_*` overrides from `lookup`. Malformed numbers are
    /// errors rather than silently ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("PRODYO_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PRODYO_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PRODYO_PORT is not a valid port: {}", port))?;
        }
        if let Some(path) = lookup("PRODYO_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(ttl) = lookup("PRODYO_SESSION_TTL_HOURS") {
            self.auth.session_ttl_hours = ttl
                .parse()
                .with_context(|| format!("PRODYO_SESSION_TTL_HOURS is not a number: {}", ttl))?;
        }
        if let Some(cost) = lookup("PRODYO_BCRYPT_COST") {
            self.auth.bcrypt_cost = cost
                .parse()
                .with_context(|| format!("PRODYO_BCRYPT_COST is not a number: {}", cost))?;
        }
        if let Some(format) = lookup("PRODYO_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            session_ttl: chrono::Duration::hours(i64::from(self.auth.session_ttl_hours)),
            bcrypt_cost: self.auth.bcrypt_cost,
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.host.trim().is_empty() {
            warnings.push("server.host is empty".to_string());
        }
        if self.server.port == 0 {
            warnings.push("server.port 0 picks a random port on every start".to_string());
        }
        if self.database.path.as_os_str().is_empty() {
            warnings.push("database.path is empty".to_string());
        }
        if self.auth.session_ttl_hours == 0 {
            warnings.push("auth.session_ttl_hours is 0; sessions expire immediately".to_string());
        }
        if !(BCRYPT_MIN_COST..=BCRYPT_MAX_COST).contains(&self.auth.bcrypt_cost) {
            warnings.push(format!(
                "auth.bcrypt_cost {} is outside {}..={}",
                self.auth.bcrypt_cost, BCRYPT_MIN_COST, BCRYPT_MAX_COST
            ));
        }
        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.logging.filter) {
            warnings.push(format!(
                "Invalid logging.filter '{}': {}",
                self.logging.filter, e
            ));
        }

        warnings
    }
}
