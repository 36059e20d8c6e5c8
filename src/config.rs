//! Server configuration loaded from environment variables.
//!
//! - `PROCEDURE_ROSTER_DB` - SQLite database path (default: platform data directory)
//! - `PROCEDURE_ROSTER_HOST` - bind address (default: `127.0.0.1`)
//! - `PROCEDURE_ROSTER_PORT` - HTTP port (default: `10010`)

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::db::{self, Database};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 10010;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Database file. `None` means the platform default location.
    pub db_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source, so parsing can be tested without touching
    /// the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("PROCEDURE_ROSTER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match lookup("PROCEDURE_ROSTER_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("Invalid PROCEDURE_ROSTER_PORT: {:?}", raw))?,
            None => DEFAULT_PORT,
        };

        let db_path = lookup("PROCEDURE_ROSTER_DB")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            host,
            port,
            db_path,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Open the configured database and bring its schema up to date.
    pub fn open_database(&self) -> Result<Database> {
        let path = match &self.db_path {
            Some(path) => path.clone(),
            None => db::default_path()?,
        };
        tracing::debug!("Opening database at {}", path.display());

        let db = Database::open(path)?;
        db.migrate()?;
        Ok(db)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_path: None,
        }
    }
}
