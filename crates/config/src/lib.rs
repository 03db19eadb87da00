//! Layered configuration: built-in defaults, then an optional TOML file,
//! then `MDWATCH_`-prefixed environment variables. Later layers win.
//!
//! Only deployment concerns live here (where the database is, which
//! endpoints to talk to). Per-run behavior like reindexing or rate-limit
//! budgets belongs to the CLI.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables are read as e.g. `MDWATCH_FEED__API_URL`.
pub const ENV_PREFIX: &str = "MDWATCH_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub feed: FeedConfig,
    pub nats: NatsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Where the SQLite cache lives. `None` uses the platform data
    /// directory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { api_url: "https://api.mangadex.org".to_string() }
    }
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self { url: "nats://127.0.0.1:4222".to_string() }
    }
}

impl Config {
    /// Load configuration, merging the layers in precedence order.
    ///
    /// With an explicit `file` the file must exist; without one, the
    /// platform config directory is consulted and silently skipped when
    /// there's nothing there.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        match file {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration file");
                figment = figment.merge(Toml::file_exact(path));
            },
            None => {
                if let Some(path) = default_config_file() {
                    figment = figment.merge(Toml::file(path));
                }
            },
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Invalid)
    }
}

impl DatabaseConfig {
    /// The effective database path: the configured one, or `cache.db` in
    /// the platform data directory.
    pub fn resolve_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => {
                let dirs = project_dirs().ok_or_raise(|| ErrorKind::NoHome)?;
                Ok(dirs.data_dir().join("cache.db"))
            },
        }
    }
}

/// The default configuration file location, when the platform has one.
pub fn default_config_file() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "mdwatch")
}
