//! User configuration, read from `<config dir>/repodesk/config.toml`.

use crate::adapters::SqliteStateStore;
use crate::store::{StoreConfig, DEFAULT_COMMIT_PAGE_SIZE};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Overrides `database_path`.
pub const DB_ENV: &str = "REPODESK_DB";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub commit_page_size: Option<usize>,
    pub database_path: Option<PathBuf>,
    pub log_filter: Option<String>,
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };

        if let Ok(value) = std::env::var(DB_ENV) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                config.database_path = Some(PathBuf::from(trimmed));
            }
        }

        Ok(config)
    }

    /// A missing file yields the defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        if config.commit_page_size == Some(0) {
            bail!("commit_page_size must be at least 1");
        }
        Ok(config)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            commit_page_size: self.commit_page_size.unwrap_or(DEFAULT_COMMIT_PAGE_SIZE),
            ..StoreConfig::default()
        }
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => SqliteStateStore::default_path(),
        }
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("repodesk").join("config.toml"))
}
