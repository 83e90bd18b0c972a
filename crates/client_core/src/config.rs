use std::{path::Path, time::Duration};

use serde::Deserialize;
use url::Url;

use crate::{error::SettingsError, types::DEFAULT_PAGE_SIZE};

pub const SETTINGS_FILE: &str = "browse.toml";
pub const ENV_PREFIX: &str = "APP";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_url: String,
    pub catalog_path: String,
    pub history_database_url: String,
    pub page_size: usize,
    pub search_top_k: u32,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            catalog_path: "./data/catalog.json".into(),
            history_database_url: "sqlite://./data/history.db".into(),
            page_size: DEFAULT_PAGE_SIZE,
            search_top_k: 10,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// History database as a sqlx SQLite url; blank falls back to the default.
    pub fn history_database_url(&self) -> String {
        match self.history_database_url.trim() {
            "" => Settings::default().history_database_url,
            raw => storage::sqlite_url(raw),
        }
    }

    fn validate(self) -> Result<Self, SettingsError> {
        Url::parse(&self.server_url).map_err(|source| SettingsError::InvalidServerUrl {
            url: self.server_url.clone(),
            source,
        })?;
        if self.page_size == 0 {
            return Err(SettingsError::InvalidPageSize);
        }
        Ok(self)
    }
}

/// Defaults, then `browse.toml` in the working directory when present, then
/// `APP__*` environment variables.
pub fn load_settings() -> Result<Settings, SettingsError> {
    load_settings_from(Path::new(SETTINGS_FILE), ENV_PREFIX)
}

pub fn load_settings_from(path: &Path, env_prefix: &str) -> Result<Settings, SettingsError> {
    let settings: Settings = ::config::Config::builder()
        .add_source(::config::File::from(path).required(false))
        .add_source(
            ::config::Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;
    settings.validate()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
