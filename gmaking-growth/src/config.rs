//! Configuration for gmaking-growth
//!
//! Resolution priority (highest first):
//! 1. Command-line flags (applied by `main`)
//! 2. `GMAKING_*` environment variables
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! The Horde API key is resolved separately (ENV → TOML → anonymous key) so
//! that conflicting sources can be reported.

use gmaking_common::config::{
    env_parsed, env_value, load_toml_config, resolve_config_path, LoggingConfig,
};
use gmaking_common::time::secs_to_duration;
use gmaking_common::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::services::asset_fetcher::DEFAULT_BASE_ORIGIN;
use crate::services::horde_client::{
    HordeSettings, PollSettings, ANONYMOUS_API_KEY, DEFAULT_MODEL, DEFAULT_STATUS_URL,
    DEFAULT_SUBMIT_URL,
};

pub const CONFIG_FILE_NAME: &str = "growth.toml";
pub const CONFIG_ENV_VAR: &str = "GMAKING_CONFIG";
pub const API_KEY_ENV_VAR: &str = "GMAKING_HORDE_API_KEY";

const DEFAULT_BIND: &str = "127.0.0.1:8000";
const DEFAULT_DATABASE_PATH: &str = "gmaking-growth.db";

/// Upper bound for both polling durations (24h)
pub const MAX_POLL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

/// `[horde]` section. `api_key` is read through [`GrowthConfig::resolve_horde_api_key`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HordeConfig {
    pub api_key: Option<String>,
    pub submit_url: String,
    pub status_url: String,
    pub model: String,
}

impl Default for HordeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            submit_url: DEFAULT_SUBMIT_URL.to_string(),
            status_url: DEFAULT_STATUS_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AssetsConfig {
    /// Origin prepended to image paths that start with `/`
    pub base_origin: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            base_origin: DEFAULT_BASE_ORIGIN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub max_wait_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        let poll = PollSettings::default();
        Self {
            interval_secs: poll.interval.as_secs(),
            max_wait_secs: poll.max_wait.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
        }
    }
}

/// Full service configuration (`growth.toml`)
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GrowthConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub horde: HordeConfig,
    pub assets: AssetsConfig,
    pub polling: PollingConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
}

impl GrowthConfig {
    /// Load file config, apply environment overrides and validate
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR, CONFIG_FILE_NAME);
        let mut config: GrowthConfig = load_toml_config(path.as_deref())?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override file values with `GMAKING_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Some(bind) = env_value("GMAKING_BIND") {
            self.server.bind = bind;
        }
        if let Some(path) = env_value("GMAKING_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(url) = env_value("GMAKING_HORDE_SUBMIT_URL") {
            self.horde.submit_url = url;
        }
        if let Some(url) = env_value("GMAKING_HORDE_STATUS_URL") {
            self.horde.status_url = url;
        }
        if let Some(model) = env_value("GMAKING_HORDE_MODEL") {
            self.horde.model = model;
        }
        if let Some(origin) = env_value("GMAKING_ASSET_BASE_ORIGIN") {
            self.assets.base_origin = origin;
        }
        if let Some(secs) = env_parsed("GMAKING_POLL_INTERVAL_SECS") {
            self.polling.interval_secs = secs;
        }
        if let Some(secs) = env_parsed("GMAKING_POLL_MAX_WAIT_SECS") {
            self.polling.max_wait_secs = secs;
        }
        if let Some(origins) = env_value("GMAKING_CORS_ORIGINS") {
            self.cors.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(level) = env_value("GMAKING_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_secs == 0 {
            return Err(Error::Config("polling.interval_secs must be > 0".to_string()));
        }
        for (name, secs) in [
            ("polling.interval_secs", self.polling.interval_secs),
            ("polling.max_wait_secs", self.polling.max_wait_secs),
        ] {
            if secs > MAX_POLL_SECS {
                return Err(Error::Config(format!(
                    "{} ({}) must be <= {}",
                    name, secs, MAX_POLL_SECS
                )));
            }
        }
        if self.polling.max_wait_secs < self.polling.interval_secs {
            return Err(Error::Config(format!(
                "polling.max_wait_secs ({}) must be >= polling.interval_secs ({})",
                self.polling.max_wait_secs, self.polling.interval_secs
            )));
        }
        for (name, url) in [
            ("horde.submit_url", &self.horde.submit_url),
            ("horde.status_url", &self.horde.status_url),
            ("assets.base_origin", &self.assets.base_origin),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!("{} must be an http(s) URL: {:?}", name, url)));
            }
        }
        if self.horde.model.trim().is_empty() {
            return Err(Error::Config("horde.model must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: secs_to_duration(self.polling.interval_secs),
            max_wait: secs_to_duration(self.polling.max_wait_secs),
        }
    }

    /// Resolve the Horde API key: ENV → TOML → anonymous key
    pub fn resolve_horde_api_key(&self) -> String {
        let env_key = env_value(API_KEY_ENV_VAR);
        let toml_key = self
            .horde
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());

        if env_key.is_some() && toml_key.is_some() {
            warn!(
                "Horde API key found in multiple sources: environment, TOML. Using environment (highest priority)."
            );
        }

        if let Some(key) = env_key {
            info!("Horde API key loaded from environment variable");
            return key;
        }
        if let Some(key) = toml_key {
            info!("Horde API key loaded from TOML config");
            return key.to_string();
        }

        warn!(
            "No Horde API key configured ({} or [horde] api_key); using anonymous key, generation will be slow",
            API_KEY_ENV_VAR
        );
        ANONYMOUS_API_KEY.to_string()
    }

    pub fn horde_settings(&self) -> HordeSettings {
        HordeSettings {
            api_key: self.resolve_horde_api_key(),
            submit_url: self.horde.submit_url.clone(),
            status_url: self.horde.status_url.clone(),
            model: self.horde.model.clone(),
            poll: self.poll_settings(),
        }
    }
}
