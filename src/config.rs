use std::fs;
use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use url::Url;
use crate::core::{ConfigError, CoordinatorConfig};
use crate::form::DEFAULT_MIN_TITLE_LEN;
use crate::memory::DEFAULT_CHUNK_SIZE;
use crate::stager::{StagerConfig, MP4_CONTENT_TYPE};

pub const DEFAULT_CONFIG_FILE: &str = "clipdrop.toml";

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub navigate_delay_ms: u64,
    pub max_session_lifetime_secs: Option<u64>,
    pub command_capacity: usize,
    pub event_capacity: usize,
    pub accepted_content_type: String,
    pub min_title_len: usize,
    pub storage_base_url: String,
    pub chunk_size: usize,
    /// Simulated per-chunk transfer time of the in-memory storage
    pub chunk_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            navigate_delay_ms: 1000,
            max_session_lifetime_secs: None,
            command_capacity: 64,
            event_capacity: 256,
            accepted_content_type: MP4_CONTENT_TYPE.to_string(),
            min_title_len: DEFAULT_MIN_TITLE_LEN,
            storage_base_url: "http://localhost:9199/".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay_ms: 0,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let config_str = fs::read_to_string(path)?;
        Self::from_toml_str(&config_str)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Config::default());
        }

        Self::load(path)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "chunk_size",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_capacity",
                message: "must be greater than zero".to_string(),
            });
        }
        self.storage_base_url()?;

        Ok(())
    }

    pub fn storage_base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.storage_base_url).map_err(|err| ConfigError::Invalid {
            field: "storage_base_url",
            message: err.to_string(),
        })
    }

    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            navigate_delay: Duration::from_millis(self.navigate_delay_ms),
            max_session_lifetime: self.max_session_lifetime_secs.map(Duration::from_secs),
            command_capacity: self.command_capacity,
            event_capacity: self.event_capacity,
        }
    }

    pub fn stager(&self) -> StagerConfig {
        StagerConfig {
            accepted_content_type: self.accepted_content_type.clone(),
        }
    }
}
