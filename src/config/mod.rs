use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::tickets::TICKETS_TABLE;

pub const DEFAULT_CONFIG_PATH: &str = "claimdesk.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(Box<figment::Error>),
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Load(Box::new(e))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgrest,
    Memory,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub api_key: String,
    pub table: String,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: String::new(),
            api_key: String::new(),
            table: TICKETS_TABLE.to_string(),
            timeout_secs: 30,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Loads from the file named by `CLAIMDESK_CONFIG` (or `claimdesk.toml`),
    /// then the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path =
            std::env::var("CLAIMDESK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: AppConfig = Self::figment(path).extract()?;
        config.validated()
    }

    /// Defaults, then TOML, then `CLAIMDESK_*` (nested with `__`), then the
    /// `SUPABASE_URL`/`SUPABASE_KEY` pair.
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("CLAIMDESK_").split("__"))
            .merge(
                Env::raw()
                    .only(&["SUPABASE_URL", "SUPABASE_KEY"])
                    .map(|key| {
                        if key.as_str().eq_ignore_ascii_case("SUPABASE_URL") {
                            "store.url".into()
                        } else {
                            "store.api_key".into()
                        }
                    }),
            )
    }

    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.store.backend == StoreBackend::Postgrest {
            if self.store.url.trim().is_empty() {
                return Err(ConfigError::Missing("store.url"));
            }
            if self.store.api_key.trim().is_empty() {
                return Err(ConfigError::Missing("store.api_key"));
            }
        }
        if self.store.table.trim().is_empty() {
            return Err(ConfigError::Missing("store.table"));
        }
        Ok(self)
    }
}
