use crate::core::cache::DEFAULT_STALENESS;
use crate::providers::bsp;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            url: default_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default = "default_base_currency_name")]
    pub base_currency_name: String,
    pub data_path: Option<String>,
}

fn default_url() -> String {
    bsp::DEFAULT_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    bsp::DEFAULT_TIMEOUT.as_secs()
}

fn default_staleness_secs() -> u64 {
    DEFAULT_STALENESS.as_secs()
}

fn default_base_currency() -> String {
    "PGK".to_string()
}

fn default_base_currency_name() -> String {
    "PNG Kina".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            provider: ProviderConfig::default(),
            staleness_secs: default_staleness_secs(),
            base_currency: default_base_currency(),
            base_currency_name: default_base_currency_name(),
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the config at the default path, falling back to defaults when no
    /// file exists there.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("pg", "kina", "kina")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("pg", "kina", "kina")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        // An empty file is a valid config with every default applied.
        if config_str.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
