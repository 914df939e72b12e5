use crate::models::Config;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::Write;
use thiserror::Error;

/// File name of the persisted preferences inside the config directory
pub const CONFIG_FILE_NAME: &str = "DocForge Config.yaml";

/// Reasons a config file could not be loaded.
///
/// Never returned to callers of [`ConfigStore::load`]; they are logged and the
/// defaults are used instead.
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Config file not found: {0}")]
    NotFound(Utf8PathBuf),

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
}

/// Errors from [`ConfigStore::save`]
#[derive(Error, Debug)]
pub enum ConfigSaveError {
    #[error("Failed to serialize config to YAML: {0}")]
    Serialize(#[from] serde_yaml_ng::Error),

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Loads and saves [`Config`] as YAML.
///
/// Saving goes through a temporary file in the same directory that is renamed
/// over the target, so a crash mid-write never leaves a truncated config.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigStore {
    /// Create a store rooted at `config_dir`, creating the directory if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// Load the config, falling back to defaults when the file is missing or unusable.
    pub fn load(&self) -> Config {
        match self.try_load() {
            Ok(config) => {
                tracing::info!("Loaded config from {}", self.config_path);
                config
            }
            Err(ConfigLoadError::NotFound(path)) => {
                tracing::info!("Config file not found at {}, using defaults", path);
                Config::default()
            }
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Config::default()
            }
        }
    }

    /// Load the config, reporting why it could not be used.
    pub fn try_load(&self) -> Result<Config, ConfigLoadError> {
        if !self.config_path.exists() {
            return Err(ConfigLoadError::NotFound(self.config_path.clone()));
        }

        let contents = fs::read_to_string(&self.config_path).map_err(|source| {
            ConfigLoadError::Read {
                path: self.config_path.clone(),
                source,
            }
        })?;

        // An empty file deserializes to YAML null, which serde(default) does not cover
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }

        serde_yaml_ng::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
            path: self.config_path.clone(),
            source,
        })
    }

    /// Persist the config.
    pub fn save(&self, config: &Config) -> Result<(), ConfigSaveError> {
        let yaml_string = serde_yaml_ng::to_string(config)?;

        let write_err = |source| ConfigSaveError::Write {
            path: self.config_path.clone(),
            source,
        };

        let mut temp = tempfile::Builder::new()
            .prefix(".docforge-config")
            .suffix(".yaml")
            .tempfile_in(&self.config_dir)
            .map_err(write_err)?;
        temp.write_all(yaml_string.as_bytes()).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(&self.config_path)
            .map_err(|e| write_err(e.error))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
