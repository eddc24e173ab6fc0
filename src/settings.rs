use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Deserialize)]
pub struct Tidy {
    pub data_dir: String,
    pub poll_interval: u64,
    pub notifications: bool,
    pub sound: bool,
    pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Configuration {
    pub tidy: Tidy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't locate the user's config directory")]
    NoConfigDir,
    #[error("can't locate the user's data directory")]
    NoDataDir,
    #[error("can't write default config to {}", path.display())]
    WriteDefault {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

const DEFAULT_CONFIG: &str = r#"
[tidy]
# Directory holding tasks.json and its backup.
# Empty means the platform data directory.
data_dir = ""
# Seconds between checks for overdue tasks.
poll_interval = 60
# Desktop notifications and sound on changes and due tasks.
notifications = true
sound = true
# Log filter, RUST_LOG takes precedence.
log_level = "warn"
"#;

const ENV_PREFIX: &str = "TIDY";

impl Configuration {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("tidy").join("tidy.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Loads `path` (or the default location), writing the commented
    /// defaults there first if the file doesn't exist. `TIDY_TIDY__<KEY>`
    /// environment variables override the file.
    pub fn new(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !config_path.exists() {
            write_default(&config_path)?;
        }

        Self::load(&config_path, environment())
    }

    fn load(config_path: &Path, env: Environment) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(config_path.to_path_buf()).required(true))
            .add_source(env)
            .build()?;

        Ok(settings.try_deserialize::<Configuration>()?)
    }

    /// Where the tasks file lives.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if self.tidy.data_dir.trim().is_empty() {
            dirs::data_dir()
                .map(|dir| dir.join("tidy"))
                .ok_or(ConfigError::NoDataDir)
        } else {
            Ok(PathBuf::from(&self.tidy.data_dir))
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.tidy.poll_interval.max(1))
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn write_default(config_path: &Path) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::WriteDefault {
        path: config_path.to_path_buf(),
        source,
    };
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(config_path, DEFAULT_CONFIG.trim_start()).map_err(write_err)
}
