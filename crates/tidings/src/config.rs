//! Layered settings: a configuration file overlaid with `TIDINGS__` environment variables.

use crate::error::{TidingsError, TidingsErrorExt};
use config::{Config, Environment, File};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "tidings";
const ENV_PREFIX: &str = "TIDINGS";
const ENV_SEPARATOR: &str = "__";

/// Settings consumed by the facade itself.
///
/// Applications usually embed it (`#[serde(flatten)]` or a `tidings` field) in their own
/// settings type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TidingsConfig {
    pub logger: LoggerSettings,
}

/// Serializable counterpart of [`LoggerBuilder`](tidings_logger::LoggerBuilder).
///
/// Levels are level names (`"off"`, `"error"` ... `"trace"`); `rotation` is one of
/// `"minutely"`, `"hourly"`, `"daily"` or `"never"`. File settings apply only when `path` is set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggerSettings {
    pub name: String,
    pub level: String,
    pub bus_level: Option<String>,
    pub env_filter: Option<String>,
    pub console: bool,
    pub path: Option<PathBuf>,
    pub json: bool,
    pub rotation: String,
    pub max_files: usize,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            name: "tidings".into(),
            level: "info".into(),
            bus_level: None,
            env_filter: None,
            console: true,
            path: None,
            json: false,
            rotation: "daily".into(),
            max_files: 10,
        }
    }
}

/// Loads `T` from a configuration file, then applies environment overrides.
///
/// The file format follows its extension (TOML, JSON, YAML ...). Without a path the `tidings`
/// file in the working directory is used. Environment variables prefixed with `TIDINGS__`
/// override file values; nested keys are separated by a double underscore, so
/// `TIDINGS__LOGGER__LEVEL=debug` sets `logger.level`.
///
/// # Errors
/// Returns [`TidingsError::Config`] if the file is missing or unreadable, or if the merged
/// values do not match `T`.
///
/// # Example
/// ```rust,no_run
/// use tidings::config::{TidingsConfig, load_config};
///
/// let settings: TidingsConfig = load_config(Some("config/orders.toml")).unwrap_or_default();
/// ```
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, TidingsError>
where
    T: DeserializeOwned,
{
    layered(path, Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
}

pub(crate) fn layered<T>(
    path: Option<impl AsRef<Path>>,
    environment: Environment,
) -> Result<T, TidingsError>
where
    T: DeserializeOwned,
{
    let effective_path =
        path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), |p| p.as_ref().to_path_buf());

    info!("Loading config from {}", effective_path.display());

    let config = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(true))
        .add_source(environment)
        .build()
        .context(format!("Failed to build config from {}", effective_path.display()))?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}
