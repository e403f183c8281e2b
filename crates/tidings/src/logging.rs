use crate::config::LoggerSettings;
use crate::error::{TidingsError, TidingsErrorExt};
use std::str::FromStr;
use tidings_logger::{LevelFilter, Logger, Rotation};

/// Installs the global tracing subscriber described by `settings`.
///
/// # Errors
/// Returns [`TidingsError::InvalidSetting`] for unknown level or rotation names and
/// [`TidingsError::Logger`] when the subscriber cannot be installed.
pub fn init_logger(settings: &LoggerSettings) -> Result<Logger, TidingsError> {
    let mut builder = Logger::builder()
        .name(settings.name.as_str())
        .level(parse_level(&settings.level, "logger.level")?)
        .console(settings.console);

    if let Some(level) = &settings.bus_level {
        builder = builder.bus_level(parse_level(level, "logger.bus_level")?);
    }
    if let Some(filter) = &settings.env_filter {
        builder = builder.env_filter(filter.as_str());
    }

    let logger = match &settings.path {
        Some(path) => builder
            .path(path)
            .rotation(parse_rotation(&settings.rotation)?)
            .max_files(settings.max_files)
            .json(settings.json)
            .init(),
        None => builder.init(),
    };

    logger.context(settings.name.clone())
}

fn parse_level(value: &str, key: &'static str) -> Result<LevelFilter, TidingsError> {
    LevelFilter::from_str(value.trim()).map_err(|_| TidingsError::InvalidSetting {
        message: format!("unknown level '{value}'").into(),
        context: Some(key.into()),
    })
}

fn parse_rotation(value: &str) -> Result<Rotation, TidingsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "minutely" => Ok(Rotation::MINUTELY),
        "hourly" => Ok(Rotation::HOURLY),
        "daily" => Ok(Rotation::DAILY),
        "never" => Ok(Rotation::NEVER),
        _ => Err(TidingsError::InvalidSetting {
            message: format!("unknown rotation '{value}'").into(),
            context: Some("logger.rotation".into()),
        }),
    }
}
