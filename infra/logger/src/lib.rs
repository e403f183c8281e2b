//! # Logger
//!
//! Installs the global `tracing` subscriber for applications built on the event bus.
//!
//! Console output, rolling log files and environment-based filtering are configured through a
//! typestate [`LoggerBuilder`]: a name is mandatory, and file-only options (rotation, retention,
//! JSON) become available once a log directory has been set.
//!
//! The bus and binding crates log subscriptions, dispatches and registrations under their own
//! targets (see [`BUS_TARGETS`]). [`LoggerBuilder::bus_level`] raises or lowers just those
//! targets without touching the rest of the application's filter.
//!
//! ## Example
//!
//! ```rust
//! use tidings_logger::{LevelFilter, Logger};
//!
//! let _logger = Logger::builder()
//!     .name("orders")
//!     .level(LevelFilter::INFO)
//!     .bus_level(LevelFilter::TRACE)
//!     .init()
//!     .unwrap();
//! ```

mod error;

pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;
pub use tracing_appender::rolling::Rotation;

use private::Sealed;
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_MAX_FILES: usize = 10;
const LOG_FILE_SUFFIX: &str = "log";

/// Tracing targets of the event bus crates.
pub const BUS_TARGETS: [&str; 2] = ["tidings_bus", "tidings_binding"];

#[derive(Debug)]
struct LoggerConfig {
    console: bool,
    path: Option<PathBuf>,
    level: LevelFilter,
    bus_level: Option<LevelFilter>,
    rotation: Rotation,
    max_files: usize,
    json: bool,
    env_filter: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            console: true,
            path: None,
            level: LevelFilter::INFO,
            bus_level: None,
            rotation: Rotation::DAILY,
            max_files: DEFAULT_MAX_FILES,
            json: false,
            env_filter: None,
        }
    }
}

impl LoggerConfig {
    /// Explicit filter directives: the bus targets first, then the caller's own filter so it
    /// can still override them.
    fn directives(&self) -> Option<String> {
        let bus = self.bus_level.map(|level| {
            BUS_TARGETS.iter().map(|target| format!("{target}={level}")).collect::<Vec<_>>()
        });

        let directives: Vec<String> = bus
            .into_iter()
            .flatten()
            .chain(self.env_filter.iter().filter(|f| !f.trim().is_empty()).cloned())
            .collect();

        (!directives.is_empty()).then(|| directives.join(","))
    }
}

#[derive(Debug)]
pub struct NoName;
#[derive(Debug)]
pub struct WithName(String);
#[derive(Debug)]
pub struct NoFile;
#[derive(Debug)]
pub struct WithFile;

mod private {
    pub trait Sealed {}
}
impl Sealed for NoName {}
impl Sealed for WithName {}
impl Sealed for NoFile {}
impl Sealed for WithFile {}

/// Configures and installs the global tracing subscriber.
#[derive(Debug)]
pub struct LoggerBuilder<N: Sealed = NoName, F: Sealed = NoFile> {
    config: LoggerConfig,
    name: N,
    output: PhantomData<F>,
}

impl<F: Sealed> LoggerBuilder<NoName, F> {
    /// Names the application; the name prefixes rolling log files.
    pub fn name(self, name: impl Into<String>) -> LoggerBuilder<WithName, F> {
        LoggerBuilder { config: self.config, name: WithName(name.into()), output: PhantomData }
    }
}

impl LoggerBuilder<WithName, WithFile> {
    /// Number of rotated files kept on disk.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn max_files(mut self, max: usize) -> Self {
        self.config.max_files = max;
        self
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn rotation(mut self, rotation: Rotation) -> Self {
        self.config.rotation = rotation;
        self
    }

    /// Writes file records as JSON lines.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn json(mut self, enabled: bool) -> Self {
        self.config.json = enabled;
        self
    }
}

impl<F: Sealed> LoggerBuilder<WithName, F> {
    /// Minimum level for every target without a more specific directive.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.config.level = level;
        self
    }

    /// Level applied to the event bus targets only (see [`BUS_TARGETS`]).
    ///
    /// `TRACE` shows every subscribe, unsubscribe and dispatch; `DEBUG` shows type resolution
    /// and registrations.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn bus_level(mut self, level: LevelFilter) -> Self {
        self.config.bus_level = Some(level);
        self
    }

    /// Adds explicit filter directives (e.g. `orders=debug,hyper=info`).
    ///
    /// Without explicit directives the filter is read from `RUST_LOG`. Invalid directives make
    /// [`LoggerBuilder::init`] fail.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn env_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.env_filter = Some(filter.into());
        self
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.config.console = enabled;
        self
    }

    /// Directory for rolling log files; created if missing.
    pub fn path(self, path: impl Into<PathBuf>) -> LoggerBuilder<WithName, WithFile> {
        let mut config = self.config;
        config.path = Some(path.into());
        LoggerBuilder { config, name: self.name, output: PhantomData }
    }

    /// Consumes the builder and installs the global tracing subscriber.
    ///
    /// The returned [`Logger`] owns the background writer of the file output; keep it alive
    /// until shutdown so buffered records are flushed.
    ///
    /// # Errors
    /// Returns [`LoggerError::InvalidConfiguration`] for invalid settings,
    /// [`LoggerError::Io`] or [`LoggerError::Appender`] when the log directory is unusable, and
    /// [`LoggerError::Subscriber`] if a global subscriber has already been set.
    pub fn init(self) -> Result<Logger, LoggerError> {
        let Self { config, name: WithName(name), .. } = self;
        validate_config(&config, &name)?;
        let env_filter = build_env_filter(&config)?;

        let mut layers = Vec::new();
        if config.console {
            layers.push(layer().compact().with_ansi(true).boxed());
        }

        let guard = if let Some(path) = &config.path {
            fs::create_dir_all(path)
                .context(format!("Failed to create log directory {}", path.display()))?;

            let appender = RollingFileAppender::builder()
                .rotation(config.rotation.clone())
                .filename_prefix(&name)
                .filename_suffix(LOG_FILE_SUFFIX)
                .max_log_files(config.max_files)
                .build(path)
                .context(name.clone())?;

            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = layer().with_writer(writer).with_ansi(false);
            layers.push(if config.json { file_layer.json().boxed() } else { file_layer.boxed() });
            Some(guard)
        } else {
            None
        };

        if layers.is_empty() {
            return Err(LoggerError::InvalidConfiguration {
                message: "No output enabled; enable the console or set a log directory".into(),
                context: Some(name.into()),
            });
        }

        tracing_subscriber::registry().with(env_filter).with(layers).try_init()?;
        tracing::debug!(logger = %name, file = guard.is_some(), "Logger initialized");

        Ok(Logger { name, guard })
    }
}

/// Handle to the installed logging system.
///
/// Dropping it stops the background file writer after flushing pending records.
#[must_use = "Dropping this handle will stop background logging threads."]
#[derive(Debug)]
pub struct Logger {
    name: String,
    guard: Option<WorkerGuard>,
}

impl Logger {
    /// Starts configuring the global tracing subscriber.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tidings_logger::{LevelFilter, Logger};
    ///
    /// let logger = Logger::builder().name("billing").level(LevelFilter::DEBUG).init().unwrap();
    /// assert_eq!(logger.name(), "billing");
    /// ```
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder { config: LoggerConfig::default(), name: NoName, output: PhantomData }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file writer guard, present when a log directory was configured.
    #[must_use]
    pub const fn guard(&self) -> Option<&WorkerGuard> {
        self.guard.as_ref()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!(logger = %self.name, "Logging system shutting down, flushing buffers...");
        }
    }
}

fn validate_config(config: &LoggerConfig, name: &str) -> Result<(), LoggerError> {
    if name.trim().is_empty() {
        return Err(LoggerError::InvalidConfiguration {
            message: "Logger name cannot be empty".into(),
            context: None,
        });
    }

    if config.max_files == 0 {
        return Err(LoggerError::InvalidConfiguration {
            message: "max_files must be greater than zero".into(),
            context: Some(name.to_owned().into()),
        });
    }

    Ok(())
}

fn build_env_filter(config: &LoggerConfig) -> Result<EnvFilter, LoggerError> {
    let builder = EnvFilter::builder().with_default_directive(config.level.into());
    config.directives().map_or_else(
        || Ok(builder.from_env_lossy()),
        |directives| {
            builder.parse(&directives).map_err(|e| LoggerError::InvalidConfiguration {
                message: format!("Invalid filter '{directives}': {e}").into(),
                context: None,
            })
        },
    )
}
