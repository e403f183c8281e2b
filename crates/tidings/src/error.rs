use std::borrow::Cow;

/// Errors raised while loading settings or bootstrapping an application.
#[tidings_derive::tidings_error]
pub enum TidingsError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },

    #[error("Logger error{}: {source}", format_context(.context))]
    Logger { source: tidings_logger::LoggerError, context: Option<Cow<'static, str>> },

    /// A setting parsed but holds an unsupported value.
    #[error("Invalid setting{}: {message}", format_context(.context))]
    InvalidSetting { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
