use crate::dispatch::DispatchFailure;
use std::borrow::Cow;

/// Errors that can occur during event bus operations.
#[tidings_derive::tidings_error]
pub enum EventBusError {
    /// Occurs when an internal dynamic cast fails.
    /// This usually indicates an invariant violation in the type registry.
    #[error("Type mismatch{}: {message}", format_context(.context))]
    TypeMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// One or more subscribers failed while handling a published event.
    #[error("Dispatch failed{}: {source}", format_context(.context))]
    Dispatch { source: DispatchFailure, context: Option<Cow<'static, str>> },
}

impl EventBusError {
    /// The aggregated subscriber failures, if this error came from a dispatch.
    #[must_use]
    pub const fn dispatch_failure(&self) -> Option<&DispatchFailure> {
        match self {
            Self::Dispatch { source, .. } => Some(source),
            Self::TypeMismatch { .. } => None,
        }
    }
}
