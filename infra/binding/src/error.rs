use std::borrow::Cow;
use tidings_bus::EventBusError;

/// Errors raised while discovering or applying the bindings of a type.
#[tidings_derive::tidings_error]
pub enum BindingError {
    /// A member is declared twice by the same type, or by two unrelated bases.
    #[error("Duplicate member{}: {message}", format_context(.context))]
    DuplicateMember { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// An overriding subscriber handles a different event than the member it shadows.
    #[error("Override mismatch{}: {message}", format_context(.context))]
    OverrideMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A cached binding does not belong to the requested type.
    #[error("Type mismatch{}: {message}", format_context(.context))]
    TypeMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Bus error{}: {source}", format_context(.context))]
    Bus { source: EventBusError, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl BindingError {
    /// Rebuilds an owned error from one shared between concurrent resolutions.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            Self::DuplicateMember { message, context } => {
                Self::DuplicateMember { message: message.clone(), context: context.clone() }
            },
            Self::OverrideMismatch { message, context } => {
                Self::OverrideMismatch { message: message.clone(), context: context.clone() }
            },
            Self::TypeMismatch { message, context } => {
                Self::TypeMismatch { message: message.clone(), context: context.clone() }
            },
            Self::Internal { message, context } => {
                Self::Internal { message: message.clone(), context: context.clone() }
            },
            Self::Bus { .. } => Self::Internal {
                message: self.to_string().into(),
                context: Some("Shared bus error".into()),
            },
        }
    }
}
