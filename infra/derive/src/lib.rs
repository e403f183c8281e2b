#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros for the event bus workspace.
//!
//! * [`macro@bindings`] turns an inherent `impl` block into a compile-time binding table:
//!   tagged subscriber methods and publisher slots are listed once per type and wired into a bus
//!   by the registrar, without any runtime introspection.
//! * [`macro@tidings_error`] turns a plain enum into a context-aware domain error.
//!
//! Generated binding code refers to the facade crate (`::tidings`) by default. Crates that only
//! depend on the infrastructure crates can redirect it with `crate = "path"`.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemImpl, parse_macro_input};

/// Declares which members of a type participate in the event bus.
///
/// The attribute is placed on an inherent `impl` block. Inside the block, methods tagged with
/// `#[subscriber]` become subscriptions; block arguments declare publisher slots and base types.
///
/// # Block arguments
///
/// * `publisher = field` - a field of type `PublisherSlot<E>`; emitting on it publishes `E`.
/// * `extends(field: Base)` - a field of type `Arc<Base>` whose bindings are inherited.
///   A subscriber declared here with the same name as an inherited one overrides it.
/// * `crate = "path"` - path of the crate exporting the binding API (default `::tidings`).
///
/// # Subscriber methods
///
/// * `#[subscriber]` - default order (runs after every explicitly ordered subscriber).
/// * `#[subscriber(order = 3)]` or `#[subscriber(3)]` - lower runs earlier.
///
/// A subscriber takes `&self` and exactly one `Arc<Event>` parameter. It may be `async` and may
/// return `()` or `Result<(), E>`.
///
/// # Errors
/// Emits a compile-time error for trait impls, for subscribers with a parameter count other than
/// one, for non-`&self` receivers, for generic subscribers and for malformed arguments.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tidings::{PublisherSlot, bindings};
///
/// struct Audit {
///     recorded: PublisherSlot<Recorded>,
/// }
///
/// #[bindings(publisher = recorded)]
/// impl Audit {
///     #[subscriber(order = 10)]
///     async fn on_login(&self, event: Arc<UserLoggedIn>) -> Result<(), AuditError> {
///         // ...
///         Ok(())
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn bindings(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemImpl);
    macros::bindings::expand_bindings(args.into(), input).into()
}

/// A high-level attribute macro for defining domain-specific error enums.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]` when missing.
/// * **Context Support**: Generates a companion `<Name>Ext` trait that adds `.context(...)`
///   to `Result<T, Name>` and to results of every wrapped source error.
/// * **Standard Conversions**: Implements `From<Source>` for variants with a `source` field,
///   enabling the `?` operator for upstream errors.
/// * **Internal Fallback**: Implements `From<&'static str>` and `From<String>` when an
///   `Internal { message, context }` variant exists.
///
/// # Requirements
///
/// Variants must use named fields. Variants with a `source` field must also carry
/// `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use std::borrow::Cow;
///
/// #[tidings_derive::tidings_error]
/// pub enum StoreError {
///     #[error("IO error{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
/// ```
#[proc_macro_attribute]
pub fn tidings_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_error(input).into()
}
