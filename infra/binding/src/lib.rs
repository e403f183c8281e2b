//! # Bindings
//!
//! Declarative wiring of whole objects into a [`tidings_bus::ConcurrentBus`].
//!
//! A type describes its bus participation once, by implementing [`Bindings`] (usually through
//! the `#[bindings]` attribute macro): which methods subscribe to which events, in which order,
//! which [`PublisherSlot`](tidings_bus::PublisherSlot)s it emits on, and which embedded bases it
//! inherits declarations from. The [`BindingCache`] resolves that description into a
//! [`TypeBinding`] exactly once per type, and the [`Registrar`] applies or reverts it for
//! individual instances.
//!
//! ## Resolution rules
//!
//! * Declarations are collected from the registered type and, through `extend`, from its bases.
//! * A subscriber member declared both by a type and by one of its bases is bound only once, to
//!   the declaration closest to the registered type. The override must handle the same event.
//! * The same member declared twice by one type, or by two bases at the same distance, is a
//!   [`BindingError::DuplicateMember`].
//! * Subscribers hold their instance weakly; the bus never keeps a registered object alive.

mod binding;
mod cache;
mod error;
mod registrar;

pub use binding::{BindingBuilder, Bindings, PublisherBinding, SubscriberBinding, TypeBinding};
pub use cache::BindingCache;
pub use error::{BindingError, BindingErrorExt};
pub use registrar::{Detached, Registrar};
