//! # Event Bus
//!
//! A typed, in-process publish/subscribe bus with ordered fan-out.
//!
//! ## Overview
//!
//! Subscribers are kept per event type in a [`SubscriptionTable`] sorted by an `i32` order.
//! Publishing starts every subscriber in that order and hands back a [`Dispatch`] that joins
//! their completions. [`ConcurrentBus`] shares one [`Bus`] between tasks behind a single
//! `tokio` read/write lock.
//!
//! ## Features
//!
//! * **Type-Safe**: Events are identified by their Rust type; there is no polymorphic matching.
//! * **Value identity**: [`Callback`] handles compare by receiver and function identity, so a
//!   rebuilt handle unsubscribes the original one.
//! * **Ordered**: Lower orders run first; ties keep subscription order.
//! * **Aggregated failures**: Every failing subscriber is reported through [`DispatchFailure`].
//! * **Publisher slots**: [`PublisherSlot`] is an object-owned emission point that can be wired
//!   into a bus with [`ConcurrentBus::forwarder`].
//!
//! # Example
//!
//! ```rust
//! use futures::future;
//! use std::sync::Arc;
//! use tidings_bus::{Callback, Completion, ConcurrentBus, EventBusError};
//!
//! #[derive(Debug)]
//! struct UserCreated { id: u64 }
//!
//! fn audit(event: Arc<UserCreated>) -> Completion {
//!     Box::pin(future::ready(if event.id == 0 { Err("anonymous user".into()) } else { Ok(()) }))
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), EventBusError> {
//!     let bus = ConcurrentBus::new();
//!     bus.subscribe_with_order(Callback::from_fn(audit), 1).await?;
//!
//!     bus.publish(UserCreated { id: 42 }).await?;
//!     assert!(bus.publish(UserCreated { id: 0 }).await.is_err());
//!     Ok(())
//! }
//! ```

mod bus;
mod callback;
mod concurrent;
mod dispatch;
mod error;
mod slot;
mod table;

pub use bus::{Bus, Event};
pub use callback::{
    Callback, CallbackKey, Completion, FunctionId, HandlerError, HandlerOutput, HandlerResult,
};
pub use concurrent::ConcurrentBus;
pub use dispatch::{Dispatch, DispatchFailure};
pub use error::{EventBusError, EventBusErrorExt};
pub use slot::PublisherSlot;
pub use table::{DEFAULT_ORDER, SubscriberEntry, SubscriptionTable};
