//! # Tidings
//!
//! Typed in-process publish/subscribe with declarative bindings.
//!
//! This facade composes the workspace crates; it implements no dispatch logic of its own.
//!
//! * **Bus** - [`ConcurrentBus`] delivers events to ordered subscribers keyed by event type.
//! * **Bindings** - [`macro@bindings`] marks subscriber methods and publisher slots on a type;
//!   a [`Registrar`] wires whole objects into a bus and removes them again.
//! * **Ambient** - [`config::load_config`] and [`init_logger`] bootstrap settings and tracing.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tidings::{ConcurrentBus, PublisherSlot, Registrar, bindings};
//!
//! #[derive(Debug)]
//! struct OrderPlaced(u64);
//!
//! #[derive(Default)]
//! struct Shop {
//!     placed: PublisherSlot<OrderPlaced>,
//! }
//!
//! #[bindings(publisher = placed)]
//! impl Shop {}
//!
//! #[derive(Default)]
//! struct Billing {
//!     invoiced: parking_lot::Mutex<Vec<u64>>,
//! }
//!
//! #[bindings]
//! impl Billing {
//!     #[subscriber(order = 1)]
//!     async fn on_order(&self, event: Arc<OrderPlaced>) {
//!         self.invoiced.lock().push(event.0);
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registrar = Registrar::new(ConcurrentBus::new());
//! let shop = Arc::new(Shop::default());
//! let billing = Arc::new(Billing::default());
//! registrar.register(&shop).await?;
//! registrar.register(&billing).await?;
//!
//! shop.placed.emit(OrderPlaced(7)).await?;
//! assert_eq!(*billing.invoiced.lock(), vec![7]);
//! # Ok(())
//! # }
//! ```

extern crate self as tidings;

pub mod config;
mod error;
mod logging;

pub use crate::error::{TidingsError, TidingsErrorExt};
pub use crate::logging::init_logger;

pub use tidings_binding::{
    BindingBuilder, BindingCache, BindingError, BindingErrorExt, Bindings, Detached,
    PublisherBinding, Registrar, SubscriberBinding, TypeBinding,
};
pub use tidings_bus::{
    Bus, Callback, CallbackKey, Completion, ConcurrentBus, DEFAULT_ORDER, Dispatch,
    DispatchFailure, Event, EventBusError, EventBusErrorExt, FunctionId, HandlerError,
    HandlerOutput, HandlerResult, PublisherSlot, SubscriberEntry, SubscriptionTable,
};
pub use tidings_derive::{bindings, tidings_error};

/// Logger construction, re-exported for applications that configure tracing in code.
pub mod logger {
    pub use tidings_logger::{
        BUS_TARGETS, LevelFilter, Logger, LoggerBuilder, LoggerError, LoggerErrorExt, NoFile,
        NoName, Rotation, WithFile, WithName,
    };
}
