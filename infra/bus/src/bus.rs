use crate::callback::Callback;
use crate::dispatch::Dispatch;
use crate::error::EventBusError;
use crate::table::{DEFAULT_ORDER, SubscriberEntry, SubscriptionTable};
use fxhash::FxHashMap;
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Marker trait for types that can be sent across the [`Bus`].
///
/// Any type that is `Send + Sync + 'static` automatically implements this trait.
pub trait Event: Any + Send + Sync + 'static {}
impl<T: Any + Send + Sync + 'static> Event for T {}

trait ErasedTable: Send + Sync {
    fn len(&self) -> usize;
    fn event_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<E: Event> ErasedTable for SubscriptionTable<E> {
    fn len(&self) -> usize {
        Self::len(self)
    }

    fn event_name(&self) -> &'static str {
        type_name::<E>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The unsynchronized bus core: one ordered [`SubscriptionTable`] per event type.
///
/// Share it across tasks through [`ConcurrentBus`](crate::ConcurrentBus).
#[derive(Default)]
pub struct Bus {
    tables: FxHashMap<TypeId, Box<dyn ErasedTable>>,
}

impl Bus {
    /// Creates a new, empty `Bus`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `callback` with [`DEFAULT_ORDER`].
    ///
    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] if the table stored for `E` has a different type.
    pub fn subscribe<E: Event>(&mut self, callback: Callback<E>) -> Result<(), EventBusError> {
        self.subscribe_with_order(callback, DEFAULT_ORDER)
    }

    /// Subscribes `callback`; lower orders run first, equal orders run in subscription order.
    ///
    /// Subscribing an equal callback twice is allowed and makes it fire twice.
    ///
    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] if the table stored for `E` has a different type.
    ///
    /// # Examples
    /// ```rust
    /// use futures::future;
    /// use std::sync::Arc;
    /// use tidings_bus::{Bus, Callback, Completion};
    ///
    /// struct Tick;
    ///
    /// fn on_tick(_: Arc<Tick>) -> Completion {
    ///     Box::pin(future::ready(Ok(())))
    /// }
    ///
    /// # fn main() -> Result<(), tidings_bus::EventBusError> {
    /// let mut bus = Bus::new();
    /// bus.subscribe_with_order(Callback::from_fn(on_tick), 10)?;
    /// assert_eq!(bus.subscriber_count::<Tick>(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe_with_order<E: Event>(
        &mut self,
        callback: Callback<E>,
        order: i32,
    ) -> Result<(), EventBusError> {
        let table = self.table_mut::<E>()?;
        let key = callback.key();
        table.insert(callback, order);
        trace!(event = type_name::<E>(), ?key, order, subscribers = table.len(), "Subscribed");
        Ok(())
    }

    /// Removes every subscription equal to `callback`.
    ///
    /// Returns `true` if at least one subscription was removed.
    ///
    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] if the table stored for `E` has a different type.
    pub fn unsubscribe<E: Event>(&mut self, callback: &Callback<E>) -> Result<bool, EventBusError> {
        let id = TypeId::of::<E>();
        let Some(table) = self.tables.get_mut(&id) else {
            return Ok(false);
        };

        let table = downcast_mut::<E>(&mut **table)?;
        let removed = table.remove(callback);
        let drained = table.is_empty();
        if drained {
            self.tables.remove(&id);
        }

        trace!(event = type_name::<E>(), key = ?callback.key(), removed, "Unsubscribed");
        Ok(removed > 0)
    }

    /// Removes only the most recent subscription of `callback` made with `order`.
    ///
    /// Earlier duplicates stay subscribed, which lets a caller undo exactly one `subscribe`.
    ///
    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] if the table stored for `E` has a different type.
    pub fn unsubscribe_latest<E: Event>(
        &mut self,
        callback: &Callback<E>,
        order: i32,
    ) -> Result<bool, EventBusError> {
        let id = TypeId::of::<E>();
        let Some(table) = self.tables.get_mut(&id) else {
            return Ok(false);
        };

        let table = downcast_mut::<E>(&mut **table)?;
        let removed = table.remove_latest(callback, order);
        if table.is_empty() {
            self.tables.remove(&id);
        }

        trace!(event = type_name::<E>(), key = ?callback.key(), order, removed, "Subscription retracted");
        Ok(removed)
    }

    /// Publishes `event` to every subscriber of `E`.
    ///
    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] if the table stored for `E` has a different type.
    pub fn publish<E: Event>(&self, event: E) -> Result<Dispatch, EventBusError> {
        self.publish_arc(Arc::new(event))
    }

    /// Publishes a shared event instance without re-wrapping.
    ///
    /// Subscribers are started synchronously in table order before this returns. The returned
    /// [`Dispatch`] joins their completions; it resolves immediately when nobody is subscribed.
    ///
    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] if the table stored for `E` has a different type.
    pub fn publish_arc<E: Event>(&self, event: Arc<E>) -> Result<Dispatch, EventBusError> {
        let Some(entries) = self.snapshot::<E>()? else {
            trace!(event = type_name::<E>(), "Event dropped: no subscribers");
            return Ok(Dispatch::empty(type_name::<E>()));
        };

        let pending =
            entries.iter().map(|entry| entry.callback().invoke(Arc::clone(&event))).collect();
        Ok(Dispatch::new(type_name::<E>(), pending))
    }

    /// Current subscribers of `E`, in dispatch order.
    ///
    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] if the table stored for `E` has a different type.
    pub fn snapshot<E: Event>(
        &self,
    ) -> Result<Option<Arc<[SubscriberEntry<E>]>>, EventBusError> {
        let Some(table) = self.tables.get(&TypeId::of::<E>()) else {
            return Ok(None);
        };

        let name = table.event_name();
        let table = table
            .as_any()
            .downcast_ref::<SubscriptionTable<E>>()
            .ok_or_else(|| type_mismatch::<E>(name))?;
        Ok(Some(table.snapshot()))
    }

    #[must_use]
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.tables.get(&TypeId::of::<E>()).map_or(0, |table| table.len())
    }

    /// Type names of every event that currently has subscribers.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tables.values().map(|table| table.event_name()).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Drops every subscription.
    ///
    /// Returns the number of event types that had subscribers.
    pub fn clear(&mut self) -> usize {
        let count = self.tables.len();
        self.tables.clear();
        trace!(count, "Bus cleared");
        count
    }

    fn table_mut<E: Event>(&mut self) -> Result<&mut SubscriptionTable<E>, EventBusError> {
        let table = self.tables.entry(TypeId::of::<E>()).or_insert_with(|| {
            trace!(event = type_name::<E>(), "Initializing subscription table");
            Box::new(SubscriptionTable::<E>::new())
        });
        downcast_mut::<E>(&mut **table)
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus").field("event_types", &self.event_types()).finish()
    }
}

fn downcast_mut<E: Event>(
    table: &mut dyn ErasedTable,
) -> Result<&mut SubscriptionTable<E>, EventBusError> {
    let name = table.event_name();
    table.as_any_mut().downcast_mut::<SubscriptionTable<E>>().ok_or_else(|| type_mismatch::<E>(name))
}

fn type_mismatch<E: Event>(found: &'static str) -> EventBusError {
    EventBusError::TypeMismatch {
        message: format!("expected table of {}, found {found}", type_name::<E>()).into(),
        context: Some("Unexpected event type".into()),
    }
}
