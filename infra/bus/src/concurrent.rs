use crate::bus::{Bus, Event};
use crate::callback::{Callback, FunctionId, HandlerError};
use crate::error::EventBusError;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A cloneable, thread-safe handle to a shared [`Bus`].
///
/// Mutations take the writer side of a single async-aware lock, so they never overlap each other
/// or the initiation phase of a publish. Publishes share the reader side: subscribers are started
/// under the lock and their completions are awaited after it has been released, so a subscriber
/// may itself publish or mutate the bus without deadlocking.
///
/// The `blocking_*` methods are for synchronous code only; they panic when called from within an
/// asynchronous execution context.
#[derive(Clone, Default)]
pub struct ConcurrentBus {
    inner: Arc<RwLock<Bus>>,
}

impl ConcurrentBus {
    /// Creates a new, empty `ConcurrentBus`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] on a corrupted type registry.
    pub async fn subscribe<E: Event>(&self, callback: Callback<E>) -> Result<(), EventBusError> {
        self.inner.write().await.subscribe(callback)
    }

    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] on a corrupted type registry.
    pub async fn subscribe_with_order<E: Event>(
        &self,
        callback: Callback<E>,
        order: i32,
    ) -> Result<(), EventBusError> {
        self.inner.write().await.subscribe_with_order(callback, order)
    }

    /// Removes every subscription equal to `callback`; `true` if any was removed.
    ///
    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] on a corrupted type registry.
    pub async fn unsubscribe<E: Event>(&self, callback: &Callback<E>) -> Result<bool, EventBusError> {
        self.inner.write().await.unsubscribe(callback)
    }

    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] on a corrupted type registry.
    pub fn blocking_subscribe<E: Event>(&self, callback: Callback<E>) -> Result<(), EventBusError> {
        self.inner.blocking_write().subscribe(callback)
    }

    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] on a corrupted type registry.
    pub fn blocking_subscribe_with_order<E: Event>(
        &self,
        callback: Callback<E>,
        order: i32,
    ) -> Result<(), EventBusError> {
        self.inner.blocking_write().subscribe_with_order(callback, order)
    }

    /// # Errors
    /// Returns [`EventBusError::TypeMismatch`] on a corrupted type registry.
    pub fn blocking_unsubscribe<E: Event>(
        &self,
        callback: &Callback<E>,
    ) -> Result<bool, EventBusError> {
        self.inner.blocking_write().unsubscribe(callback)
    }

    /// Exclusive access for a batch of mutations applied atomically.
    pub async fn write(&self) -> RwLockWriteGuard<'_, Bus> {
        self.inner.write().await
    }

    /// Exclusive access from synchronous code.
    #[must_use]
    pub fn blocking_write(&self) -> RwLockWriteGuard<'_, Bus> {
        self.inner.blocking_write()
    }

    /// Shared access, e.g. for introspection.
    pub async fn read(&self) -> RwLockReadGuard<'_, Bus> {
        self.inner.read().await
    }

    /// Publishes `event` and waits for every subscriber to complete.
    ///
    /// # Errors
    /// Returns [`EventBusError::Dispatch`] carrying every subscriber failure, in subscriber order.
    ///
    /// # Examples
    /// ```rust
    /// use futures::future;
    /// use std::sync::Arc;
    /// use tidings_bus::{Callback, ConcurrentBus};
    ///
    /// #[derive(Debug)]
    /// struct UserCreated(u64);
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), tidings_bus::EventBusError> {
    /// let bus = ConcurrentBus::new();
    /// bus.subscribe(Callback::from_closure(|event: Arc<UserCreated>| {
    ///     assert_eq!(event.0, 42);
    ///     Box::pin(future::ready(Ok(())))
    /// }))
    /// .await?;
    ///
    /// bus.publish(UserCreated(42)).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn publish<E: Event>(&self, event: E) -> Result<(), EventBusError> {
        self.publish_arc(Arc::new(event)).await
    }

    /// Publishes a shared event instance without re-wrapping.
    ///
    /// # Errors
    /// Returns [`EventBusError::Dispatch`] carrying every subscriber failure, in subscriber order.
    pub async fn publish_arc<E: Event>(&self, event: Arc<E>) -> Result<(), EventBusError> {
        let dispatch = {
            let bus = self.inner.read().await;
            bus.publish_arc(event)?
        };
        dispatch.await
    }

    /// A callback that republishes whatever it receives on this bus.
    ///
    /// Every forwarder of the same bus compares equal, so it can be detached with a freshly built
    /// handle. The bus is held weakly.
    #[must_use]
    pub fn forwarder<E: Event>(&self) -> Callback<E> {
        Callback::bound(&self.inner, FunctionId::method::<Self>("publish"), |inner, event| {
            let bus = Self { inner };
            Box::pin(async move { bus.publish_arc(event).await.map_err(HandlerError::from) })
        })
    }

    /// `true` when both handles share the same underlying bus.
    #[must_use]
    pub fn same_bus(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ConcurrentBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentBus").field("handles", &Arc::strong_count(&self.inner)).finish()
    }
}
