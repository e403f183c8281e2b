use crate::binding::{Bindings, TypeBinding};
use crate::cache::BindingCache;
use crate::error::{BindingError, BindingErrorExt};
use std::any::type_name;
use std::sync::Arc;
use tidings_bus::{Bus, ConcurrentBus};
use tracing::{debug, warn};

/// What an `unregister` call removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Detached {
    /// Subscriber members that had at least one bus subscription removed.
    pub subscriptions: usize,
    /// Forwarding handlers detached from publisher slots.
    pub handlers: usize,
}

/// Wires whole objects into a [`ConcurrentBus`] according to their [`Bindings`].
///
/// A registration is applied under a single writer lock: a concurrent publish observes either
/// none or all of an instance's subscriptions. Registering the same instance twice subscribes
/// it twice; a failed registration retracts only the subscriptions it added itself.
#[derive(Debug, Clone)]
pub struct Registrar {
    bus: ConcurrentBus,
    cache: BindingCache,
}

impl Registrar {
    /// A registrar backed by the process-wide [`BindingCache`].
    #[must_use]
    pub fn new(bus: ConcurrentBus) -> Self {
        Self::with_cache(bus, BindingCache::global().clone())
    }

    #[must_use]
    pub const fn with_cache(bus: ConcurrentBus, cache: BindingCache) -> Self {
        Self { bus, cache }
    }

    #[must_use]
    pub const fn bus(&self) -> &ConcurrentBus {
        &self.bus
    }

    #[must_use]
    pub const fn cache(&self) -> &BindingCache {
        &self.cache
    }

    /// Subscribes every subscriber method of `instance` and attaches every publisher slot.
    ///
    /// # Errors
    /// Returns the discovery error of `R` (nothing is applied), or [`BindingError::Bus`] if the
    /// bus rejects a subscription (everything applied so far is rolled back).
    pub async fn register<R: Bindings>(&self, instance: &Arc<R>) -> Result<(), BindingError> {
        let binding = self.cache.resolve::<R>()?;
        let mut bus = self.bus.write().await;
        self.apply(&binding, &mut bus, instance)
    }

    /// Blocking counterpart of [`register`](Self::register) for synchronous code.
    ///
    /// # Errors
    /// Same as [`register`](Self::register).
    ///
    /// # Panics
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_register<R: Bindings>(&self, instance: &Arc<R>) -> Result<(), BindingError> {
        let binding = self.cache.resolve::<R>()?;
        let mut bus = self.bus.blocking_write();
        self.apply(&binding, &mut bus, instance)
    }

    /// Removes the subscriptions and slot handlers `register` created for `instance`.
    ///
    /// Unregistering an instance that was never registered removes nothing.
    ///
    /// # Errors
    /// Returns the discovery error of `R`, or [`BindingError::Bus`] on a corrupted bus registry.
    pub async fn unregister<R: Bindings>(&self, instance: &Arc<R>) -> Result<Detached, BindingError> {
        let binding = self.cache.resolve::<R>()?;
        let mut bus = self.bus.write().await;
        self.revert(&binding, &mut bus, instance)
    }

    /// Blocking counterpart of [`unregister`](Self::unregister) for synchronous code.
    ///
    /// # Errors
    /// Same as [`unregister`](Self::unregister).
    ///
    /// # Panics
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_unregister<R: Bindings>(
        &self,
        instance: &Arc<R>,
    ) -> Result<Detached, BindingError> {
        let binding = self.cache.resolve::<R>()?;
        let mut bus = self.bus.blocking_write();
        self.revert(&binding, &mut bus, instance)
    }

    fn apply<R: Bindings>(
        &self,
        binding: &TypeBinding<R>,
        bus: &mut Bus,
        instance: &Arc<R>,
    ) -> Result<(), BindingError> {
        for (applied, subscriber) in binding.subscribers().iter().enumerate() {
            if let Err(err) = subscriber.subscribe(bus, instance) {
                warn!(
                    r#type = type_name::<R>(),
                    member = subscriber.member(),
                    "Registration rolled back"
                );
                for done in &binding.subscribers()[..applied] {
                    if let Err(rollback) = done.retract(bus, instance) {
                        warn!(
                            r#type = type_name::<R>(),
                            member = done.member(),
                            error = %rollback,
                            "Rollback could not retract subscription"
                        );
                    }
                }
                return Err(err).context(subscriber.member());
            }
        }

        for publisher in binding.publishers() {
            publisher.attach(&self.bus, instance);
        }

        debug!(
            r#type = type_name::<R>(),
            subscribers = binding.subscribers().len(),
            publishers = binding.publishers().len(),
            "Instance registered"
        );
        Ok(())
    }

    fn revert<R: Bindings>(
        &self,
        binding: &TypeBinding<R>,
        bus: &mut Bus,
        instance: &Arc<R>,
    ) -> Result<Detached, BindingError> {
        let mut detached = Detached::default();

        for subscriber in binding.subscribers() {
            if subscriber.unsubscribe(bus, instance).context(subscriber.member())? {
                detached.subscriptions += 1;
            }
        }

        for publisher in binding.publishers() {
            if publisher.detach(&self.bus, instance) {
                detached.handlers += 1;
            }
        }

        debug!(
            r#type = type_name::<R>(),
            subscriptions = detached.subscriptions,
            handlers = detached.handlers,
            "Instance unregistered"
        );
        Ok(detached)
    }
}
