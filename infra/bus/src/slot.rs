use crate::bus::Event;
use crate::callback::Callback;
use crate::dispatch::Dispatch;
use parking_lot::RwLock;
use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A multicast emission point owned by a publishing object.
///
/// Handlers run in the order they were added. Emitting with no handlers attached is a no-op.
pub struct PublisherSlot<E> {
    handlers: RwLock<Vec<Callback<E>>>,
}

impl<E: Event> PublisherSlot<E> {
    #[must_use]
    pub fn new() -> Self {
        Self { handlers: RwLock::new(Vec::new()) }
    }

    pub fn add_handler(&self, handler: Callback<E>) {
        let mut handlers = self.handlers.write();
        handlers.push(handler);
        trace!(event = type_name::<E>(), handlers = handlers.len(), "Slot handler attached");
    }

    /// Removes the most recently added handler equal to `handler`.
    pub fn remove_handler(&self, handler: &Callback<E>) -> bool {
        let mut handlers = self.handlers.write();
        let Some(index) = handlers.iter().rposition(|attached| attached == handler) else {
            return false;
        };
        handlers.remove(index);
        trace!(event = type_name::<E>(), handlers = handlers.len(), "Slot handler detached");
        true
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Invokes every attached handler with `event`.
    pub fn emit(&self, event: E) -> Dispatch {
        self.emit_arc(Arc::new(event))
    }

    /// Invokes every attached handler with a shared event instance.
    ///
    /// The handler list is copied before any handler runs, so handlers may attach or detach
    /// handlers on this slot.
    pub fn emit_arc(&self, event: Arc<E>) -> Dispatch {
        let handlers = self.handlers.read().clone();
        if handlers.is_empty() {
            return Dispatch::empty(type_name::<E>());
        }

        let pending = handlers.iter().map(|handler| handler.invoke(Arc::clone(&event))).collect();
        Dispatch::new(type_name::<E>(), pending)
    }
}

impl<E: Event> Default for PublisherSlot<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for PublisherSlot<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherSlot")
            .field("event", &type_name::<E>())
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future;
    use parking_lot::Mutex;

    struct Saved(&'static str);

    fn tagged(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Callback<Saved> {
        let log = Arc::clone(log);
        Callback::from_closure(move |event: Arc<Saved>| {
            log.lock().push(format!("{tag}:{}", event.0));
            Box::pin(future::ready(Ok(())))
        })
    }

    #[tokio::test]
    async fn emit_without_handlers_is_a_no_op() {
        let slot = PublisherSlot::<Saved>::new();
        let dispatch = slot.emit(Saved("draft"));

        assert!(dispatch.is_empty());
        assert!(dispatch.await.is_ok());
    }

    #[tokio::test]
    async fn handlers_run_in_attach_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let slot = PublisherSlot::new();
        slot.add_handler(tagged(&log, "a"));
        slot.add_handler(tagged(&log, "b"));

        slot.emit(Saved("doc")).await.unwrap();
        assert_eq!(*log.lock(), vec!["a:doc", "b:doc"]);
    }

    #[test]
    fn remove_handler_detaches_one_instance() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = tagged(&log, "a");
        let slot = PublisherSlot::new();
        slot.add_handler(handler.clone());
        slot.add_handler(handler.clone());

        assert!(slot.remove_handler(&handler));
        assert_eq!(slot.handler_count(), 1);
        assert!(slot.remove_handler(&handler));
        assert!(!slot.remove_handler(&handler));
    }
}
