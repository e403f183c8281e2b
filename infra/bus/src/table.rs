use crate::bus::Event;
use crate::callback::Callback;
use std::fmt;
use std::sync::Arc;

/// Order assigned to subscribers that do not ask for one; they run after every ordered one.
pub const DEFAULT_ORDER: i32 = i32::MAX;

/// A callback together with its dispatch order.
pub struct SubscriberEntry<E> {
    callback: Callback<E>,
    order: i32,
}

impl<E> SubscriberEntry<E> {
    #[inline]
    #[must_use]
    pub const fn callback(&self) -> &Callback<E> {
        &self.callback
    }

    #[inline]
    #[must_use]
    pub const fn order(&self) -> i32 {
        self.order
    }
}

impl<E> Clone for SubscriberEntry<E> {
    fn clone(&self) -> Self {
        Self { callback: self.callback.clone(), order: self.order }
    }
}

impl<E> fmt::Debug for SubscriberEntry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberEntry")
            .field("key", &self.callback.key())
            .field("order", &self.order)
            .finish()
    }
}

/// Subscribers of one event type, sorted ascending by order.
///
/// Entries with equal order keep their insertion order. The slice is replaced on every
/// mutation, so a [`snapshot`](Self::snapshot) taken before a mutation is never affected by it.
pub struct SubscriptionTable<E> {
    entries: Arc<[SubscriberEntry<E>]>,
}

impl<E: Event> SubscriptionTable<E> {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Arc::from(Vec::new()) }
    }

    /// Inserts after every entry whose order is less than or equal to `order`.
    pub fn insert(&mut self, callback: Callback<E>, order: i32) {
        let at = self.entries.partition_point(|entry| entry.order <= order);

        let mut next = Vec::with_capacity(self.entries.len() + 1);
        next.extend_from_slice(&self.entries[..at]);
        next.push(SubscriberEntry { callback, order });
        next.extend_from_slice(&self.entries[at..]);

        self.entries = next.into();
    }

    /// Removes every entry equal to `callback` and returns how many were removed.
    pub fn remove(&mut self, callback: &Callback<E>) -> usize {
        let before = self.entries.len();
        let kept: Vec<_> =
            self.entries.iter().filter(|entry| entry.callback != *callback).cloned().collect();
        let removed = before - kept.len();

        if removed > 0 {
            self.entries = kept.into();
        }
        removed
    }

    /// Removes the most recently inserted entry equal to `callback` with exactly `order`.
    pub fn remove_latest(&mut self, callback: &Callback<E>, order: i32) -> bool {
        let Some(at) =
            self.entries.iter().rposition(|entry| entry.order == order && entry.callback == *callback)
        else {
            return false;
        };

        let mut next = self.entries.to_vec();
        next.remove(at);
        self.entries = next.into();
        true
    }

    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Arc<[SubscriberEntry<E>]> {
        Arc::clone(&self.entries)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: Event> Default for SubscriptionTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for SubscriptionTable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionTable")
            .field("event", &std::any::type_name::<E>())
            .field("entries", &self.entries)
            .finish()
    }
}
