use crate::bus::Event;
use futures::future::{self, BoxFuture};
use std::any::TypeId;
use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::warn;

/// Error returned by a failing subscriber.
pub type HandlerError = Box<dyn Error + Send + Sync + 'static>;

/// Outcome of a single subscriber invocation.
pub type HandlerResult = Result<(), HandlerError>;

/// The pending completion of one invoked callback.
pub type Completion = BoxFuture<'static, HandlerResult>;

static NEXT_CLOSURE_ID: AtomicU64 = AtomicU64::new(1);

/// Normalizes what a subscriber returns into a [`HandlerResult`].
///
/// Implemented for `()` and for `Result<(), E>` where `E` converts into a [`HandlerError`].
pub trait HandlerOutput {
    fn into_result(self) -> HandlerResult;
}

impl HandlerOutput for () {
    #[inline]
    fn into_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E: Into<HandlerError>> HandlerOutput for Result<(), E> {
    #[inline]
    fn into_result(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}

/// Stable identity of the function half of a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionId {
    /// A plain function, identified by its address.
    Pointer(usize),
    /// A named member of a receiver type.
    Method { owner: TypeId, name: &'static str },
    /// A closure, identified by a process-unique counter.
    Closure(u64),
}

impl FunctionId {
    #[must_use]
    pub fn method<R: 'static>(name: &'static str) -> Self {
        Self::Method { owner: TypeId::of::<R>(), name }
    }
}

/// Structural identity of a callback: optional receiver address plus function identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackKey {
    pub receiver: Option<usize>,
    pub function: FunctionId,
}

/// An invocable subscriber with value-based identity.
///
/// Two callbacks are equal when they share a [`CallbackKey`], regardless of how the underlying
/// closures were produced. This is what makes it possible to rebuild a handle later and use it
/// to unsubscribe.
pub struct Callback<E> {
    key: CallbackKey,
    invoke: Arc<dyn Fn(Arc<E>) -> Completion + Send + Sync>,
}

impl<E: Event> Callback<E> {
    /// Wraps a plain function. Every handle built from the same function is equal.
    #[must_use]
    pub fn from_fn(f: fn(Arc<E>) -> Completion) -> Self {
        Self {
            key: CallbackKey { receiver: None, function: FunctionId::Pointer(f as usize) },
            invoke: Arc::new(f),
        }
    }

    /// Wraps an arbitrary closure under a fresh identity. Only clones of the returned handle
    /// compare equal to it.
    #[must_use]
    pub fn from_closure<F>(f: F) -> Self
    where
        F: Fn(Arc<E>) -> Completion + Send + Sync + 'static,
    {
        let id = NEXT_CLOSURE_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            key: CallbackKey { receiver: None, function: FunctionId::Closure(id) },
            invoke: Arc::new(f),
        }
    }

    /// Binds a named method of `R` to a specific receiver.
    #[must_use]
    pub fn method<R>(
        receiver: &Arc<R>,
        name: &'static str,
        f: fn(Arc<R>, Arc<E>) -> Completion,
    ) -> Self
    where
        R: Send + Sync + 'static,
    {
        Self::bound(receiver, FunctionId::method::<R>(name), f)
    }

    /// Binds `f` to a receiver under an explicit function identity.
    ///
    /// The receiver is held weakly. Once it is dropped, invoking the callback completes
    /// successfully without calling `f`.
    #[must_use]
    pub fn bound<R, F>(receiver: &Arc<R>, function: FunctionId, f: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(Arc<R>, Arc<E>) -> Completion + Send + Sync + 'static,
    {
        let address = Arc::as_ptr(receiver).cast::<()>().addr();
        let weak: Weak<R> = Arc::downgrade(receiver);

        Self {
            key: CallbackKey { receiver: Some(address), function },
            invoke: Arc::new(move |event| {
                if let Some(receiver) = weak.upgrade() {
                    f(receiver, event)
                } else {
                    warn!(
                        receiver = std::any::type_name::<R>(),
                        event = std::any::type_name::<E>(),
                        "Receiver dropped, skipping callback"
                    );
                    Box::pin(future::ready(Ok(())))
                }
            }),
        }
    }
}

impl<E> Callback<E> {
    /// Starts the callback and returns its pending completion.
    #[inline]
    pub fn invoke(&self, event: Arc<E>) -> Completion {
        (self.invoke)(event)
    }

    #[inline]
    #[must_use]
    pub const fn key(&self) -> CallbackKey {
        self.key
    }
}

impl<E> Clone for Callback<E> {
    fn clone(&self) -> Self {
        Self { key: self.key, invoke: Arc::clone(&self.invoke) }
    }
}

impl<E> PartialEq for Callback<E> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<E> Eq for Callback<E> {}

impl<E> Hash for Callback<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<E> fmt::Debug for Callback<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("event", &std::any::type_name::<E>())
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
