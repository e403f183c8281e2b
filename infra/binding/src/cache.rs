use crate::binding::{Bindings, TypeBinding};
use crate::error::BindingError;
use moka::sync::Cache;
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::debug;

static GLOBAL: LazyLock<BindingCache> = LazyLock::new(BindingCache::new);

/// Memoized [`TypeBinding`]s, keyed by the concrete type.
///
/// Concurrent first lookups of one type are coalesced: the declarations run once and every
/// caller receives the same binding. Failed resolutions are not stored. Entries are never
/// evicted.
#[derive(Clone)]
pub struct BindingCache {
    inner: Cache<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl BindingCache {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Cache::builder().name("tidings-bindings").build() }
    }

    /// The process-wide cache used by [`Registrar::new`](crate::Registrar::new).
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Returns the binding of `R`, discovering it on first use.
    ///
    /// # Errors
    /// Returns the discovery error of `R`; it is reported to every caller that waited on the
    /// same resolution and the next call retries.
    pub fn resolve<R: Bindings>(&self) -> Result<Arc<TypeBinding<R>>, BindingError> {
        let entry = self
            .inner
            .try_get_with(TypeId::of::<R>(), || {
                debug!(r#type = type_name::<R>(), "Discovering bindings");
                TypeBinding::<R>::discover()
                    .map(|binding| Arc::new(binding) as Arc<dyn Any + Send + Sync>)
            })
            .map_err(|e: Arc<BindingError>| {
                Arc::try_unwrap(e).unwrap_or_else(|shared| shared.duplicate())
            })?;

        entry.downcast::<TypeBinding<R>>().map_err(|_| BindingError::TypeMismatch {
            message: type_name::<R>().into(),
            context: Some("Cached binding belongs to another type".into()),
        })
    }

    #[must_use]
    pub fn contains<R: 'static>(&self) -> bool {
        self.inner.contains_key(&TypeId::of::<R>())
    }

    /// Number of resolved types.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BindingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BindingCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingCache").field("entries", &self.inner.entry_count()).finish()
    }
}
