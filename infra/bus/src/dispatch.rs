use crate::callback::{Completion, HandlerError};
use crate::error::EventBusError;
use futures::future::{BoxFuture, join_all};
use std::error::Error;
use std::fmt;
use std::future::IntoFuture;
use tracing::{trace, warn};

/// Every failure reported by the subscribers of one publish, in subscriber order.
#[derive(Debug)]
pub struct DispatchFailure {
    event: &'static str,
    invoked: usize,
    failures: Vec<HandlerError>,
}

impl DispatchFailure {
    /// Type name of the published event.
    #[must_use]
    pub const fn event(&self) -> &'static str {
        self.event
    }

    /// Number of subscribers that were invoked.
    #[must_use]
    pub const fn invoked(&self) -> usize {
        self.invoked
    }

    /// The failure of the earliest-ordered failing subscriber.
    #[must_use]
    pub fn first(&self) -> Option<&HandlerError> {
        self.failures.first()
    }

    #[must_use]
    pub fn failures(&self) -> &[HandlerError] {
        &self.failures
    }

    #[must_use]
    pub fn into_failures(self) -> Vec<HandlerError> {
        self.failures
    }
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} subscribers of {} failed", self.failures.len(), self.invoked, self.event)?;
        if let Some(first) = self.first() {
            write!(f, ", first: {first}")?;
        }
        Ok(())
    }
}

impl Error for DispatchFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.first().map(|err| &**err as &(dyn Error + 'static))
    }
}

/// The in-flight result of one publish.
///
/// Every subscriber has already been started, in order, when a `Dispatch` is handed out.
/// Awaiting it joins all their completions; dropping it abandons whatever has not finished yet.
#[must_use = "a dispatch must be awaited to drive asynchronous subscribers to completion"]
pub struct Dispatch {
    event: &'static str,
    pending: Vec<Completion>,
}

impl Dispatch {
    pub(crate) fn new(event: &'static str, pending: Vec<Completion>) -> Self {
        Self { event, pending }
    }

    pub(crate) const fn empty(event: &'static str) -> Self {
        Self { event, pending: Vec::new() }
    }

    /// Number of subscribers this publish reached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl IntoFuture for Dispatch {
    type Output = Result<(), EventBusError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { event, pending } = self;
        Box::pin(async move {
            if pending.is_empty() {
                return Ok(());
            }

            let invoked = pending.len();
            let failures: Vec<_> =
                join_all(pending).await.into_iter().filter_map(Result::err).collect();

            if failures.is_empty() {
                trace!(event, invoked, "Event dispatched");
                return Ok(());
            }

            warn!(event, invoked, failed = failures.len(), "Subscribers failed");
            Err(EventBusError::from(DispatchFailure { event, invoked, failures }))
        })
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("event", &self.event)
            .field("pending", &self.pending.len())
            .finish()
    }
}
