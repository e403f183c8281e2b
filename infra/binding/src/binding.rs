use crate::error::BindingError;
use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;
use tidings_bus::{
    Bus, Callback, Completion, ConcurrentBus, Event, EventBusError, FunctionId, PublisherSlot,
};
use tracing::{debug, trace};

/// Projects the registered root instance onto the object that declared a binding.
type Lens<R, T> = Arc<dyn Fn(&Arc<R>) -> Arc<T> + Send + Sync>;

/// Self-description of a type's bus participation.
///
/// Usually generated by `#[bindings]`; hand-written implementations list the same declarations
/// through the [`BindingBuilder`].
///
/// # Example
///
/// ```rust
/// use futures::future;
/// use std::sync::Arc;
/// use tidings_binding::{BindingBuilder, Bindings, TypeBinding};
///
/// struct Started;
///
/// struct Monitor;
///
/// impl Monitor {
///     fn on_started(&self, _: Arc<Started>) {}
/// }
///
/// impl Bindings for Monitor {
///     fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
///         builder.subscriber::<Started>("on_started", 1, |this, event| {
///             this.on_started(event);
///             Box::pin(future::ready(Ok(())))
///         });
///     }
/// }
///
/// let binding = TypeBinding::<Monitor>::discover().unwrap();
/// assert_eq!(binding.subscribers()[0].member(), "on_started");
/// ```
pub trait Bindings: Send + Sync + Sized + 'static {
    fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>);
}

/// Collects the declarations of `T` while resolving the bindings of the root type `R`.
///
/// `T` differs from `R` only inside [`extend`](Self::extend), where a base embedded in the root
/// declares its own members.
pub struct BindingBuilder<T, R> {
    lens: Lens<R, T>,
    path: String,
    depth: usize,
    lineage: Vec<TypeId>,
    declarations: Declarations<R>,
}

impl<R: Send + Sync + 'static> BindingBuilder<R, R> {
    fn root() -> Self {
        Self {
            lens: Arc::new(|root: &Arc<R>| Arc::clone(root)),
            path: String::new(),
            depth: 0,
            lineage: vec![TypeId::of::<R>()],
            declarations: Declarations::default(),
        }
    }

    fn finish(self) -> Result<TypeBinding<R>, BindingError> {
        let Declarations { subscribers, publishers, error } = self.declarations;
        if let Some(err) = error {
            return Err(err);
        }
        Ok(TypeBinding { type_name: type_name::<R>(), subscribers, publishers })
    }
}

impl<T, R> BindingBuilder<T, R>
where
    T: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// Declares `member` as a subscriber of `E`.
    ///
    /// Redeclaring a member inherited through [`extend`](Self::extend) overrides it; the
    /// override must handle the same event.
    pub fn subscriber<E: Event>(
        &mut self,
        member: &'static str,
        order: i32,
        handler: fn(Arc<T>, Arc<E>) -> Completion,
    ) {
        if self.declarations.error.is_some() {
            return;
        }

        let binding = SubscriberBinding {
            member,
            declared_by: type_name::<T>(),
            event: TypeId::of::<E>(),
            event_name: type_name::<E>(),
            order,
            lineage: self.lineage.clone(),
            path: self.path.clone(),
            glue: Arc::new(TypedSubscriber {
                function: FunctionId::method::<T>(member),
                lens: Arc::clone(&self.lens),
                handler,
            }),
        };

        if let Err(err) = self.declarations.add_subscriber(binding) {
            self.declarations.error = Some(err);
        }
    }

    /// Declares the slot returned by `slot` as a publisher of `E`.
    pub fn publisher<E: Event>(&mut self, name: &'static str, slot: fn(&T) -> &PublisherSlot<E>) {
        if self.declarations.error.is_some() {
            return;
        }

        let qualified = self.qualify(name);
        if self.declarations.publishers.iter().any(|existing| existing.slot == qualified) {
            self.declarations.error = Some(BindingError::DuplicateMember {
                message: format!("{}::{name} is declared more than once", type_name::<T>()).into(),
                context: Some("publisher slot".into()),
            });
            return;
        }

        self.declarations.publishers.push(PublisherBinding {
            slot: qualified,
            declared_by: type_name::<T>(),
            event_name: type_name::<E>(),
            glue: Arc::new(TypedPublisher { lens: Arc::clone(&self.lens), slot }),
        });
    }

    /// Inherits the declarations of the base `B` stored in `field`.
    pub fn extend<B: Bindings>(&mut self, field: &'static str, base: fn(&T) -> &Arc<B>) {
        if self.declarations.error.is_some() {
            return;
        }

        if self.lineage.contains(&TypeId::of::<B>()) {
            self.declarations.error = Some(BindingError::Internal {
                message: format!("{} extends itself through `{field}`", type_name::<B>()).into(),
                context: Some(type_name::<R>().into()),
            });
            return;
        }

        let parent = Arc::clone(&self.lens);
        let mut lineage = self.lineage.clone();
        lineage.push(TypeId::of::<B>());

        let mut child = BindingBuilder::<B, R> {
            lens: Arc::new(move |root: &Arc<R>| Arc::clone(base(&parent(root)))),
            path: self.qualify(field),
            depth: self.depth + 1,
            lineage,
            declarations: std::mem::take(&mut self.declarations),
        };
        B::bindings(&mut child);
        self.declarations = child.declarations;
    }

    fn qualify(&self, name: &str) -> String {
        if self.path.is_empty() { name.to_owned() } else { format!("{}.{name}", self.path) }
    }
}

impl<T, R> fmt::Debug for BindingBuilder<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingBuilder")
            .field("declaring", &type_name::<T>())
            .field("root", &type_name::<R>())
            .field("path", &self.path)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

struct Declarations<R> {
    subscribers: Vec<SubscriberBinding<R>>,
    publishers: Vec<PublisherBinding<R>>,
    error: Option<BindingError>,
}

impl<R> Default for Declarations<R> {
    fn default() -> Self {
        Self { subscribers: Vec::new(), publishers: Vec::new(), error: None }
    }
}

impl<R> Declarations<R> {
    /// Keeps one declaration per member name: the most derived one along a single inheritance
    /// chain. Unrelated declarations of one name conflict, whatever their depth.
    fn add_subscriber(&mut self, binding: SubscriberBinding<R>) -> Result<(), BindingError> {
        let Some(index) = self.subscribers.iter().position(|s| s.member == binding.member) else {
            self.subscribers.push(binding);
            return Ok(());
        };

        let existing = &self.subscribers[index];
        let same_chain = existing.path == binding.path && existing.lineage == binding.lineage;
        let replace = existing.is_base_of(&binding);
        if same_chain || (!replace && !binding.is_base_of(existing)) {
            let message = if same_chain {
                format!("{}::{} is declared more than once", binding.declared_by, binding.member)
            } else {
                format!(
                    "{} is declared by both {} and {}",
                    binding.member, existing.declared_by, binding.declared_by
                )
            };
            return Err(BindingError::DuplicateMember {
                message: message.into(),
                context: Some("subscriber".into()),
            });
        }

        let (derived, base) = if replace { (&binding, existing) } else { (existing, &binding) };
        if derived.event != base.event {
            return Err(BindingError::OverrideMismatch {
                message: format!(
                    "{}::{} handles {} but overrides {}::{} handling {}",
                    derived.declared_by,
                    derived.member,
                    derived.event_name,
                    base.declared_by,
                    base.member,
                    base.event_name
                )
                .into(),
                context: None,
            });
        }

        trace!(
            member = derived.member,
            by = derived.declared_by,
            shadowed = base.declared_by,
            "Subscriber overridden"
        );
        if replace {
            self.subscribers[index] = binding;
        }
        Ok(())
    }
}

/// The resolved bindings of a concrete type: the final subscriber table and publisher slots.
pub struct TypeBinding<R> {
    type_name: &'static str,
    subscribers: Vec<SubscriberBinding<R>>,
    publishers: Vec<PublisherBinding<R>>,
}

impl<R: Bindings> TypeBinding<R> {
    /// Runs `R`'s declarations and resolves overrides.
    ///
    /// Prefer [`BindingCache::resolve`](crate::BindingCache::resolve), which does this once per
    /// type.
    ///
    /// # Errors
    /// Returns [`BindingError::DuplicateMember`] or [`BindingError::OverrideMismatch`] when the
    /// declarations conflict.
    pub fn discover() -> Result<Self, BindingError> {
        let mut builder = BindingBuilder::<R, R>::root();
        R::bindings(&mut builder);
        let binding = builder.finish()?;

        debug!(
            r#type = binding.type_name,
            subscribers = binding.subscribers.len(),
            publishers = binding.publishers.len(),
            "Bindings resolved"
        );
        Ok(binding)
    }
}

impl<R> TypeBinding<R> {
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Subscribers in declaration order, inherited ones first unless overridden in place.
    #[must_use]
    pub fn subscribers(&self) -> &[SubscriberBinding<R>] {
        &self.subscribers
    }

    #[must_use]
    pub fn publishers(&self) -> &[PublisherBinding<R>] {
        &self.publishers
    }
}

impl<R> fmt::Debug for TypeBinding<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeBinding")
            .field("type_name", &self.type_name)
            .field("subscribers", &self.subscribers)
            .field("publishers", &self.publishers)
            .finish()
    }
}

/// One subscriber method bound by [`TypeBinding`].
pub struct SubscriberBinding<R> {
    member: &'static str,
    declared_by: &'static str,
    event: TypeId,
    event_name: &'static str,
    order: i32,
    lineage: Vec<TypeId>,
    path: String,
    glue: Arc<dyn SubscriberGlue<R>>,
}

impl<R> SubscriberBinding<R> {
    #[must_use]
    pub const fn member(&self) -> &'static str {
        self.member
    }

    #[must_use]
    pub const fn declared_by(&self) -> &'static str {
        self.declared_by
    }

    #[must_use]
    pub const fn event_id(&self) -> TypeId {
        self.event
    }

    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        self.event_name
    }

    #[must_use]
    pub const fn order(&self) -> i32 {
        self.order
    }

    /// `true` when `self` was declared by a base that `other`'s declaring type extends,
    /// directly or transitively.
    fn is_base_of(&self, other: &Self) -> bool {
        self.lineage.len() > other.lineage.len()
            && self.lineage.starts_with(&other.lineage)
            && is_field_within(&self.path, &other.path)
    }

    pub(crate) fn subscribe(&self, bus: &mut Bus, root: &Arc<R>) -> Result<(), EventBusError> {
        self.glue.subscribe(bus, root, self.order)
    }

    pub(crate) fn unsubscribe(&self, bus: &mut Bus, root: &Arc<R>) -> Result<bool, EventBusError> {
        self.glue.unsubscribe(bus, root)
    }

    /// Undoes one [`subscribe`](Self::subscribe), leaving earlier registrations of `root` alone.
    pub(crate) fn retract(&self, bus: &mut Bus, root: &Arc<R>) -> Result<bool, EventBusError> {
        self.glue.retract(bus, root, self.order)
    }
}

impl<R> fmt::Debug for SubscriberBinding<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberBinding")
            .field("member", &self.member)
            .field("declared_by", &self.declared_by)
            .field("event", &self.event_name)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

/// One publisher slot bound by [`TypeBinding`].
pub struct PublisherBinding<R> {
    slot: String,
    declared_by: &'static str,
    event_name: &'static str,
    glue: Arc<dyn PublisherGlue<R>>,
}

impl<R> PublisherBinding<R> {
    /// Field path of the slot from the registered instance, e.g. `base.saved`.
    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }

    #[must_use]
    pub const fn declared_by(&self) -> &'static str {
        self.declared_by
    }

    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        self.event_name
    }

    pub(crate) fn attach(&self, bus: &ConcurrentBus, root: &Arc<R>) {
        self.glue.attach(bus, root);
    }

    pub(crate) fn detach(&self, bus: &ConcurrentBus, root: &Arc<R>) -> bool {
        self.glue.detach(bus, root)
    }
}

impl<R> fmt::Debug for PublisherBinding<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherBinding")
            .field("slot", &self.slot)
            .field("declared_by", &self.declared_by)
            .field("event", &self.event_name)
            .finish_non_exhaustive()
    }
}

/// `base.inner` lies within `base`; every path lies within the root path.
fn is_field_within(path: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || path.strip_prefix(ancestor).is_some_and(|rest| rest.starts_with('.'))
}

trait SubscriberGlue<R>: Send + Sync {
    fn subscribe(&self, bus: &mut Bus, root: &Arc<R>, order: i32) -> Result<(), EventBusError>;
    fn unsubscribe(&self, bus: &mut Bus, root: &Arc<R>) -> Result<bool, EventBusError>;
    fn retract(&self, bus: &mut Bus, root: &Arc<R>, order: i32) -> Result<bool, EventBusError>;
}

struct TypedSubscriber<R, T, E> {
    function: FunctionId,
    lens: Lens<R, T>,
    handler: fn(Arc<T>, Arc<E>) -> Completion,
}

impl<R, T, E> TypedSubscriber<R, T, E>
where
    R: Send + Sync + 'static,
    T: Send + Sync + 'static,
    E: Event,
{
    /// Rebuilding yields an equal callback for the same root, which is what unsubscribe relies on.
    fn callback(&self, root: &Arc<R>) -> Callback<E> {
        let lens = Arc::clone(&self.lens);
        let handler = self.handler;
        Callback::bound(root, self.function, move |root, event| handler(lens(&root), event))
    }
}

impl<R, T, E> SubscriberGlue<R> for TypedSubscriber<R, T, E>
where
    R: Send + Sync + 'static,
    T: Send + Sync + 'static,
    E: Event,
{
    fn subscribe(&self, bus: &mut Bus, root: &Arc<R>, order: i32) -> Result<(), EventBusError> {
        bus.subscribe_with_order(self.callback(root), order)
    }

    fn unsubscribe(&self, bus: &mut Bus, root: &Arc<R>) -> Result<bool, EventBusError> {
        bus.unsubscribe(&self.callback(root))
    }

    fn retract(&self, bus: &mut Bus, root: &Arc<R>, order: i32) -> Result<bool, EventBusError> {
        bus.unsubscribe_latest(&self.callback(root), order)
    }
}

trait PublisherGlue<R>: Send + Sync {
    fn attach(&self, bus: &ConcurrentBus, root: &Arc<R>);
    fn detach(&self, bus: &ConcurrentBus, root: &Arc<R>) -> bool;
}

struct TypedPublisher<R, T, E> {
    lens: Lens<R, T>,
    slot: fn(&T) -> &PublisherSlot<E>,
}

impl<R, T, E> PublisherGlue<R> for TypedPublisher<R, T, E>
where
    R: Send + Sync + 'static,
    T: Send + Sync + 'static,
    E: Event,
{
    fn attach(&self, bus: &ConcurrentBus, root: &Arc<R>) {
        let owner = (self.lens)(root);
        (self.slot)(&owner).add_handler(bus.forwarder::<E>());
    }

    fn detach(&self, bus: &ConcurrentBus, root: &Arc<R>) -> bool {
        let owner = (self.lens)(root);
        (self.slot)(&owner).remove_handler(&bus.forwarder::<E>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future;
    use tidings_bus::DEFAULT_ORDER;

    struct Ping;
    struct Pong;

    fn done() -> Completion {
        Box::pin(future::ready(Ok(())))
    }

    struct Base {
        pings: PublisherSlot<Ping>,
    }

    impl Bindings for Base {
        fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
            builder.subscriber::<Ping>("on_ping", 1, |_, _| done());
            builder.subscriber::<Pong>("on_pong", DEFAULT_ORDER, |_, _| done());
            builder.publisher("pings", |this| &this.pings);
        }
    }

    struct Derived {
        base: Arc<Base>,
    }

    impl Bindings for Derived {
        fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
            builder.extend::<Base>("base", |this| &this.base);
            builder.subscriber::<Ping>("on_ping", 5, |_, _| done());
        }
    }

    #[test]
    fn most_derived_declaration_wins() {
        let binding = TypeBinding::<Derived>::discover().unwrap();
        let subscribers: Vec<_> = binding
            .subscribers()
            .iter()
            .map(|s| (s.member(), s.declared_by(), s.order()))
            .collect();

        assert_eq!(
            subscribers,
            vec![
                ("on_ping", type_name::<Derived>(), 5),
                ("on_pong", type_name::<Base>(), DEFAULT_ORDER),
            ]
        );
        assert_eq!(binding.publishers()[0].slot(), "base.pings");
        assert_eq!(binding.publishers()[0].event_name(), type_name::<Ping>());
    }

    #[test]
    fn base_declarations_collected_last_are_still_shadowed() {
        struct Late {
            base: Arc<Base>,
        }

        impl Bindings for Late {
            fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
                builder.subscriber::<Ping>("on_ping", 9, |_, _| done());
                builder.extend::<Base>("base", |this| &this.base);
            }
        }

        let binding = TypeBinding::<Late>::discover().unwrap();
        assert_eq!(binding.subscribers().len(), 2);
        assert_eq!(binding.subscribers()[0].declared_by(), type_name::<Late>());
        assert_eq!(binding.subscribers()[0].order(), 9);
    }

    #[test]
    fn override_must_keep_the_event_type() {
        struct Wrong {
            base: Arc<Base>,
        }

        impl Bindings for Wrong {
            fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
                builder.extend::<Base>("base", |this| &this.base);
                builder.subscriber::<Pong>("on_ping", 1, |_, _| done());
            }
        }

        let err = TypeBinding::<Wrong>::discover().unwrap_err();
        assert!(matches!(err, BindingError::OverrideMismatch { .. }), "{err}");
    }

    #[test]
    fn same_type_cannot_declare_a_member_twice() {
        struct Twice;

        impl Bindings for Twice {
            fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
                builder.subscriber::<Ping>("on_ping", 1, |_, _| done());
                builder.subscriber::<Ping>("on_ping", 2, |_, _| done());
            }
        }

        let err = TypeBinding::<Twice>::discover().unwrap_err();
        assert!(matches!(err, BindingError::DuplicateMember { .. }));
        assert!(err.to_string().contains("declared more than once"), "{err}");
    }

    #[test]
    fn sibling_bases_cannot_share_a_member() {
        struct Other;

        impl Bindings for Other {
            fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
                builder.subscriber::<Ping>("on_ping", 1, |_, _| done());
            }
        }

        struct Both {
            base: Arc<Base>,
            other: Arc<Other>,
        }

        impl Bindings for Both {
            fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
                builder.extend::<Base>("base", |this| &this.base);
                builder.extend::<Other>("other", |this| &this.other);
            }
        }

        let err = TypeBinding::<Both>::discover().unwrap_err();
        assert!(err.to_string().contains("declared by both"), "{err}");
    }

    #[test]
    fn unrelated_bases_at_different_depths_cannot_share_a_member() {
        struct Audit;

        impl Bindings for Audit {
            fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
                builder.subscriber::<Ping>("on_ping", 1, |_, _| done());
            }
        }

        struct Wrapper {
            base: Arc<Base>,
        }

        impl Bindings for Wrapper {
            fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
                builder.extend::<Base>("base", |this| &this.base);
            }
        }

        struct Service {
            audit: Arc<Audit>,
            wrapper: Arc<Wrapper>,
        }

        impl Bindings for Service {
            fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
                builder.extend::<Audit>("audit", |this| &this.audit);
                builder.extend::<Wrapper>("wrapper", |this| &this.wrapper);
            }
        }

        let err = TypeBinding::<Service>::discover().unwrap_err();
        assert!(matches!(err, BindingError::DuplicateMember { .. }), "{err}");
        assert!(err.to_string().contains("declared by both"), "{err}");
    }

    #[test]
    fn overrides_reach_through_intermediate_bases() {
        struct Middle {
            base: Arc<Base>,
        }

        impl Bindings for Middle {
            fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
                builder.extend::<Base>("base", |this| &this.base);
            }
        }

        struct Top {
            middle: Arc<Middle>,
        }

        impl Bindings for Top {
            fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
                builder.subscriber::<Ping>("on_ping", 7, |_, _| done());
                builder.extend::<Middle>("middle", |this| &this.middle);
            }
        }

        let binding = TypeBinding::<Top>::discover().unwrap();
        let on_ping = binding.subscribers().iter().find(|s| s.member() == "on_ping").unwrap();
        assert_eq!(on_ping.declared_by(), type_name::<Top>());
        assert_eq!(binding.subscribers().len(), 2);
        assert_eq!(binding.publishers()[0].slot(), "middle.base.pings");
    }

    #[test]
    fn retract_leaves_earlier_registrations_subscribed() {
        let binding = TypeBinding::<Derived>::discover().unwrap();
        let derived = Arc::new(Derived { base: Arc::new(Base { pings: PublisherSlot::new() }) });
        let on_ping = &binding.subscribers()[0];
        let mut bus = Bus::new();

        on_ping.subscribe(&mut bus, &derived).unwrap();
        on_ping.subscribe(&mut bus, &derived).unwrap();
        assert!(on_ping.retract(&mut bus, &derived).unwrap());

        assert_eq!(bus.subscriber_count::<Ping>(), 1);
        assert!(on_ping.unsubscribe(&mut bus, &derived).unwrap());
        assert!(!on_ping.retract(&mut bus, &derived).unwrap());
    }

    #[test]
    fn self_extension_is_rejected() {
        struct Loop {
            me: Arc<Self>,
        }

        impl Bindings for Loop {
            fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
                builder.extend::<Self>("me", |this| &this.me);
            }
        }

        let err = TypeBinding::<Loop>::discover().unwrap_err();
        assert!(matches!(err, BindingError::Internal { .. }), "{err}");
    }

    #[test]
    fn duplicate_publishers_are_rejected() {
        struct Noisy {
            pings: PublisherSlot<Ping>,
        }

        impl Bindings for Noisy {
            fn bindings<Root: Send + Sync + 'static>(builder: &mut BindingBuilder<Self, Root>) {
                builder.publisher("pings", |this| &this.pings);
                builder.publisher("pings", |this| &this.pings);
            }
        }

        let err = TypeBinding::<Noisy>::discover().unwrap_err();
        assert!(matches!(err, BindingError::DuplicateMember { .. }));
    }
}
