//! Service collection: the registration surface consumed by the provider.

use std::any::Any;
use std::sync::Arc;

use crate::call_site::CallSiteFactory;
use crate::descriptors::{ServiceDescriptor, ServiceFactory};
use crate::error::DiResult;
use crate::lifetime::Lifetime;
use crate::metadata::{AnyArc, ImplementationType, TypeCatalog};
use crate::observer::{DiObserver, Observers};
use crate::options::ProviderOptions;
use crate::provider::{ResolverContext, ServiceProvider};
use crate::service_type::ServiceType;
use crate::traits::Dispose;

/// Ordered list of service descriptors plus the type metadata needed to
/// construct type-based registrations.
///
/// Later registrations of the same service type shadow earlier ones for
/// single resolution; all of them stay visible, oldest first, to enumerable
/// resolution.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{
///     ConstructorInfo, ImplementationType, Lifetime, ParameterInfo, Resolver,
///     ServiceCollection, ServiceType,
/// };
/// use std::sync::Arc;
///
/// struct Clock;
/// struct Greeter { clock: Arc<Clock> }
///
/// let mut services = ServiceCollection::new();
/// services.register_type(
///     ImplementationType::of::<Clock>()
///         .constructor(ConstructorInfo::new([], |_| Ok(Arc::new(Clock)))),
/// );
/// services.register_type(
///     ImplementationType::of::<Greeter>().constructor(ConstructorInfo::new(
///         [ParameterInfo::of::<Clock>("clock")],
///         |args| Ok(Arc::new(Greeter { clock: args.arg::<Clock>(0)? })),
///     )),
/// );
/// services.add_type(ServiceType::of::<Clock>(), ServiceType::of::<Clock>(), Lifetime::Singleton);
/// services.add_type(ServiceType::of::<Greeter>(), ServiceType::of::<Greeter>(), Lifetime::Transient);
///
/// let provider = services.build().unwrap();
/// let a = provider.get::<Greeter>().unwrap();
/// let b = provider.get::<Greeter>().unwrap();
/// assert!(!Arc::ptr_eq(&a, &b));
/// assert!(Arc::ptr_eq(&a.clock, &b.clock));
/// ```
#[derive(Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
    types: TypeCatalog,
    observers: Observers,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            types: TypeCatalog::new(),
            observers: Observers::new(),
        }
    }

    /// Appends a descriptor.
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Describes an implementation type so it can be used by `add_type`.
    pub fn register_type(&mut self, implementation: ImplementationType) -> &mut Self {
        self.types.register(implementation);
        self
    }

    // ----- Type registrations -----

    /// Registers `implementation` to be constructed for `service`.
    ///
    /// Both may be open generic definitions, in which case requests for
    /// constructed forms of `service` close `implementation` on demand.
    pub fn add_type(&mut self, service: ServiceType, implementation: ServiceType, lifetime: Lifetime) -> &mut Self {
        self.add(ServiceDescriptor::with_type(service, implementation, lifetime))
    }

    pub fn add_singleton_type(&mut self, service: ServiceType, implementation: ServiceType) -> &mut Self {
        self.add_type(service, implementation, Lifetime::Singleton)
    }

    pub fn add_scoped_type(&mut self, service: ServiceType, implementation: ServiceType) -> &mut Self {
        self.add_type(service, implementation, Lifetime::Scoped)
    }

    pub fn add_transient_type(&mut self, service: ServiceType, implementation: ServiceType) -> &mut Self {
        self.add_type(service, implementation, Lifetime::Transient)
    }

    // ----- Instance registrations -----

    /// Registers a pre-built value for `service`.
    pub fn add_instance(&mut self, service: ServiceType, value: AnyArc) -> &mut Self {
        self.add(ServiceDescriptor::instance(service, value))
    }

    /// Registers a singleton value under its own Rust type.
    ///
    /// ```rust
    /// use ferrous_resolve::{Resolver, ServiceCollection};
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(42usize);
    /// let provider = services.build().unwrap();
    /// assert_eq!(*provider.get_required::<usize>(), 42);
    /// ```
    pub fn add_singleton<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.add_instance(ServiceType::of::<T>(), Arc::new(value))
    }

    // ----- Factory registrations -----

    /// Registers a factory for `service`.
    pub fn add_factory(&mut self, service: ServiceType, factory: ServiceFactory, lifetime: Lifetime) -> &mut Self {
        self.add(ServiceDescriptor::with_factory(service, factory, lifetime))
    }

    /// Registers a singleton factory producing `T`.
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&ResolverContext<'_>) -> T + Send + Sync + 'static,
    {
        self.add_typed_factory(Lifetime::Singleton, factory)
    }

    /// Registers a factory producing one `T` per scope.
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&ResolverContext<'_>) -> T + Send + Sync + 'static,
    {
        self.add_typed_factory(Lifetime::Scoped, factory)
    }

    /// Registers a factory producing a new `T` on every resolution.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&ResolverContext<'_>) -> T + Send + Sync + 'static,
    {
        self.add_typed_factory(Lifetime::Transient, factory)
    }

    /// Registers a factory producing a disposable `T`; the scope that
    /// produced each value disposes it.
    pub fn add_disposable_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Dispose,
        F: Fn(&ResolverContext<'_>) -> T + Send + Sync + 'static,
    {
        let factory = ServiceFactory::new(move |context| Ok(Arc::new(factory(context)) as AnyArc)).disposable::<T>();
        self.add_factory(ServiceType::of::<T>(), factory, lifetime)
    }

    fn add_typed_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&ResolverContext<'_>) -> T + Send + Sync + 'static,
    {
        let factory = ServiceFactory::new(move |context| Ok(Arc::new(factory(context)) as AnyArc));
        self.add_factory(ServiceType::of::<T>(), factory, lifetime)
    }

    // ----- Observers -----

    /// Adds an observer notified of call-site builds, resolutions,
    /// promotions and scope disposal.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    // ----- Inspection -----

    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub fn types(&self) -> &TypeCatalog {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    // ----- Build -----

    /// Builds a provider with default options.
    pub fn build(self) -> DiResult<ServiceProvider> {
        self.build_with_options(ProviderOptions::default())
    }

    /// Validates every descriptor and builds a provider.
    ///
    /// Registrations that can never be constructed (open generic services
    /// without an open implementation, abstract implementations, unknown
    /// implementation types) fail here rather than on first resolution.
    pub fn build_with_options(self, options: ProviderOptions) -> DiResult<ServiceProvider> {
        let factory = CallSiteFactory::new(self.descriptors, Arc::new(self.types))?;
        ServiceProvider::new(factory, self.observers, options)
    }
}
