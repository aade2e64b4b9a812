//! Service descriptors: the registrations the graph builder consumes.

use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, DiError, DiResult};
use crate::lifetime::Lifetime;
use crate::metadata::{dispose_probe, AnyArc, DisposeProbe, TypeKind, TypeMetadataProvider};
use crate::provider::ResolverContext;
use crate::service_type::ServiceType;
use crate::traits::Dispose;

type FactoryFn = dyn for<'a> Fn(&ResolverContext<'a>) -> Result<AnyArc, BoxError> + Send + Sync;

/// A registered factory function `(container) -> value`.
#[derive(Clone)]
pub struct ServiceFactory {
    func: Arc<FactoryFn>,
    disposer: Option<DisposeProbe>,
}

impl ServiceFactory {
    pub fn new<F>(func: F) -> Self
    where
        F: for<'a> Fn(&ResolverContext<'a>) -> Result<AnyArc, BoxError> + Send + Sync + 'static,
    {
        Self { func: Arc::new(func), disposer: None }
    }

    /// Marks produced values as disposable through the Rust type `T`.
    pub fn disposable<T: Dispose>(mut self) -> Self {
        self.disposer = Some(dispose_probe::<T>());
        self
    }

    pub(crate) fn invoke(&self, context: &ResolverContext<'_>) -> DiResult<AnyArc> {
        (self.func)(context).map_err(DiError::construction)
    }

    pub(crate) fn disposer(&self) -> Option<&DisposeProbe> {
        self.disposer.as_ref()
    }
}

/// How a descriptor produces its value.
#[derive(Clone)]
pub enum Implementation {
    /// Construct an implementation type described by the type metadata provider.
    Type(ServiceType),
    /// Run a registered factory.
    Factory(ServiceFactory),
    /// Hand out a pre-built value.
    Instance(AnyArc),
}

/// An immutable registration: service type, lifetime and implementation.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{Lifetime, ServiceDescriptor, ServiceType};
/// use std::sync::Arc;
///
/// let descriptor = ServiceDescriptor::instance(ServiceType::named("Port"), Arc::new(8080u16));
/// assert_eq!(descriptor.lifetime(), Lifetime::Singleton);
/// assert!(descriptor.implementation_type().is_none());
/// ```
#[derive(Clone)]
pub struct ServiceDescriptor {
    service_type: ServiceType,
    lifetime: Lifetime,
    implementation: Implementation,
}

impl ServiceDescriptor {
    pub fn new(service_type: ServiceType, lifetime: Lifetime, implementation: Implementation) -> Self {
        Self { service_type, lifetime, implementation }
    }

    /// Registration constructing `implementation_type` for `service_type`.
    pub fn with_type(service_type: ServiceType, implementation_type: ServiceType, lifetime: Lifetime) -> Self {
        Self::new(service_type, lifetime, Implementation::Type(implementation_type))
    }

    /// Registration running `factory` for `service_type`.
    pub fn with_factory(service_type: ServiceType, factory: ServiceFactory, lifetime: Lifetime) -> Self {
        Self::new(service_type, lifetime, Implementation::Factory(factory))
    }

    /// Singleton registration of a pre-built value.
    pub fn instance(service_type: ServiceType, value: AnyArc) -> Self {
        Self::new(service_type, Lifetime::Singleton, Implementation::Instance(value))
    }

    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn implementation(&self) -> &Implementation {
        &self.implementation
    }

    /// Implementation type for type-based registrations.
    pub fn implementation_type(&self) -> Option<&ServiceType> {
        match &self.implementation {
            Implementation::Type(implementation) => Some(implementation),
            _ => None,
        }
    }

    /// Eager registration checks run when the provider is built.
    pub(crate) fn validate(&self, types: &dyn TypeMetadataProvider) -> DiResult<()> {
        let service = &self.service_type;
        let reject = |reason: String| {
            Err(DiError::InvalidRegistration { service: service.clone(), reason })
        };

        if service.is_param() || service.element_type().is_some() {
            return reject("generic parameters and enumerables cannot be registered as services".into());
        }

        if service.is_open_definition() {
            let implementation = match &self.implementation {
                Implementation::Type(implementation) if implementation.is_open_definition() => implementation,
                _ => {
                    return reject(format!(
                        "Open generic service type '{}' requires registering an open generic implementation type.",
                        service
                    ))
                }
            };
            let Some(meta) = types.describe(implementation) else {
                return reject(format!("No type metadata is registered for '{}'.", implementation));
            };
            if meta.kind() != TypeKind::Class {
                return reject(format!(
                    "Cannot instantiate implementation type '{}' for service type '{}'.",
                    implementation, service
                ));
            }
            if !meta.can_close_definition(service) {
                return reject(format!(
                    "Arity of open generic service type '{}' does not match open generic implementation type '{}'.",
                    service, implementation
                ));
            }
            return Ok(());
        }

        if let Implementation::Type(implementation) = &self.implementation {
            if implementation.is_open_definition() || !implementation.is_closed() {
                return reject(format!(
                    "Cannot instantiate implementation type '{}' for service type '{}'.",
                    implementation, service
                ));
            }
            let Some(meta) = types.describe(implementation) else {
                return reject(format!("No type metadata is registered for '{}'.", implementation));
            };
            if meta.kind() != TypeKind::Class {
                return reject(format!(
                    "Cannot instantiate implementation type '{}' for service type '{}' because it is {}.",
                    implementation,
                    service,
                    if meta.kind() == TypeKind::Interface { "an interface" } else { "abstract" }
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let implementation = match &self.implementation {
            Implementation::Type(ty) => format!("Type({})", ty),
            Implementation::Factory(_) => "Factory".to_string(),
            Implementation::Instance(_) => "Instance".to_string(),
        };
        f.debug_struct("ServiceDescriptor")
            .field("service_type", &self.service_type)
            .field("lifetime", &self.lifetime)
            .field("implementation", &implementation)
            .finish()
    }
}
