//! Resolver traits for service resolution.

use std::any::Any;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::metadata::AnyArc;
use crate::service_type::ServiceType;

/// Object-safe resolution primitive implemented by the provider, scopes and
/// the context handed to factories.
pub trait ResolverCore: Send + Sync {
    /// Resolves `service_type`, returning `None` when nothing is registered
    /// and no enumerable or default applies.
    fn resolve_service(&self, service_type: &ServiceType) -> DiResult<Option<AnyArc>>;
}

/// Convenience methods layered over [`ResolverCore`].
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{Resolver, ServiceCollection, ServiceType};
///
/// struct Settings { name: &'static str }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Settings { name: "app" });
///
/// let provider = services.build().unwrap();
/// assert_eq!(provider.get::<Settings>().unwrap().name, "app");
/// assert!(provider.resolve(&ServiceType::named("Unknown")).unwrap().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves `service_type`, or `Ok(None)` if it is not registered.
    fn resolve(&self, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        self.resolve_service(service_type)
    }

    /// Resolves `service_type`, failing with [`DiError::NotFound`] if it is not registered.
    fn resolve_required(&self, service_type: &ServiceType) -> DiResult<AnyArc> {
        self.resolve_service(service_type)?
            .ok_or_else(|| DiError::NotFound(service_type.clone()))
    }

    /// Resolves every registration of `element`, oldest first.
    fn resolve_all(&self, element: &ServiceType) -> DiResult<Vec<AnyArc>> {
        let many = ServiceType::enumerable(element.clone());
        let value = self.resolve_required(&many)?;
        value
            .downcast::<Vec<AnyArc>>()
            .map(|values| (*values).clone())
            .map_err(|_| DiError::TypeMismatch { service: many, expected: "Vec<AnyArc>" })
    }

    /// Resolves `service_type` and downcasts it to `T`.
    fn get_as<T: Any + Send + Sync>(&self, service_type: &ServiceType) -> DiResult<Arc<T>> {
        downcast(self.resolve_required(service_type)?, service_type)
    }

    /// Resolves the service registered under the Rust type `T`.
    fn get<T: Any + Send + Sync>(&self) -> DiResult<Arc<T>> {
        self.get_as::<T>(&ServiceType::of::<T>())
    }

    /// Like [`Resolver::get`], but `Ok(None)` when `T` is not registered.
    fn try_get<T: Any + Send + Sync>(&self) -> DiResult<Option<Arc<T>>> {
        let service_type = ServiceType::of::<T>();
        self.resolve_service(&service_type)?
            .map(|value| downcast(value, &service_type))
            .transpose()
    }

    /// Resolves `T`, panicking if resolution fails.
    fn get_required<T: Any + Send + Sync>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e))
    }

    /// Resolves every registration of `element` and downcasts each to `T`.
    fn get_all<T: Any + Send + Sync>(&self, element: &ServiceType) -> DiResult<Vec<Arc<T>>> {
        self.resolve_all(element)?
            .into_iter()
            .map(|value| downcast(value, element))
            .collect()
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}

fn downcast<T: Any + Send + Sync>(value: AnyArc, service_type: &ServiceType) -> DiResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| DiError::TypeMismatch {
        service: service_type.clone(),
        expected: std::any::type_name::<T>(),
    })
}
