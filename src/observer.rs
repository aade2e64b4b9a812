//! Diagnostic observers for resolution traceability.
//!
//! Observers receive events for call-site construction, resolution timing,
//! adaptive promotion and scope disposal. Every method has a no-op default,
//! so an observer only implements what it cares about.
//!
//! # Examples
//!
//! ```rust
//! use ferrous_resolve::{DiObserver, Resolver, ServiceCollection, ServiceType};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct CountingObserver {
//!     resolutions: AtomicUsize,
//! }
//!
//! impl DiObserver for CountingObserver {
//!     fn resolved(&self, _service: &ServiceType, _duration: std::time::Duration) {
//!         self.resolutions.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//!
//! let observer = Arc::new(CountingObserver::default());
//! let mut services = ServiceCollection::new();
//! services.add_singleton(7u32);
//! services.add_observer(observer.clone());
//!
//! let provider = services.build().unwrap();
//! provider.get::<u32>().unwrap();
//! assert_eq!(observer.resolutions.load(Ordering::Relaxed), 1);
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::key::CacheLocation;
use crate::service_type::ServiceType;

/// Hooks invoked by the provider while it builds and resolves services.
pub trait DiObserver: Send + Sync {
    /// A call site was built and validated for `service`.
    fn call_site_built(&self, _service: &ServiceType, _location: CacheLocation) {}

    /// Resolution of `service` is starting.
    fn resolving(&self, _service: &ServiceType) {}

    /// Resolution of `service` finished (successfully or not) after `duration`.
    fn resolved(&self, _service: &ServiceType, _duration: Duration) {}

    /// Adaptive mode swapped in the compiled accessor for `service`.
    fn promoted(&self, _service: &ServiceType) {}

    /// A scope was disposed together with `disposables` captured values.
    fn scope_disposed(&self, _disposables: usize) {}
}

#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn call_site_built(&self, service: &ServiceType, location: CacheLocation) {
        for observer in &self.observers {
            observer.call_site_built(service, location);
        }
    }

    pub(crate) fn resolving(&self, service: &ServiceType) {
        for observer in &self.observers {
            observer.resolving(service);
        }
    }

    pub(crate) fn resolved(&self, service: &ServiceType, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(service, duration);
        }
    }

    pub(crate) fn promoted(&self, service: &ServiceType) {
        for observer in &self.observers {
            observer.promoted(service);
        }
    }

    pub(crate) fn scope_disposed(&self, disposables: usize) {
        for observer in &self.observers {
            observer.scope_disposed(disposables);
        }
    }
}

/// Observer that forwards every event to `tracing`.
///
/// Resolution timing is emitted at `trace` level, structural events at `debug`.
pub struct TracingObserver {
    target: &'static str,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self { target: "ferrous_resolve" }
    }

    /// Label attached to every event as the `source` field.
    pub fn with_target(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiObserver for TracingObserver {
    fn call_site_built(&self, service: &ServiceType, location: CacheLocation) {
        tracing::debug!(source = self.target, service = %service, ?location, "call site built");
    }

    fn resolving(&self, service: &ServiceType) {
        tracing::trace!(source = self.target, service = %service, "resolving");
    }

    fn resolved(&self, service: &ServiceType, duration: Duration) {
        tracing::trace!(source = self.target, service = %service, ?duration, "resolved");
    }

    fn promoted(&self, service: &ServiceType) {
        tracing::debug!(source = self.target, service = %service, "promoted to compiled accessor");
    }

    fn scope_disposed(&self, disposables: usize) {
        tracing::debug!(source = self.target, disposables, "scope disposed");
    }
}
