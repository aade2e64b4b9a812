//! Cache keys and cache placement for call sites.

use crate::lifetime::Lifetime;
use crate::service_type::ServiceType;

/// Where the value produced by a call site is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheLocation {
    /// Root scope cache, shared by every scope (singletons).
    Root,
    /// Cache of the scope the resolution runs in (scoped services).
    Scope,
    /// Not cached, but disposables are captured by the resolving scope.
    Dispose,
    /// Not cached and never captured (constants, container handles).
    None,
}

impl From<Lifetime> for CacheLocation {
    fn from(lifetime: Lifetime) -> Self {
        match lifetime {
            Lifetime::Singleton => CacheLocation::Root,
            Lifetime::Scoped => CacheLocation::Scope,
            Lifetime::Transient => CacheLocation::Dispose,
        }
    }
}

/// Identifies one cached instance: the service type plus a slot.
///
/// The slot separates several registrations of the same service type. The
/// most recent registration owns slot `0`, the one before it slot `1`, and
/// so on, so single-service resolution and the last element of an
/// enumerable share one instance while older registrations never collide
/// with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Requested service type.
    pub service_type: ServiceType,
    /// Registration slot, counted from the most recent registration.
    pub slot: usize,
}

impl CacheKey {
    /// Creates a key for `service_type` at `slot`.
    pub fn new(service_type: ServiceType, slot: usize) -> Self {
        Self { service_type, slot }
    }
}

/// Cache metadata attached to every call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultCache {
    /// Where produced values live.
    pub location: CacheLocation,
    /// Key under which they live.
    pub key: CacheKey,
}

impl ResultCache {
    /// Placement derived from a descriptor lifetime.
    pub fn new(lifetime: Lifetime, service_type: ServiceType, slot: usize) -> Self {
        Self {
            location: CacheLocation::from(lifetime),
            key: CacheKey::new(service_type, slot),
        }
    }

    /// Placement for synthetic call sites that are never cached.
    pub fn none(service_type: ServiceType) -> Self {
        Self {
            location: CacheLocation::None,
            key: CacheKey::new(service_type, 0),
        }
    }
}
