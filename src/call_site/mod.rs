//! The call-site model: how to produce one service value.
//!
//! A [`CallSite`] is built once per `(service type, slot)` by the graph
//! builder, validated, memoized for the container's lifetime and then handed
//! to one of the resolution engines. Every consumer walks the same tree
//! through [`CallSiteVisitor`].

use std::fmt;
use std::sync::Arc;

use crate::descriptors::ServiceFactory;
use crate::key::{CacheKey, ResultCache};
use crate::metadata::{AnyArc, ConstructorInfo, DisposeProbe};
use crate::service_type::ServiceType;

pub(crate) mod chain;
pub(crate) mod factory;
#[cfg(feature = "diagnostics")]
pub mod formatter;
pub(crate) mod validator;
pub mod visitor;

pub(crate) use chain::CallSiteChain;
pub(crate) use factory::CallSiteFactory;
#[cfg(feature = "diagnostics")]
pub use formatter::CallSiteFormatter;
pub(crate) use validator::CallSiteValidator;
pub use visitor::CallSiteVisitor;

/// The resolved plan for producing one service value.
pub struct CallSite {
    service_type: ServiceType,
    implementation_type: Option<ServiceType>,
    cache: ResultCache,
    kind: CallSiteKind,
}

/// Closed set of call-site variants.
pub enum CallSiteKind {
    /// A fixed value: registered instances and default parameter values.
    Constant(AnyArc),
    /// Invoke a constructor with one argument call site per parameter.
    Constructor(ConstructorCallSite),
    /// Invoke a constructor that takes no arguments.
    ParameterlessConstruct(ConstructorCallSite),
    /// Run a registered factory.
    Factory(FactoryCallSite),
    /// Collect every registration of an element type.
    Enumerable(EnumerableCallSite),
    /// The requesting scope itself.
    Container,
    /// A handle that creates child scopes.
    ScopeFactory,
}

pub struct ConstructorCallSite {
    pub(crate) constructor: ConstructorInfo,
    pub(crate) arguments: Vec<Arc<CallSite>>,
    pub(crate) disposer: Option<DisposeProbe>,
}

impl ConstructorCallSite {
    pub fn constructor(&self) -> &ConstructorInfo {
        &self.constructor
    }

    /// Argument call sites in declared parameter order.
    pub fn arguments(&self) -> &[Arc<CallSite>] {
        &self.arguments
    }
}

pub struct FactoryCallSite {
    pub(crate) factory: ServiceFactory,
}

pub struct EnumerableCallSite {
    pub(crate) element_type: ServiceType,
    pub(crate) elements: Vec<Arc<CallSite>>,
}

impl EnumerableCallSite {
    pub fn element_type(&self) -> &ServiceType {
        &self.element_type
    }

    /// Element call sites, oldest registration first.
    pub fn elements(&self) -> &[Arc<CallSite>] {
        &self.elements
    }
}

impl CallSite {
    pub(crate) fn new(
        service_type: ServiceType,
        implementation_type: Option<ServiceType>,
        cache: ResultCache,
        kind: CallSiteKind,
    ) -> Self {
        Self { service_type, implementation_type, cache, kind }
    }

    pub(crate) fn constant(service_type: ServiceType, value: AnyArc, cache: ResultCache) -> Self {
        Self::new(service_type, None, cache, CallSiteKind::Constant(value))
    }

    pub(crate) fn constructor(
        cache: ResultCache,
        service_type: ServiceType,
        implementation_type: ServiceType,
        constructor: ConstructorInfo,
        arguments: Vec<Arc<CallSite>>,
        disposer: Option<DisposeProbe>,
    ) -> Self {
        let site = ConstructorCallSite { constructor, arguments, disposer };
        let kind = if site.arguments.is_empty() {
            CallSiteKind::ParameterlessConstruct(site)
        } else {
            CallSiteKind::Constructor(site)
        };
        Self::new(service_type, Some(implementation_type), cache, kind)
    }

    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    /// The activated type for constructor call sites.
    pub fn implementation_type(&self) -> Option<&ServiceType> {
        self.implementation_type.as_ref()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn key(&self) -> &CacheKey {
        &self.cache.key
    }

    pub fn kind(&self) -> &CallSiteKind {
        &self.kind
    }

    /// Probe extracting the disposal contract from values this call site produces.
    pub(crate) fn disposer(&self) -> Option<&DisposeProbe> {
        match &self.kind {
            CallSiteKind::Constructor(site) | CallSiteKind::ParameterlessConstruct(site) => site.disposer.as_ref(),
            CallSiteKind::Factory(site) => site.factory.disposer(),
            _ => None,
        }
    }

    /// Short variant name used in logs and diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            CallSiteKind::Constant(_) => "constant",
            CallSiteKind::Constructor(_) => "constructor",
            CallSiteKind::ParameterlessConstruct(_) => "parameterless_construct",
            CallSiteKind::Factory(_) => "factory",
            CallSiteKind::Enumerable(_) => "enumerable",
            CallSiteKind::Container => "container",
            CallSiteKind::ScopeFactory => "scope_factory",
        }
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("CallSite");
        s.field("service_type", &self.service_type)
            .field("kind", &self.kind_name())
            .field("cache", &self.cache);
        if let Some(implementation) = &self.implementation_type {
            s.field("implementation_type", implementation);
        }
        match &self.kind {
            CallSiteKind::Constructor(site) => {
                s.field("arguments", &site.arguments);
            }
            CallSiteKind::Enumerable(site) => {
                s.field("elements", &site.elements);
            }
            _ => {}
        }
        s.finish()
    }
}
