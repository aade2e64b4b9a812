//! Resolution engines: interchangeable executors over the call-site model.
//!
//! Every engine turns a call site into a [`RealizedService`], a function from
//! a scope to the produced value. They differ only in how much work they do
//! up front:
//!
//! - [`RuntimeResolver`] walks the tree on every call.
//! - [`CompiledTreeEngine`] lowers the tree once into nested closures.
//! - [`EmitEngine`] emits a flat instruction sequence run by a small stack machine.
//! - [`AdaptiveEngine`] interprets, and promotes hot services to the
//!   compiled tree in the background.

use std::sync::{Arc, Weak};

use crate::call_site::{CallSite, ConstructorCallSite};
use crate::descriptors::ServiceFactory;
use crate::error::{DiError, DiResult};
use crate::metadata::{ActivationArgs, AnyArc};
use crate::options::ExecutionMode;
use crate::provider::{ProviderInner, ResolverContext, ScopeFactory, ScopeRef};

mod adaptive;
mod compiled;
mod emit;
mod interpreter;

pub(crate) use adaptive::AdaptiveEngine;
pub(crate) use compiled::CompiledTreeEngine;
pub(crate) use emit::EmitEngine;
pub(crate) use interpreter::RuntimeResolver;

/// A realized resolver for one call site.
pub(crate) type RealizedService = Arc<dyn for<'a> Fn(ScopeRef<'a>) -> DiResult<AnyArc> + Send + Sync>;

pub(crate) trait ServiceProviderEngine: Send + Sync {
    fn realize(&self, call_site: &Arc<CallSite>) -> RealizedService;
}

/// Boxes a closure as a [`RealizedService`].
#[inline]
pub(crate) fn resolver_fn<F>(f: F) -> RealizedService
where
    F: for<'a> Fn(ScopeRef<'a>) -> DiResult<AnyArc> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn create_engine(mode: ExecutionMode, provider: Weak<ProviderInner>) -> Box<dyn ServiceProviderEngine> {
    match mode {
        ExecutionMode::Interpreted => Box::new(RuntimeResolver),
        ExecutionMode::CompiledTree => Box::new(CompiledTreeEngine),
        ExecutionMode::BytecodeEmit => Box::new(EmitEngine),
        ExecutionMode::Adaptive => Box::new(AdaptiveEngine::new(provider)),
    }
}

/// Invokes a constructor with already evaluated arguments.
pub(crate) fn activate(call_site: &CallSite, site: &ConstructorCallSite, values: Vec<AnyArc>) -> DiResult<AnyArc> {
    let implementation = call_site
        .implementation_type()
        .unwrap_or_else(|| call_site.service_type())
        .clone();
    (site.constructor.activator())(ActivationArgs::new(implementation, values)).map_err(DiError::construction)
}

pub(crate) fn invoke_factory(factory: &ServiceFactory, scope: ScopeRef<'_>) -> DiResult<AnyArc> {
    factory.invoke(&ResolverContext::new(scope))
}

pub(crate) fn container(scope: ScopeRef<'_>) -> AnyArc {
    Arc::new(scope.to_owned())
}

pub(crate) fn scope_factory(scope: ScopeRef<'_>) -> AnyArc {
    Arc::new(ScopeFactory::new(Arc::downgrade(scope.provider)))
}

pub(crate) fn collect(values: Vec<AnyArc>) -> AnyArc {
    Arc::new(values)
}
