//! Tree-walking interpreter.

use std::sync::Arc;

use super::{activate, collect, container, invoke_factory, resolver_fn, scope_factory, RealizedService, ServiceProviderEngine};
use crate::call_site::{CallSite, CallSiteKind, CallSiteVisitor};
use crate::error::DiResult;
use crate::key::CacheLocation;
use crate::metadata::AnyArc;
use crate::provider::ScopeRef;

/// Construction locks already held further up the current resolution.
#[derive(Clone, Copy, Default)]
pub(crate) struct LockFlags {
    root: bool,
    scope: bool,
}

#[derive(Clone, Copy)]
pub(crate) struct RuntimeContext<'a> {
    scope: ScopeRef<'a>,
    locks: LockFlags,
}

/// Walks the call-site tree on every resolution. No warm-up cost.
pub(crate) struct RuntimeResolver;

impl RuntimeResolver {
    pub(crate) fn resolve(call_site: &Arc<CallSite>, scope: ScopeRef<'_>) -> DiResult<AnyArc> {
        if scope.is_root() && call_site.cache().location == CacheLocation::Root {
            if let Some(cached) = scope.cache().get(call_site.key()) {
                return Ok(cached);
            }
        }
        RuntimeResolver.visit_call_site(call_site, RuntimeContext { scope, locks: LockFlags::default() })
    }

    fn visit_cache(
        &self,
        call_site: &Arc<CallSite>,
        scope: ScopeRef<'_>,
        held: bool,
        locks: LockFlags,
    ) -> DiResult<AnyArc> {
        scope.cache().get_or_create(call_site.key(), held, || {
            let value = self.visit_call_site_main(call_site, RuntimeContext { scope, locks })?;
            scope.capture(&value, call_site.disposer())?;
            Ok(value)
        })
    }
}

impl ServiceProviderEngine for RuntimeResolver {
    fn realize(&self, call_site: &Arc<CallSite>) -> RealizedService {
        let call_site = call_site.clone();
        resolver_fn(move |scope| RuntimeResolver::resolve(&call_site, scope))
    }
}

impl<'a> CallSiteVisitor<RuntimeContext<'a>, DiResult<AnyArc>> for RuntimeResolver {
    fn visit_root_cache(&self, call_site: &Arc<CallSite>, context: RuntimeContext<'a>) -> DiResult<AnyArc> {
        let locks = LockFlags { root: true, ..context.locks };
        self.visit_cache(call_site, context.scope.root(), context.locks.root, locks)
    }

    fn visit_scope_cache(&self, call_site: &Arc<CallSite>, context: RuntimeContext<'a>) -> DiResult<AnyArc> {
        if context.scope.is_root() {
            return self.visit_root_cache(call_site, context);
        }
        let locks = LockFlags { scope: true, ..context.locks };
        self.visit_cache(call_site, context.scope, context.locks.scope, locks)
    }

    fn visit_dispose_cache(&self, call_site: &Arc<CallSite>, context: RuntimeContext<'a>) -> DiResult<AnyArc> {
        let value = self.visit_call_site_main(call_site, context)?;
        context.scope.capture(&value, call_site.disposer())?;
        Ok(value)
    }

    fn visit_call_site_main(&self, call_site: &Arc<CallSite>, context: RuntimeContext<'a>) -> DiResult<AnyArc> {
        match call_site.kind() {
            CallSiteKind::Constant(value) => Ok(value.clone()),
            CallSiteKind::Constructor(site) => {
                let values = site
                    .arguments
                    .iter()
                    .map(|argument| self.visit_call_site(argument, context))
                    .collect::<DiResult<Vec<_>>>()?;
                activate(call_site, site, values)
            }
            CallSiteKind::ParameterlessConstruct(site) => activate(call_site, site, Vec::new()),
            CallSiteKind::Factory(site) => invoke_factory(&site.factory, context.scope),
            CallSiteKind::Enumerable(site) => {
                let values = site
                    .elements
                    .iter()
                    .map(|element| self.visit_call_site(element, context))
                    .collect::<DiResult<Vec<_>>>()?;
                Ok(collect(values))
            }
            CallSiteKind::Container => Ok(container(context.scope)),
            CallSiteKind::ScopeFactory => Ok(scope_factory(context.scope)),
        }
    }
}
