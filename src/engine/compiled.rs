//! Compiled-tree engine: lowers a call site once into nested closures.

use std::sync::Arc;

use super::{collect, container, invoke_factory, resolver_fn, scope_factory, RealizedService, ServiceProviderEngine};
use crate::call_site::{CallSite, CallSiteKind, CallSiteVisitor};
use crate::error::{DiError, DiResult};
use crate::metadata::{ActivationArgs, AnyArc};
use crate::provider::ScopeRef;

/// Builds one closure per call-site node. Subsequent resolutions only call
/// closures; no dispatch on the call-site model remains.
pub(crate) struct CompiledTreeEngine;

impl ServiceProviderEngine for CompiledTreeEngine {
    fn realize(&self, call_site: &Arc<CallSite>) -> RealizedService {
        tracing::debug!(service = %call_site.service_type(), "compiling call site tree");
        TreeCompiler.visit_call_site(call_site, ())
    }
}

struct TreeCompiler;

impl TreeCompiler {
    fn cached(call_site: &Arc<CallSite>, body: RealizedService, root_only: bool) -> RealizedService {
        let key = call_site.key().clone();
        let disposer = call_site.disposer().cloned();
        resolver_fn(move |scope: ScopeRef<'_>| {
            let target = if root_only || scope.is_root() { scope.root() } else { scope };
            target.cache().get_or_create(&key, false, || {
                let value = body(target)?;
                target.capture(&value, disposer.as_ref())?;
                Ok(value)
            })
        })
    }

    fn evaluate_all(nodes: &[RealizedService], scope: ScopeRef<'_>) -> DiResult<Vec<AnyArc>> {
        let mut values = Vec::with_capacity(nodes.len());
        for node in nodes {
            values.push(node(scope)?);
        }
        Ok(values)
    }
}

impl CallSiteVisitor<(), RealizedService> for TreeCompiler {
    fn visit_root_cache(&self, call_site: &Arc<CallSite>, _: ()) -> RealizedService {
        Self::cached(call_site, self.visit_call_site_main(call_site, ()), true)
    }

    fn visit_scope_cache(&self, call_site: &Arc<CallSite>, _: ()) -> RealizedService {
        Self::cached(call_site, self.visit_call_site_main(call_site, ()), false)
    }

    fn visit_dispose_cache(&self, call_site: &Arc<CallSite>, _: ()) -> RealizedService {
        let body = self.visit_call_site_main(call_site, ());
        let Some(disposer) = call_site.disposer().cloned() else {
            return body;
        };
        resolver_fn(move |scope| {
            let value = body(scope)?;
            scope.capture(&value, Some(&disposer))?;
            Ok(value)
        })
    }

    fn visit_call_site_main(&self, call_site: &Arc<CallSite>, _: ()) -> RealizedService {
        match call_site.kind() {
            CallSiteKind::Constant(value) => {
                let value = value.clone();
                resolver_fn(move |_| Ok(value.clone()))
            }
            CallSiteKind::Constructor(site) | CallSiteKind::ParameterlessConstruct(site) => {
                let arguments: Vec<RealizedService> =
                    site.arguments.iter().map(|a| self.visit_call_site(a, ())).collect();
                let activator = site.constructor.activator().clone();
                let implementation = call_site
                    .implementation_type()
                    .unwrap_or_else(|| call_site.service_type())
                    .clone();
                resolver_fn(move |scope| {
                    let values = Self::evaluate_all(&arguments, scope)?;
                    activator(ActivationArgs::new(implementation.clone(), values)).map_err(DiError::construction)
                })
            }
            CallSiteKind::Factory(site) => {
                let factory = site.factory.clone();
                resolver_fn(move |scope| invoke_factory(&factory, scope))
            }
            CallSiteKind::Enumerable(site) => {
                let elements: Vec<RealizedService> =
                    site.elements.iter().map(|e| self.visit_call_site(e, ())).collect();
                resolver_fn(move |scope| Ok(collect(Self::evaluate_all(&elements, scope)?)))
            }
            CallSiteKind::Container => resolver_fn(|scope| Ok(container(scope))),
            CallSiteKind::ScopeFactory => resolver_fn(|scope| Ok(scope_factory(scope))),
        }
    }
}
