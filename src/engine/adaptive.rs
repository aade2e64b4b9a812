//! Adaptive engine: interpret first, promote hot services in the background.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use super::{resolver_fn, CompiledTreeEngine, RealizedService, RuntimeResolver, ServiceProviderEngine};
use crate::call_site::CallSite;
use crate::provider::ProviderInner;

/// Resolution count at which a service is compiled.
const PROMOTE_AFTER: usize = 2;

pub(crate) struct AdaptiveEngine {
    provider: Weak<ProviderInner>,
}

impl AdaptiveEngine {
    pub(crate) fn new(provider: Weak<ProviderInner>) -> Self {
        Self { provider }
    }
}

impl ServiceProviderEngine for AdaptiveEngine {
    fn realize(&self, call_site: &Arc<CallSite>) -> RealizedService {
        let call_site = call_site.clone();
        let provider = self.provider.clone();
        let calls = AtomicUsize::new(0);

        resolver_fn(move |scope| {
            // resolve before counting so compilation never observes a half-built singleton
            let value = RuntimeResolver::resolve(&call_site, scope)?;
            if calls.fetch_add(1, Ordering::AcqRel) + 1 == PROMOTE_AFTER {
                promote(call_site.clone(), provider.clone());
            }
            Ok(value)
        })
    }
}

fn promote(call_site: Arc<CallSite>, provider: Weak<ProviderInner>) {
    let service = call_site.service_type().clone();
    let spawned = std::thread::Builder::new()
        .name("ferrous-resolve-compile".into())
        .spawn(move || {
            let Some(provider) = provider.upgrade() else {
                return;
            };
            if provider.root.is_disposed() {
                return;
            }
            let compiled = CompiledTreeEngine.realize(&call_site);
            provider.replace_service_accessor(&call_site, compiled);
        });
    if let Err(err) = spawned {
        tracing::warn!(service = %service, error = %err, "could not spawn compilation thread; staying interpreted");
    }
}
