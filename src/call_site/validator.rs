//! Lifetime validation: scoped services must not be captured by singletons
//! or resolved directly from the root scope.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{CallSite, CallSiteKind, CallSiteVisitor};
use crate::error::{DiError, DiResult};
use crate::key::CacheKey;
use crate::provider::ScopeFactory;
use crate::service_type::ServiceType;

/// Walks freshly built call sites and remembers, per cache key, the first
/// scoped service found in each tree.
#[derive(Default)]
pub(crate) struct CallSiteValidator {
    scoped_services: Mutex<HashMap<CacheKey, Option<ServiceType>>>,
}

/// Singleton whose tree is being walked, if any.
#[derive(Clone, Default)]
pub(crate) struct ValidatorState {
    singleton: Option<ServiceType>,
}

impl CallSiteValidator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn validate_call_site(&self, call_site: &Arc<CallSite>) -> DiResult<()> {
        self.visit_call_site(call_site, ValidatorState::default()).map(|_| ())
    }

    /// Rejects resolving a service whose tree contains a scoped service from
    /// the root scope.
    pub(crate) fn validate_resolution(&self, call_site: &CallSite, from_root: bool) -> DiResult<()> {
        if !from_root {
            return Ok(());
        }
        let scoped = self.scoped_services.lock().get(call_site.key()).cloned().flatten();
        match scoped {
            Some(scoped) if &scoped == call_site.service_type() => {
                Err(DiError::ScopedFromRoot { service: scoped })
            }
            Some(scoped) => Err(DiError::ScopedDependencyFromRoot {
                service: call_site.service_type().clone(),
                scoped,
            }),
            None => Ok(()),
        }
    }

    fn first_scoped<'a>(
        &self,
        children: impl IntoIterator<Item = &'a Arc<CallSite>>,
        state: &ValidatorState,
    ) -> DiResult<Option<ServiceType>> {
        let mut first = None;
        for child in children {
            let scoped = self.visit_call_site(child, state.clone())?;
            if first.is_none() {
                first = scoped;
            }
        }
        Ok(first)
    }
}

impl CallSiteVisitor<ValidatorState, DiResult<Option<ServiceType>>> for CallSiteValidator {
    fn visit_call_site(&self, call_site: &Arc<CallSite>, state: ValidatorState) -> DiResult<Option<ServiceType>> {
        let known = self.scoped_services.lock().get(call_site.key()).cloned();
        let scoped = match known {
            Some(scoped) => scoped,
            None => {
                let scoped = self.visit_cache_location(call_site, state.clone())?;
                self.scoped_services.lock().insert(call_site.key().clone(), scoped.clone());
                scoped
            }
        };

        if let (Some(scoped), Some(singleton)) = (&scoped, &state.singleton) {
            return Err(DiError::ScopedInSingleton { scoped: scoped.clone(), singleton: singleton.clone() });
        }
        Ok(scoped)
    }

    fn visit_root_cache(&self, call_site: &Arc<CallSite>, _state: ValidatorState) -> DiResult<Option<ServiceType>> {
        let state = ValidatorState { singleton: Some(call_site.service_type().clone()) };
        self.visit_call_site_main(call_site, state)
    }

    fn visit_scope_cache(&self, call_site: &Arc<CallSite>, state: ValidatorState) -> DiResult<Option<ServiceType>> {
        // singletons may hold a handle that creates scopes
        if creates_scopes(call_site) {
            return Ok(None);
        }
        if let Some(singleton) = &state.singleton {
            return Err(DiError::ScopedInSingleton {
                scoped: call_site.service_type().clone(),
                singleton: singleton.clone(),
            });
        }
        self.visit_call_site_main(call_site, state)?;
        Ok(Some(call_site.service_type().clone()))
    }

    fn visit_call_site_main(&self, call_site: &Arc<CallSite>, state: ValidatorState) -> DiResult<Option<ServiceType>> {
        match call_site.kind() {
            CallSiteKind::Constructor(site) => self.first_scoped(&site.arguments, &state),
            CallSiteKind::Enumerable(site) => self.first_scoped(&site.elements, &state),
            CallSiteKind::Constant(_)
            | CallSiteKind::ParameterlessConstruct(_)
            | CallSiteKind::Factory(_)
            | CallSiteKind::Container
            | CallSiteKind::ScopeFactory => Ok(None),
        }
    }
}

/// A scope factory, or a scoped node whose sole child is one.
fn creates_scopes(call_site: &CallSite) -> bool {
    let is_factory = |site: &CallSite| {
        matches!(site.kind(), CallSiteKind::ScopeFactory) || site.service_type() == ScopeFactory::service_type()
    };
    match call_site.kind() {
        CallSiteKind::Constructor(site) => matches!(site.arguments.as_slice(), [only] if is_factory(only)),
        _ => is_factory(call_site),
    }
}
