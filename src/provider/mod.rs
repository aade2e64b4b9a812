//! The service provider: root scope, accessor table and resolution entry point.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::call_site::{CallSite, CallSiteFactory, CallSiteValidator};
use crate::engine::{create_engine, resolver_fn, RealizedService, RuntimeResolver, ServiceProviderEngine};
use crate::error::{DiError, DiResult};
use crate::internal::ResolutionGuard;
use crate::key::CacheLocation;
use crate::metadata::AnyArc;
use crate::observer::Observers;
use crate::options::ProviderOptions;
use crate::service_type::ServiceType;
use crate::traits::ResolverCore;

pub(crate) mod cache;
pub mod context;
pub mod scope;

pub use context::ResolverContext;
pub(crate) use scope::{ScopeRef, ScopeState};
pub use scope::{Scope, ScopeFactory};

/// Root of a built container.
///
/// Resolves services against the root scope, creates child scopes and owns
/// everything shared between them: the call-site memo, the realized
/// accessors and the singleton cache. Cloning is cheap and clones share the
/// same container.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() });
/// services.add_transient_factory::<UserService, _>(|resolver| UserService {
///     db: resolver.get_required::<Database>(),
/// });
///
/// let provider = services.build().unwrap();
/// let users = provider.get_required::<UserService>();
/// assert_eq!(users.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

#[derive(Clone)]
struct ServiceAccessor {
    call_site: Option<Arc<CallSite>>,
    realized: Option<RealizedService>,
}

pub(crate) struct ProviderInner {
    call_site_factory: CallSiteFactory,
    validator: Option<CallSiteValidator>,
    engine: Box<dyn ServiceProviderEngine>,
    accessors: RwLock<HashMap<ServiceType, ServiceAccessor>>,
    pub(crate) root: Arc<ScopeState>,
    pub(crate) observers: Observers,
    options: ProviderOptions,
}

impl ServiceProvider {
    pub(crate) fn new(
        call_site_factory: CallSiteFactory,
        observers: Observers,
        options: ProviderOptions,
    ) -> DiResult<Self> {
        let inner = Arc::new_cyclic(|weak| ProviderInner {
            call_site_factory,
            validator: options.validate_scopes.then(CallSiteValidator::new),
            engine: create_engine(options.execution_mode, weak.clone()),
            accessors: RwLock::new(HashMap::new()),
            root: Arc::new(ScopeState::new(true)),
            observers,
            options,
        });
        tracing::debug!(
            mode = ?inner.options.execution_mode,
            validate_scopes = inner.options.validate_scopes,
            descriptors = inner.call_site_factory.descriptors().len(),
            "service provider built"
        );

        if inner.options.validate_on_build {
            inner.validate_descriptors()?;
        }
        Ok(Self { inner })
    }

    #[inline]
    fn root_ref(&self) -> ScopeRef<'_> {
        ScopeRef::new(&self.inner, &self.inner.root)
    }

    /// Creates a child scope with its own scoped cache.
    pub fn create_scope(&self) -> Scope {
        Scope::new(self.inner.clone())
    }

    /// Handle to the root scope.
    pub fn root_scope(&self) -> Scope {
        self.root_ref().to_owned()
    }

    /// Whether `service_type` can be resolved, without constructing anything.
    pub fn is_service(&self, service_type: &ServiceType) -> bool {
        self.inner.call_site_factory.is_service(service_type)
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.inner.options
    }

    /// Disposes the root scope: every singleton and root-resolved disposable,
    /// in append order. Idempotent. Child scopes are disposed separately.
    pub fn dispose(&self) {
        self.inner.dispose_scope(&self.inner.root);
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.root.is_disposed()
    }

    /// The validated call site that resolves `service_type`, if any.
    pub fn describe_call_site(&self, service_type: &ServiceType) -> DiResult<Option<Arc<CallSite>>> {
        self.inner.build_call_site(service_type)
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve_service(&self, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        self.inner.resolve_in(self.root_ref(), service_type)
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("options", &self.inner.options)
            .field("descriptors", &self.inner.call_site_factory.descriptors().len())
            .field("realized", &self.inner.accessors.read().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl ProviderInner {
    /// Resolves `service_type` for the scope `scope`.
    pub(crate) fn resolve_in(self: &Arc<Self>, scope: ScopeRef<'_>, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        if self.root.is_disposed() {
            return Err(DiError::Disposed("service provider"));
        }
        if scope.state.is_disposed() {
            return Err(DiError::Disposed("scope"));
        }
        let _guard = ResolutionGuard::enter(service_type)?;

        if !self.observers.has_observers() {
            return self.resolve_accessor(scope, service_type);
        }
        self.observers.resolving(service_type);
        let started = Instant::now();
        let result = self.resolve_accessor(scope, service_type);
        self.observers.resolved(service_type, started.elapsed());
        result
    }

    fn resolve_accessor(self: &Arc<Self>, scope: ScopeRef<'_>, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        let accessor = self.get_accessor(service_type)?;
        let Some(realized) = accessor.realized else {
            return Ok(None);
        };
        if let (Some(validator), Some(call_site)) = (&self.validator, &accessor.call_site) {
            validator.validate_resolution(call_site, scope.is_root())?;
        }
        realized(scope).map(Some)
    }

    fn get_accessor(self: &Arc<Self>, service_type: &ServiceType) -> DiResult<ServiceAccessor> {
        if let Some(accessor) = self.accessors.read().get(service_type) {
            return Ok(accessor.clone());
        }
        let accessor = self.create_accessor(service_type)?;
        let mut accessors = self.accessors.write();
        // a provider disposed mid-build must not keep the accessor alive
        if self.root.is_disposed() {
            return Err(DiError::Disposed("service provider"));
        }
        Ok(accessors.entry(service_type.clone()).or_insert(accessor).clone())
    }

    fn create_accessor(self: &Arc<Self>, service_type: &ServiceType) -> DiResult<ServiceAccessor> {
        let Some(call_site) = self.build_call_site(service_type)? else {
            return Ok(ServiceAccessor { call_site: None, realized: None });
        };
        self.observers.call_site_built(service_type, call_site.cache().location);

        // singletons resolve once, up front, against the root scope
        if call_site.cache().location == CacheLocation::Root {
            let value = RuntimeResolver::resolve(&call_site, ScopeRef::new(self, &self.root))?;
            let cached = resolver_fn(move |_| Ok(value.clone()));
            return Ok(ServiceAccessor { call_site: Some(call_site), realized: Some(cached) });
        }

        let compiled = self.engine.realize(&call_site);
        Ok(ServiceAccessor { call_site: Some(call_site), realized: Some(compiled) })
    }

    /// Builds (or fetches) the call site and validates it when enabled.
    fn build_call_site(&self, service_type: &ServiceType) -> DiResult<Option<Arc<CallSite>>> {
        let Some(call_site) = self.call_site_factory.call_site_for(service_type)? else {
            return Ok(None);
        };
        if let Some(validator) = &self.validator {
            validator.validate_call_site(&call_site)?;
        }
        Ok(Some(call_site))
    }

    /// Swaps in a faster accessor for an already realized call site.
    pub(crate) fn replace_service_accessor(&self, call_site: &Arc<CallSite>, realized: RealizedService) {
        let service_type = call_site.service_type().clone();
        {
            let mut accessors = self.accessors.write();
            if self.root.is_disposed() {
                return;
            }
            accessors.insert(
                service_type.clone(),
                ServiceAccessor { call_site: Some(call_site.clone()), realized: Some(realized) },
            );
        }
        tracing::debug!(service = %service_type, "accessor replaced with compiled resolver");
        self.observers.promoted(&service_type);
    }

    pub(crate) fn dispose_scope(&self, state: &ScopeState) {
        if let Some(count) = state.dispose() {
            if state.is_root() {
                // realized singletons hold their values, and through them the
                // provider when a singleton keeps a `Scope`
                self.accessors.write().clear();
            }
            tracing::debug!(disposables = count, "scope disposed");
            self.observers.scope_disposed(count);
        }
    }

    /// Builds and validates every registration, collecting all failures.
    fn validate_descriptors(&self) -> DiResult<()> {
        let mut seen = std::collections::HashSet::new();
        let mut errors = Vec::new();
        for descriptor in self.call_site_factory.descriptors() {
            let service_type = descriptor.service_type();
            if service_type.is_open_definition() || !seen.insert(service_type.clone()) {
                continue;
            }
            // the enumerable form builds every registration of the type
            if let Err(err) = self.build_call_site(&ServiceType::enumerable(service_type.clone())) {
                errors.push(err);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            tracing::debug!(failures = errors.len(), "validation on build failed");
            Err(DiError::Build(errors))
        }
    }
}
