//! Scopes: execution contexts with their own scoped cache and disposables.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::cache::ScopeCache;
use super::ProviderInner;
use crate::error::{DiError, DiResult};
use crate::internal::DisposeBag;
use crate::metadata::{AnyArc, DisposeProbe};
use crate::service_type::ServiceType;
use crate::traits::ResolverCore;

/// State owned by one scope. The root scope's state lives in the provider.
pub(crate) struct ScopeState {
    is_root: bool,
    cache: ScopeCache,
    disposables: Mutex<DisposeBag>,
    disposed: AtomicBool,
}

impl ScopeState {
    pub(crate) fn new(is_root: bool) -> Self {
        Self {
            is_root,
            cache: ScopeCache::new(),
            disposables: Mutex::new(DisposeBag::default()),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn cache(&self) -> &ScopeCache {
        &self.cache
    }

    pub(crate) fn is_root(&self) -> bool {
        self.is_root
    }

    #[inline]
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Appends `value` to the disposables if `probe` recognizes it.
    ///
    /// A value produced after the scope was disposed is disposed on the spot.
    pub(crate) fn capture(&self, value: &AnyArc, probe: Option<&DisposeProbe>) -> DiResult<()> {
        let Some(disposable) = probe.and_then(|probe| probe(value)) else {
            return Ok(());
        };
        let mut bag = self.disposables.lock();
        if self.is_disposed() {
            drop(bag);
            disposable.dispose();
            return Err(DiError::Disposed(self.kind()));
        }
        bag.push(disposable);
        Ok(())
    }

    /// Disposes captured values in append order. Returns how many were
    /// disposed, or `None` if the scope was already disposed.
    pub(crate) fn dispose(&self) -> Option<usize> {
        let items = {
            let mut bag = self.disposables.lock();
            if self.disposed.swap(true, Ordering::AcqRel) {
                return None;
            }
            bag.take()
        };
        let count = items.len();
        for item in items {
            item.dispose();
        }
        self.cache.clear();
        Some(count)
    }

    fn kind(&self) -> &'static str {
        if self.is_root {
            "service provider"
        } else {
            "scope"
        }
    }
}

impl Drop for ScopeState {
    fn drop(&mut self) {
        let pending = self.disposables.get_mut().len();
        if pending > 0 && !*self.disposed.get_mut() {
            tracing::warn!(
                pending,
                root = self.is_root,
                "scope dropped with undisposed resources; call dispose() before dropping"
            );
        }
    }
}

static SCOPE_TYPE: Lazy<ServiceType> = Lazy::new(ServiceType::of::<Scope>);
static SCOPE_FACTORY_TYPE: Lazy<ServiceType> = Lazy::new(ServiceType::of::<ScopeFactory>);

/// Borrowed handle to a scope, threaded through the engines.
#[derive(Clone, Copy)]
pub(crate) struct ScopeRef<'a> {
    pub(crate) provider: &'a Arc<ProviderInner>,
    pub(crate) state: &'a Arc<ScopeState>,
}

impl<'a> ScopeRef<'a> {
    pub(crate) fn new(provider: &'a Arc<ProviderInner>, state: &'a Arc<ScopeState>) -> Self {
        Self { provider, state }
    }

    /// The root scope of the same provider.
    #[inline]
    pub(crate) fn root(self) -> ScopeRef<'a> {
        ScopeRef { provider: self.provider, state: &self.provider.root }
    }

    #[inline]
    pub(crate) fn is_root(self) -> bool {
        Arc::ptr_eq(self.state, &self.provider.root)
    }

    #[inline]
    pub(crate) fn cache(self) -> &'a ScopeCache {
        self.state.cache()
    }

    pub(crate) fn capture(self, value: &AnyArc, probe: Option<&DisposeProbe>) -> DiResult<()> {
        self.state.capture(value, probe)
    }

    pub(crate) fn to_owned(self) -> Scope {
        Scope { provider: self.provider.clone(), state: self.state.clone() }
    }
}

/// A child execution context of a [`ServiceProvider`](super::ServiceProvider).
///
/// Scoped services are cached per scope; singletons always come from the
/// root. Values implementing a disposal contract that the scope produced are
/// disposed, in creation order, when the scope is disposed. Clones share the
/// same state.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{Resolver, ServiceCollection};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// struct RequestId(usize);
///
/// let counter = Arc::new(AtomicUsize::new(0));
/// let mut services = ServiceCollection::new();
/// let c = counter.clone();
/// services.add_scoped_factory::<RequestId, _>(move |_| RequestId(c.fetch_add(1, Ordering::SeqCst)));
///
/// let provider = services.build().unwrap();
/// let first = provider.create_scope();
/// let second = provider.create_scope();
///
/// assert!(Arc::ptr_eq(&first.get::<RequestId>().unwrap(), &first.get::<RequestId>().unwrap()));
/// assert_ne!(first.get::<RequestId>().unwrap().0, second.get::<RequestId>().unwrap().0);
/// ```
#[derive(Clone)]
pub struct Scope {
    pub(crate) provider: Arc<ProviderInner>,
    pub(crate) state: Arc<ScopeState>,
}

impl Scope {
    pub(crate) fn new(provider: Arc<ProviderInner>) -> Self {
        Self { provider, state: Arc::new(ScopeState::new(false)) }
    }

    /// Service type under which the requesting scope resolves itself.
    pub fn service_type() -> &'static ServiceType {
        &SCOPE_TYPE
    }

    #[inline]
    pub(crate) fn scope_ref(&self) -> ScopeRef<'_> {
        ScopeRef::new(&self.provider, &self.state)
    }

    /// Creates another scope of the same provider.
    pub fn create_scope(&self) -> Scope {
        Scope::new(self.provider.clone())
    }

    /// Whether this handle refers to the provider's root scope.
    pub fn is_root(&self) -> bool {
        self.scope_ref().is_root()
    }

    /// Disposes every captured disposable in append order. Idempotent.
    pub fn dispose(&self) {
        self.provider.dispose_scope(&self.state);
    }

    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }
}

impl ResolverCore for Scope {
    fn resolve_service(&self, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        self.provider.resolve_in(self.scope_ref(), service_type)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("root", &self.is_root())
            .field("disposed", &self.is_disposed())
            .field("cached", &self.state.cache().len())
            .finish()
    }
}

/// Handle that creates scopes, resolvable as `ServiceType::of::<ScopeFactory>()`.
///
/// It holds the provider weakly, so a singleton keeping one does not keep the
/// provider alive.
#[derive(Clone)]
pub struct ScopeFactory {
    provider: Weak<ProviderInner>,
}

impl ScopeFactory {
    pub(crate) fn new(provider: Weak<ProviderInner>) -> Self {
        Self { provider }
    }

    /// Service type under which the scope factory resolves.
    pub fn service_type() -> &'static ServiceType {
        &SCOPE_FACTORY_TYPE
    }

    pub fn create_scope(&self) -> DiResult<Scope> {
        let provider = self.provider.upgrade().ok_or(DiError::Disposed("service provider"))?;
        if provider.root.is_disposed() {
            return Err(DiError::Disposed("service provider"));
        }
        Ok(Scope::new(provider))
    }
}
