//! Resolver context handed to factories.

use super::scope::{Scope, ScopeRef};
use crate::error::DiResult;
use crate::metadata::AnyArc;
use crate::service_type::ServiceType;
use crate::traits::ResolverCore;

/// Context passed to factory functions for resolving dependencies.
///
/// Resolutions made through the context run against the scope that is
/// constructing the factory's value: the root scope for singletons, the
/// requesting scope otherwise.
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
/// assert_eq!(provider.get_required::<UserService>().db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    scope: ScopeRef<'a>,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(scope: ScopeRef<'a>) -> Self {
        Self { scope }
    }

    /// Owned handle to the scope this context resolves from.
    pub fn scope(&self) -> Scope {
        self.scope.to_owned()
    }

    /// Whether resolutions run against the root scope.
    pub fn is_root(&self) -> bool {
        self.scope.is_root()
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn resolve_service(&self, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        self.scope.provider.resolve_in(self.scope, service_type)
    }
}
