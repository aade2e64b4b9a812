//! Two-axis dispatch over call sites.
//!
//! Consumers dispatch first on cache location, to decide caching, then on
//! the call-site variant, to decide construction. Each consumer implements
//! [`CallSiteVisitor::visit_call_site_main`] as one `match` over
//! [`CallSiteKind`](super::CallSiteKind). It overrides a cache-location hook
//! only when that location needs special handling. The defaults delegate
//! straight to construction with no caching.

use std::sync::Arc;

use super::CallSite;
use crate::key::CacheLocation;

/// Visitor over a call-site tree carrying an argument of type `A`.
pub trait CallSiteVisitor<A, R> {
    /// Construction dispatch: one `match` over the call-site variant.
    fn visit_call_site_main(&self, call_site: &Arc<CallSite>, argument: A) -> R;

    /// Entry point. Consumers that memoize per call site override this and
    /// call [`CallSiteVisitor::visit_cache_location`] on a miss.
    fn visit_call_site(&self, call_site: &Arc<CallSite>, argument: A) -> R {
        self.visit_cache_location(call_site, argument)
    }

    /// Dispatches on the cache location.
    fn visit_cache_location(&self, call_site: &Arc<CallSite>, argument: A) -> R {
        match call_site.cache().location {
            CacheLocation::Root => self.visit_root_cache(call_site, argument),
            CacheLocation::Scope => self.visit_scope_cache(call_site, argument),
            CacheLocation::Dispose => self.visit_dispose_cache(call_site, argument),
            CacheLocation::None => self.visit_no_cache(call_site, argument),
        }
    }

    fn visit_root_cache(&self, call_site: &Arc<CallSite>, argument: A) -> R {
        self.visit_call_site_main(call_site, argument)
    }

    fn visit_scope_cache(&self, call_site: &Arc<CallSite>, argument: A) -> R {
        self.visit_call_site_main(call_site, argument)
    }

    fn visit_dispose_cache(&self, call_site: &Arc<CallSite>, argument: A) -> R {
        self.visit_call_site_main(call_site, argument)
    }

    fn visit_no_cache(&self, call_site: &Arc<CallSite>, argument: A) -> R {
        self.visit_call_site_main(call_site, argument)
    }
}
