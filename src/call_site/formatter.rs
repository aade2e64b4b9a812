//! JSON rendering of call-site trees for diagnostics.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use super::{CallSite, CallSiteKind, CallSiteVisitor};
use crate::key::CacheKey;

/// Renders a call-site tree as JSON.
///
/// Shared subtrees are expanded once; later occurrences only carry their
/// service type and a `"ref": true` marker.
///
/// ```rust
/// use ferrous_resolve::{CallSiteFormatter, ServiceCollection, ServiceType};
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(42u8);
/// let provider = services.build().unwrap();
///
/// let call_site = provider.describe_call_site(&ServiceType::of::<u8>()).unwrap().unwrap();
/// let json = CallSiteFormatter::format(&call_site);
/// assert_eq!(json["kind"], "constant");
/// ```
#[derive(Default)]
pub struct CallSiteFormatter {
    seen: Mutex<HashSet<CacheKey>>,
}

impl CallSiteFormatter {
    pub fn format(call_site: &Arc<CallSite>) -> Value {
        Self::default().visit_call_site(call_site, ())
    }

    pub fn format_pretty(call_site: &Arc<CallSite>) -> String {
        serde_json::to_string_pretty(&Self::format(call_site)).unwrap_or_default()
    }
}

impl CallSiteVisitor<(), Value> for CallSiteFormatter {
    fn visit_call_site(&self, call_site: &Arc<CallSite>, argument: ()) -> Value {
        let first_visit = self.seen.lock().insert(call_site.key().clone());
        if !first_visit && !matches!(call_site.kind(), CallSiteKind::Constant(_)) {
            return json!({ "service_type": call_site.service_type().to_string(), "ref": true });
        }
        self.visit_cache_location(call_site, argument)
    }

    fn visit_call_site_main(&self, call_site: &Arc<CallSite>, _argument: ()) -> Value {
        let mut node = json!({
            "service_type": call_site.service_type().to_string(),
            "kind": call_site.kind_name(),
            "cache": {
                "location": format!("{:?}", call_site.cache().location),
                "slot": call_site.key().slot,
            },
        });
        if let Some(implementation) = call_site.implementation_type() {
            node["implementation_type"] = json!(implementation.to_string());
        }
        match call_site.kind() {
            CallSiteKind::Constructor(site) => {
                node["arguments"] = site.arguments.iter().map(|a| self.visit_call_site(a, ())).collect();
            }
            CallSiteKind::Enumerable(site) => {
                node["element_type"] = json!(site.element_type.to_string());
                node["elements"] = site.elements.iter().map(|e| self.visit_call_site(e, ())).collect();
            }
            _ => {}
        }
        node
    }
}
