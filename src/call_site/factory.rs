//! The call-site graph builder.
//!
//! Turns descriptors into call sites: exact matches first (the most recent
//! registration shadows older ones), then open generics closed over the
//! requested type arguments, then enumerables collecting every matching
//! registration. Every call site built is memoized under its cache key, and
//! a failed build is never memoized.
//!
//! A registration's slot counts the registrations matching the same type
//! after it, exact and open generic alike, so a registration keeps one key
//! whether it is reached through single or enumerable resolution.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};

use super::{CallSite, CallSiteChain, CallSiteKind, EnumerableCallSite, FactoryCallSite};
use crate::descriptors::{Implementation, ServiceDescriptor};
use crate::error::{ChainVia, DiError, DiResult};
use crate::key::{CacheKey, CacheLocation, ResultCache};
use crate::metadata::{ConstructorInfo, ImplementationType, TypeMetadataProvider};
use crate::provider::{Scope, ScopeFactory};
use crate::service_type::ServiceType;

/// Slot of the most recent registration of a service type.
const DEFAULT_SLOT: usize = 0;

pub(crate) struct CallSiteFactory {
    descriptors: Vec<ServiceDescriptor>,
    lookup: HashMap<ServiceType, Vec<usize>>,
    types: Arc<dyn TypeMetadataProvider>,
    call_sites: RwLock<HashMap<CacheKey, Arc<CallSite>>>,
    // single-service call site per requested type
    services: RwLock<HashMap<ServiceType, Arc<CallSite>>>,
    // held for a whole build-or-fetch; re-entered by nested argument builds
    build_lock: ReentrantMutex<()>,
}

impl CallSiteFactory {
    /// Validates every descriptor and indexes them by service type.
    pub(crate) fn new(descriptors: Vec<ServiceDescriptor>, types: Arc<dyn TypeMetadataProvider>) -> DiResult<Self> {
        let mut lookup: HashMap<ServiceType, Vec<usize>> = HashMap::new();
        for (index, descriptor) in descriptors.iter().enumerate() {
            descriptor.validate(&*types)?;
            lookup.entry(descriptor.service_type().clone()).or_default().push(index);
        }

        let mut services = HashMap::new();
        for (service_type, kind) in [
            (Scope::service_type().clone(), CallSiteKind::Container),
            (ScopeFactory::service_type().clone(), CallSiteKind::ScopeFactory),
        ] {
            let cache = ResultCache::none(service_type.clone());
            services.insert(service_type.clone(), Arc::new(CallSite::new(service_type, None, cache, kind)));
        }

        Ok(Self {
            descriptors,
            lookup,
            types,
            call_sites: RwLock::new(HashMap::new()),
            services: RwLock::new(services),
            build_lock: ReentrantMutex::new(()),
        })
    }

    pub(crate) fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// Call site for `service_type` starting a fresh chain.
    pub(crate) fn call_site_for(&self, service_type: &ServiceType) -> DiResult<Option<Arc<CallSite>>> {
        self.get_call_site(service_type, &mut CallSiteChain::new())
    }

    /// Whether `service_type` could be resolved, without building anything.
    pub(crate) fn is_service(&self, service_type: &ServiceType) -> bool {
        if service_type.is_open_definition() || service_type.is_param() {
            return false;
        }
        if self.lookup.contains_key(service_type) {
            return true;
        }
        if let Some(element) = service_type.element_type() {
            return element.is_closed();
        }
        if let Some(definition) = service_type.generic_definition() {
            return self.lookup.contains_key(&definition);
        }
        self.services.read().contains_key(service_type)
    }

    pub(crate) fn get_call_site(
        &self,
        service_type: &ServiceType,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<CallSite>>> {
        if let Some(found) = self.services.read().get(service_type).cloned() {
            return Ok(Some(found));
        }
        self.create_call_site(service_type, chain)
    }

    fn memoized(&self, key: &CacheKey) -> Option<Arc<CallSite>> {
        self.call_sites.read().get(key).cloned()
    }

    fn memoize(&self, call_site: CallSite) -> Arc<CallSite> {
        let call_site = Arc::new(call_site);
        self.call_sites.write().insert(call_site.key().clone(), call_site.clone());
        call_site
    }

    fn create_call_site(
        &self,
        service_type: &ServiceType,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<CallSite>>> {
        let _build = self.build_lock.lock();
        if let Some(found) = self.services.read().get(service_type).cloned() {
            return Ok(Some(found));
        }

        chain.check_circular(service_type)?;
        chain.add(service_type, ChainVia::Unknown);
        let result = self.try_create(service_type, chain);
        chain.remove(service_type);

        if let Ok(Some(call_site)) = &result {
            self.services.write().insert(service_type.clone(), call_site.clone());
            tracing::debug!(
                service = %service_type,
                kind = call_site.kind_name(),
                location = ?call_site.cache().location,
                "built call site"
            );
        }
        result
    }

    fn try_create(&self, service_type: &ServiceType, chain: &mut CallSiteChain) -> DiResult<Option<Arc<CallSite>>> {
        if let Some(found) = self.try_create_exact(service_type, chain)? {
            return Ok(Some(found));
        }
        if let Some(found) = self.try_create_open_generic(service_type, chain)? {
            return Ok(Some(found));
        }
        self.try_create_enumerable(service_type, chain)
    }

    fn try_create_exact(&self, service_type: &ServiceType, chain: &mut CallSiteChain) -> DiResult<Option<Arc<CallSite>>> {
        match self.lookup.get(service_type).and_then(|indices| indices.last()) {
            Some(&index) => {
                let slot = self.slot_of(index, service_type)?;
                self.try_create_exact_descriptor(index, service_type, chain, slot)
            }
            None => Ok(None),
        }
    }

    fn try_create_exact_descriptor(
        &self,
        index: usize,
        service_type: &ServiceType,
        chain: &mut CallSiteChain,
        slot: usize,
    ) -> DiResult<Option<Arc<CallSite>>> {
        let descriptor = &self.descriptors[index];
        if descriptor.service_type() != service_type {
            return Ok(None);
        }
        let key = CacheKey::new(service_type.clone(), slot);
        if let Some(found) = self.memoized(&key) {
            return Ok(Some(found));
        }

        let cache = ResultCache::new(descriptor.lifetime(), service_type.clone(), slot);
        let call_site = match descriptor.implementation() {
            Implementation::Instance(value) => {
                chain.add(service_type, ChainVia::Instance);
                let cache = ResultCache { location: CacheLocation::None, key };
                CallSite::constant(service_type.clone(), value.clone(), cache)
            }
            Implementation::Factory(factory) => {
                chain.add(service_type, ChainVia::Factory);
                CallSite::new(
                    service_type.clone(),
                    None,
                    cache,
                    CallSiteKind::Factory(FactoryCallSite { factory: factory.clone() }),
                )
            }
            Implementation::Type(implementation) => {
                let meta = self.describe(implementation, service_type)?;
                self.create_constructor_call_site(cache, service_type, &meta, chain)?
            }
        };
        Ok(Some(self.memoize(call_site)))
    }

    fn try_create_open_generic(
        &self,
        service_type: &ServiceType,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<CallSite>>> {
        if service_type.is_open_definition() {
            return Ok(None);
        }
        let Some(indices) = service_type
            .generic_definition()
            .and_then(|definition| self.lookup.get(&definition))
        else {
            return Ok(None);
        };
        // most recent registration that can close the request wins
        for &index in indices.iter().rev() {
            if self.closes(index, service_type)? {
                let slot = self.slot_of(index, service_type)?;
                return self.try_create_open_generic_descriptor(index, service_type, chain, slot);
            }
        }
        Ok(None)
    }

    fn try_create_open_generic_descriptor(
        &self,
        index: usize,
        service_type: &ServiceType,
        chain: &mut CallSiteChain,
        slot: usize,
    ) -> DiResult<Option<Arc<CallSite>>> {
        let descriptor = &self.descriptors[index];
        if service_type.is_open_definition()
            || !service_type.is_closed()
            || service_type.generic_definition().as_ref() != Some(descriptor.service_type())
        {
            return Ok(None);
        }
        let key = CacheKey::new(service_type.clone(), slot);
        if let Some(found) = self.memoized(&key) {
            return Ok(Some(found));
        }

        let Some(definition) = descriptor.implementation_type() else {
            return Ok(None);
        };
        let meta = self.describe(definition, descriptor.service_type())?;
        let Some(closed) = meta.close_for(service_type, &*self.types) else {
            return Ok(None);
        };

        let cache = ResultCache::new(descriptor.lifetime(), service_type.clone(), slot);
        let call_site = self.create_constructor_call_site(cache, service_type, &closed, chain)?;
        Ok(Some(self.memoize(call_site)))
    }

    fn try_create_enumerable(
        &self,
        service_type: &ServiceType,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<CallSite>>> {
        let Some(element) = service_type.element_type() else {
            return Ok(None);
        };
        if !element.is_closed() {
            return Ok(None);
        }
        let key = CacheKey::new(service_type.clone(), DEFAULT_SLOT);
        if let Some(found) = self.memoized(&key) {
            return Ok(Some(found));
        }

        chain.add(service_type, ChainVia::Enumerable(element.clone()));
        chain.check_circular(element)?;
        chain.add(element, ChainVia::Unknown);
        let elements = self.collect_elements(element, chain);
        chain.remove(element);
        let elements = elements?;

        // cached only when every element shares a root or scope placement
        let common = elements
            .iter()
            .map(|e| e.cache().location)
            .fold(CacheLocation::Root, common_location);
        let location = match common {
            CacheLocation::Root | CacheLocation::Scope => common,
            _ => CacheLocation::None,
        };

        let call_site = CallSite::new(
            service_type.clone(),
            None,
            ResultCache { location, key },
            CallSiteKind::Enumerable(EnumerableCallSite { element_type: element.clone(), elements }),
        );
        Ok(Some(self.memoize(call_site)))
    }

    /// Element call sites for `element`, oldest registration first.
    fn collect_elements(&self, element: &ServiceType, chain: &mut CallSiteChain) -> DiResult<Vec<Arc<CallSite>>> {
        let mut elements = Vec::new();

        if element.generic_definition().is_none() {
            if let Some(indices) = self.lookup.get(element) {
                for (i, &index) in indices.iter().enumerate() {
                    let slot = indices.len() - i - 1;
                    if let Some(found) = self.try_create_exact_descriptor(index, element, chain, slot)? {
                        elements.push(found);
                    }
                }
            }
            return Ok(elements);
        }

        // constructed generics may come from exact or open registrations;
        // slots count matches from the most recent one
        let mut slot = DEFAULT_SLOT;
        for index in (0..self.descriptors.len()).rev() {
            let found = match self.try_create_exact_descriptor(index, element, chain, slot)? {
                Some(found) => Some(found),
                None => self.try_create_open_generic_descriptor(index, element, chain, slot)?,
            };
            if let Some(found) = found {
                slot += 1;
                elements.push(found);
            }
        }
        elements.reverse();
        Ok(elements)
    }

    /// Whether the open registration at `index` can be closed over `service_type`.
    fn closes(&self, index: usize, service_type: &ServiceType) -> DiResult<bool> {
        let descriptor = &self.descriptors[index];
        if service_type.is_open_definition()
            || !service_type.is_closed()
            || service_type.generic_definition().as_ref() != Some(descriptor.service_type())
        {
            return Ok(false);
        }
        let Some(definition) = descriptor.implementation_type() else {
            return Ok(false);
        };
        let meta = self.describe(definition, descriptor.service_type())?;
        Ok(meta.close_for(service_type, &*self.types).is_some())
    }

    /// Number of registrations after `index` that also produce `service_type`.
    fn slot_of(&self, index: usize, service_type: &ServiceType) -> DiResult<usize> {
        if service_type.generic_definition().is_none() {
            let later = self.lookup.get(service_type).map_or(0, |indices| {
                indices.iter().filter(|&&other| other > index).count()
            });
            return Ok(later);
        }
        let mut slot = DEFAULT_SLOT;
        for later in index + 1..self.descriptors.len() {
            if self.descriptors[later].service_type() == service_type || self.closes(later, service_type)? {
                slot += 1;
            }
        }
        Ok(slot)
    }

    fn create_constructor_call_site(
        &self,
        cache: ResultCache,
        service_type: &ServiceType,
        implementation: &ImplementationType,
        chain: &mut CallSiteChain,
    ) -> DiResult<CallSite> {
        let implementation_type = implementation.service_type();
        chain.add(service_type, ChainVia::Constructor(implementation_type.clone()));

        let (constructor, arguments) = match implementation.constructors() {
            [] => {
                return Err(DiError::NoConstructor { implementation: implementation_type.clone() });
            }
            [only] => {
                let arguments = self
                    .create_argument_call_sites(only, chain)?
                    .map_err(|parameter| DiError::Unresolvable {
                        parameter,
                        implementation: implementation_type.clone(),
                    })?;
                (only, arguments)
            }
            constructors => self.select_constructor(implementation_type, constructors, chain)?,
        };

        Ok(CallSite::constructor(
            cache,
            service_type.clone(),
            implementation_type.clone(),
            constructor.clone(),
            arguments,
            implementation.disposer().cloned(),
        ))
    }

    /// Picks the longest viable constructor; fails when a shorter viable one
    /// needs a parameter type the chosen one does not take.
    fn select_constructor<'c>(
        &self,
        implementation_type: &ServiceType,
        constructors: &'c [ConstructorInfo],
        chain: &mut CallSiteChain,
    ) -> DiResult<(&'c ConstructorInfo, Vec<Arc<CallSite>>)> {
        let mut ordered: Vec<&ConstructorInfo> = constructors.iter().collect();
        ordered.sort_by(|a, b| b.parameters().len().cmp(&a.parameters().len()));

        let mut best: Option<(&ConstructorInfo, Vec<Arc<CallSite>>)> = None;
        let mut best_types: Option<HashSet<&ServiceType>> = None;

        for candidate in ordered {
            let Ok(arguments) = self.create_argument_call_sites(candidate, chain)? else {
                continue;
            };
            match best.as_ref().map(|(chosen, _)| *chosen) {
                None => best = Some((candidate, arguments)),
                Some(chosen) => {
                    let types = best_types
                        .get_or_insert_with(|| chosen.parameters().iter().map(|p| p.service_type()).collect());
                    if candidate.parameters().iter().any(|p| !types.contains(p.service_type())) {
                        return Err(DiError::AmbiguousConstructor {
                            implementation: implementation_type.clone(),
                            first: chosen.signature(implementation_type),
                            second: candidate.signature(implementation_type),
                        });
                    }
                }
            }
        }

        best.ok_or_else(|| DiError::NoConstructor { implementation: implementation_type.clone() })
    }

    /// Argument call sites in parameter order, or the first parameter type
    /// that neither resolves nor declares a default.
    fn create_argument_call_sites(
        &self,
        constructor: &ConstructorInfo,
        chain: &mut CallSiteChain,
    ) -> DiResult<Result<Vec<Arc<CallSite>>, ServiceType>> {
        let mut arguments = Vec::with_capacity(constructor.parameters().len());
        for parameter in constructor.parameters() {
            let parameter_type = parameter.service_type();
            let call_site = match self.get_call_site(parameter_type, chain)? {
                Some(call_site) => call_site,
                None => match parameter.default_value() {
                    Some(default) => Arc::new(CallSite::constant(
                        parameter_type.clone(),
                        default.clone(),
                        ResultCache::none(parameter_type.clone()),
                    )),
                    None => return Ok(Err(parameter_type.clone())),
                },
            };
            arguments.push(call_site);
        }
        Ok(Ok(arguments))
    }

    fn describe(&self, implementation: &ServiceType, service_type: &ServiceType) -> DiResult<Arc<ImplementationType>> {
        self.types.describe(implementation).ok_or_else(|| DiError::InvalidRegistration {
            service: service_type.clone(),
            reason: format!("No type metadata is registered for '{}'.", implementation),
        })
    }
}

fn common_location(a: CacheLocation, b: CacheLocation) -> CacheLocation {
    fn rank(location: CacheLocation) -> u8 {
        match location {
            CacheLocation::Root => 0,
            CacheLocation::Scope => 1,
            CacheLocation::Dispose => 2,
            CacheLocation::None => 3,
        }
    }
    if rank(a) >= rank(b) {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifetime::Lifetime;
    use crate::metadata::{AnyArc, ConstructorInfo, TypeCatalog};

    fn factory(descriptors: Vec<ServiceDescriptor>, types: TypeCatalog) -> CallSiteFactory {
        CallSiteFactory::new(descriptors, Arc::new(types)).unwrap()
    }

    fn instance(name: &str, value: u32) -> ServiceDescriptor {
        ServiceDescriptor::instance(ServiceType::named(name), Arc::new(value))
    }

    #[test]
    fn enumerable_slots_count_back_from_the_most_recent_registration() {
        let f = factory(vec![instance("A", 1), instance("A", 2), instance("A", 3)], TypeCatalog::new());
        let all = f.call_site_for(&ServiceType::enumerable(ServiceType::named("A"))).unwrap().unwrap();

        let CallSiteKind::Enumerable(site) = all.kind() else { panic!("expected enumerable") };
        let slots: Vec<usize> = site.elements().iter().map(|e| e.key().slot).collect();
        assert_eq!(slots, [2, 1, 0]);

        let single = f.call_site_for(&ServiceType::named("A")).unwrap().unwrap();
        assert!(Arc::ptr_eq(&single, &site.elements()[2]));
    }

    #[test]
    fn enumerable_location_is_the_widest_element_location() {
        let mut types = TypeCatalog::new();
        types.register(
            crate::metadata::ImplementationType::class(ServiceType::named("Impl"))
                .constructor(ConstructorInfo::new([], |_| Ok(Arc::new(()) as AnyArc))),
        );
        let service = ServiceType::named("S");
        let with = |lifetime| ServiceDescriptor::with_type(service.clone(), ServiceType::named("Impl"), lifetime);

        let f = factory(vec![with(Lifetime::Singleton), with(Lifetime::Scoped)], types.clone());
        let all = f.call_site_for(&ServiceType::enumerable(service.clone())).unwrap().unwrap();
        assert_eq!(all.cache().location, CacheLocation::Scope);

        let f = factory(vec![with(Lifetime::Singleton), with(Lifetime::Transient)], types);
        let all = f.call_site_for(&ServiceType::enumerable(service.clone())).unwrap().unwrap();
        assert_eq!(all.cache().location, CacheLocation::None);
    }

    #[test]
    fn built_call_sites_are_memoized() {
        let f = factory(vec![instance("A", 1)], TypeCatalog::new());
        let first = f.call_site_for(&ServiceType::named("A")).unwrap().unwrap();
        let second = f.call_site_for(&ServiceType::named("A")).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(f.call_site_for(&ServiceType::named("B")).unwrap().is_none());
    }

    #[test]
    fn exact_registration_keeps_its_enumerable_slot() {
        let ping = ServiceType::generic("Handles", [ServiceType::named("Ping")]);
        let mut types = TypeCatalog::new();
        types.register(
            ImplementationType::class(ServiceType::definition("GenericHandler", 1))
                .implements(ServiceType::generic("Handles", [ServiceType::param(0)]))
                .constructor(ConstructorInfo::new([], |_| Ok(Arc::new(0u32) as AnyArc))),
        );
        let f = factory(
            vec![
                ServiceDescriptor::instance(ping.clone(), Arc::new(1u32)),
                ServiceDescriptor::with_type(
                    ServiceType::definition("Handles", 1),
                    ServiceType::definition("GenericHandler", 1),
                    Lifetime::Transient,
                ),
            ],
            types,
        );

        let single = f.call_site_for(&ping).unwrap().unwrap();
        assert_eq!(single.key().slot, 1);

        let all = f.call_site_for(&ServiceType::enumerable(ping)).unwrap().unwrap();
        let CallSiteKind::Enumerable(site) = all.kind() else {
            panic!("expected enumerable, got {}", all.kind_name());
        };
        let slots: Vec<usize> = site.elements().iter().map(|e| e.key().slot).collect();
        assert_eq!(slots, [1, 0]);
        assert!(Arc::ptr_eq(&single, &site.elements()[0]));
    }

    #[test]
    fn builtins_are_prepopulated() {
        let f = factory(Vec::new(), TypeCatalog::new());
        let container = f.call_site_for(Scope::service_type()).unwrap().unwrap();
        assert!(matches!(container.kind(), CallSiteKind::Container));
        assert!(f.is_service(ScopeFactory::service_type()));
    }
}
