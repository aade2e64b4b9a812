//! Circular-dependency tracking while call sites are built.

use std::collections::HashMap;

use crate::error::{ChainHop, ChainVia, CircularDependency, DiError, DiResult};
use crate::internal::MAX_DEPTH;
use crate::service_type::ServiceType;

struct ChainEntry {
    order: usize,
    via: ChainVia,
}

/// Service types currently being built, in descent order.
///
/// One chain lives for one top-level build. The builder registers a type on
/// the way down, records how it will be produced once it knows, and removes
/// it on the way back up whether or not the build succeeded.
#[derive(Default)]
pub(crate) struct CallSiteChain {
    entries: HashMap<ServiceType, ChainEntry>,
}

impl CallSiteChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fails if `service_type` is already being built, or if the chain is too deep.
    pub(crate) fn check_circular(&self, service_type: &ServiceType) -> DiResult<()> {
        if self.entries.contains_key(service_type) {
            return Err(DiError::Circular(self.trace(service_type)));
        }
        if self.entries.len() >= MAX_DEPTH {
            return Err(DiError::DepthExceeded(self.entries.len()));
        }
        Ok(())
    }

    /// Registers `service_type`, or updates how it will be produced.
    pub(crate) fn add(&mut self, service_type: &ServiceType, via: ChainVia) {
        let order = self.entries.len();
        self.entries
            .entry(service_type.clone())
            .and_modify(|entry| entry.via = via.clone())
            .or_insert(ChainEntry { order, via });
    }

    pub(crate) fn remove(&mut self, service_type: &ServiceType) {
        self.entries.remove(service_type);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn trace(&self, repeated: &ServiceType) -> CircularDependency {
        let mut hops: Vec<(&ServiceType, &ChainEntry)> = self.entries.iter().collect();
        hops.sort_by_key(|(_, entry)| entry.order);

        let mut chain: Vec<ChainHop> = hops
            .into_iter()
            .map(|(service_type, entry)| ChainHop {
                service_type: service_type.clone(),
                via: entry.via.clone(),
            })
            .collect();
        chain.push(ChainHop { service_type: repeated.clone(), via: ChainVia::Unknown });

        CircularDependency { service: repeated.clone(), chain }
    }
}
