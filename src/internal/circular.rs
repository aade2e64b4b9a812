//! Runtime re-entrance detection and recursion bound.
//!
//! The call-site chain catches cycles between constructors while graphs are
//! built, but factories resolve their dependencies at run time, out of the
//! builder's sight. This guard tracks the service types being resolved on
//! the current thread so a factory that (transitively) resolves itself fails
//! with a circular-dependency error instead of recursing until the stack
//! overflows.

use std::cell::RefCell;

use crate::error::{ChainHop, ChainVia, CircularDependency, DiError, DiResult};
use crate::service_type::ServiceType;

/// Deepest nesting of top-level resolutions allowed on one thread.
pub(crate) const MAX_DEPTH: usize = 256;

thread_local! {
    static RESOLVING: RefCell<Vec<ServiceType>> = const { RefCell::new(Vec::new()) };
}

/// Keeps `service_type` on the thread's resolution stack while alive.
pub(crate) struct ResolutionGuard {
    _private: (),
}

impl ResolutionGuard {
    /// Pushes `service_type`, failing if it is already being resolved on
    /// this thread.
    ///
    /// The stack is keyed by service type only, not by scope: a factory that
    /// creates a fresh child scope and resolves its own service type there is
    /// reported as circular too.
    pub(crate) fn enter(service_type: &ServiceType) -> DiResult<Self> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();

            // circular detection before pushing
            if stack.iter().any(|resolving| resolving == service_type) {
                let chain = stack
                    .iter()
                    .chain(std::iter::once(service_type))
                    .map(|ty| ChainHop { service_type: ty.clone(), via: ChainVia::Unknown })
                    .collect();
                return Err(DiError::Circular(CircularDependency {
                    service: service_type.clone(),
                    chain,
                }));
            }

            if stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(stack.len()));
            }

            stack.push(service_type.clone());
            Ok(Self { _private: () })
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
