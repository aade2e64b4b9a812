//! Instruction-emission engine.
//!
//! A call site is flattened once into a linear [`Program`]: a sequence of
//! [`Op`]s plus pools holding the constants, activators, factories, cache
//! keys and disposal probes they refer to. A small stack machine then runs
//! the program on every resolution with no recursion and no dispatch on the
//! call-site model.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::ReentrantMutexGuard;

use super::{collect, container, invoke_factory, resolver_fn, scope_factory, RealizedService, ServiceProviderEngine};
use crate::call_site::{CallSite, CallSiteKind, CallSiteVisitor};
use crate::descriptors::ServiceFactory;
use crate::error::{DiError, DiResult};
use crate::key::CacheKey;
use crate::metadata::{Activator, ActivationArgs, AnyArc, DisposeProbe};
use crate::provider::ScopeRef;
use crate::service_type::ServiceType;

pub(crate) struct EmitEngine;

impl ServiceProviderEngine for EmitEngine {
    fn realize(&self, call_site: &Arc<CallSite>) -> RealizedService {
        let program = Arc::new(Emitter::emit(call_site));
        tracing::debug!(
            service = %call_site.service_type(),
            ops = program.ops.len(),
            "emitted resolver program"
        );
        resolver_fn(move |scope| program.run(scope))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    /// Push `constants[i]`.
    Const(usize),
    /// Push a handle to the current scope.
    Scope,
    /// Push a scope factory.
    ScopeFactory,
    /// Pop `argc` values and push the result of `ctors[ctor]`.
    Construct { ctor: usize, argc: usize },
    /// Push the result of `factories[i]` run against the current scope.
    Invoke(usize),
    /// Pop `n` values and push them as one collection.
    Collect(usize),
    /// Look up `keys[key]` in the root (or current) scope cache. On a hit,
    /// push the value and jump `skip` ops ahead, past the matching
    /// `ExitCache`. On a miss, take the construction lock and make that
    /// scope current.
    EnterCache { key: usize, root: bool, skip: usize },
    /// Capture and cache the top of the stack, release the lock and restore
    /// the previous scope.
    ExitCache { key: usize, probe: Option<usize> },
    /// Capture the top of the stack as a disposable of the current scope.
    Capture(usize),
}

struct Program {
    service_type: ServiceType,
    ops: Vec<Op>,
    constants: Vec<AnyArc>,
    ctors: Vec<(ServiceType, Activator)>,
    factories: Vec<ServiceFactory>,
    keys: Vec<CacheKey>,
    probes: Vec<DisposeProbe>,
}

struct Frame<'a> {
    saved: ScopeRef<'a>,
    _sync: ReentrantMutexGuard<'a, ()>,
}

impl Program {
    fn run<'a>(&self, scope: ScopeRef<'a>) -> DiResult<AnyArc> {
        let mut stack: Vec<AnyArc> = Vec::with_capacity(8);
        let mut frames: Vec<Frame<'a>> = Vec::new();
        let mut current = scope;
        let mut pc = 0;

        while let Some(op) = self.ops.get(pc) {
            match *op {
                Op::Const(i) => stack.push(self.constants[i].clone()),
                Op::Scope => stack.push(container(current)),
                Op::ScopeFactory => stack.push(scope_factory(current)),
                Op::Construct { ctor, argc } => {
                    let values = self.pop_n(&mut stack, argc)?;
                    let (implementation, activator) = &self.ctors[ctor];
                    let value = activator(ActivationArgs::new(implementation.clone(), values))
                        .map_err(DiError::construction)?;
                    stack.push(value);
                }
                Op::Invoke(i) => stack.push(invoke_factory(&self.factories[i], current)?),
                Op::Collect(n) => {
                    let values = self.pop_n(&mut stack, n)?;
                    stack.push(collect(values));
                }
                Op::EnterCache { key, root, skip } => {
                    let target = if root || current.is_root() { current.root() } else { current };
                    let key = &self.keys[key];
                    if let Some(hit) = target.cache().get(key) {
                        stack.push(hit);
                        pc += skip + 1;
                        continue;
                    }
                    let sync = target.cache().lock();
                    if let Some(hit) = target.cache().get(key) {
                        drop(sync);
                        stack.push(hit);
                        pc += skip + 1;
                        continue;
                    }
                    frames.push(Frame { saved: current, _sync: sync });
                    current = target;
                }
                Op::ExitCache { key, probe } => {
                    let value = self.peek(&stack)?;
                    current.capture(&value, probe.map(|p| &self.probes[p]))?;
                    current.cache().insert(self.keys[key].clone(), value);
                    let frame = frames.pop().ok_or_else(|| self.malformed())?;
                    current = frame.saved;
                }
                Op::Capture(p) => {
                    let value = self.peek(&stack)?;
                    current.capture(&value, Some(&self.probes[p]))?;
                }
            }
            pc += 1;
        }

        stack.pop().ok_or_else(|| self.malformed())
    }

    fn pop_n(&self, stack: &mut Vec<AnyArc>, n: usize) -> DiResult<Vec<AnyArc>> {
        let at = stack.len().checked_sub(n).ok_or_else(|| self.malformed())?;
        Ok(stack.split_off(at))
    }

    fn peek(&self, stack: &[AnyArc]) -> DiResult<AnyArc> {
        stack.last().cloned().ok_or_else(|| self.malformed())
    }

    fn malformed(&self) -> DiError {
        DiError::InvalidRegistration {
            service: self.service_type.clone(),
            reason: "emitted resolver program is malformed".into(),
        }
    }
}

#[derive(Default)]
struct Emitter {
    program: RefCell<EmitState>,
}

#[derive(Default)]
struct EmitState {
    ops: Vec<Op>,
    constants: Vec<AnyArc>,
    ctors: Vec<(ServiceType, Activator)>,
    factories: Vec<ServiceFactory>,
    keys: Vec<CacheKey>,
    probes: Vec<DisposeProbe>,
}

impl Emitter {
    fn emit(call_site: &Arc<CallSite>) -> Program {
        let emitter = Emitter::default();
        emitter.visit_call_site(call_site, ());
        let state = emitter.program.into_inner();
        Program {
            service_type: call_site.service_type().clone(),
            ops: state.ops,
            constants: state.constants,
            ctors: state.ctors,
            factories: state.factories,
            keys: state.keys,
            probes: state.probes,
        }
    }

    fn push(&self, op: Op) -> usize {
        let mut state = self.program.borrow_mut();
        state.ops.push(op);
        state.ops.len() - 1
    }

    fn probe(&self, call_site: &CallSite) -> Option<usize> {
        let probe = call_site.disposer()?.clone();
        let mut state = self.program.borrow_mut();
        state.probes.push(probe);
        Some(state.probes.len() - 1)
    }

    fn emit_cached(&self, call_site: &Arc<CallSite>, root: bool) {
        let key = {
            let mut state = self.program.borrow_mut();
            state.keys.push(call_site.key().clone());
            state.keys.len() - 1
        };
        let enter = self.push(Op::EnterCache { key, root, skip: 0 });
        self.visit_call_site_main(call_site, ());
        let probe = self.probe(call_site);
        let exit = self.push(Op::ExitCache { key, probe });

        if let Op::EnterCache { skip, .. } = &mut self.program.borrow_mut().ops[enter] {
            *skip = exit - enter;
        }
    }
}

impl CallSiteVisitor<(), ()> for Emitter {
    fn visit_root_cache(&self, call_site: &Arc<CallSite>, _: ()) {
        self.emit_cached(call_site, true);
    }

    fn visit_scope_cache(&self, call_site: &Arc<CallSite>, _: ()) {
        self.emit_cached(call_site, false);
    }

    fn visit_dispose_cache(&self, call_site: &Arc<CallSite>, _: ()) {
        self.visit_call_site_main(call_site, ());
        if let Some(probe) = self.probe(call_site) {
            self.push(Op::Capture(probe));
        }
    }

    fn visit_call_site_main(&self, call_site: &Arc<CallSite>, _: ()) {
        match call_site.kind() {
            CallSiteKind::Constant(value) => {
                let index = {
                    let mut state = self.program.borrow_mut();
                    state.constants.push(value.clone());
                    state.constants.len() - 1
                };
                self.push(Op::Const(index));
            }
            CallSiteKind::Constructor(site) | CallSiteKind::ParameterlessConstruct(site) => {
                for argument in &site.arguments {
                    self.visit_call_site(argument, ());
                }
                let implementation = call_site
                    .implementation_type()
                    .unwrap_or_else(|| call_site.service_type())
                    .clone();
                let ctor = {
                    let mut state = self.program.borrow_mut();
                    state.ctors.push((implementation, site.constructor.activator().clone()));
                    state.ctors.len() - 1
                };
                self.push(Op::Construct { ctor, argc: site.arguments.len() });
            }
            CallSiteKind::Factory(site) => {
                let index = {
                    let mut state = self.program.borrow_mut();
                    state.factories.push(site.factory.clone());
                    state.factories.len() - 1
                };
                self.push(Op::Invoke(index));
            }
            CallSiteKind::Enumerable(site) => {
                for element in &site.elements {
                    self.visit_call_site(element, ());
                }
                self.push(Op::Collect(site.elements.len()));
            }
            CallSiteKind::Container => {
                self.push(Op::Scope);
            }
            CallSiteKind::ScopeFactory => {
                self.push(Op::ScopeFactory);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ResultCache;
    use crate::lifetime::Lifetime;
    use crate::metadata::ConstructorInfo;

    fn constructor(name: &str, lifetime: Lifetime, arguments: Vec<Arc<CallSite>>) -> Arc<CallSite> {
        let ty = ServiceType::named(name);
        Arc::new(CallSite::constructor(
            ResultCache::new(lifetime, ty.clone(), 0),
            ty.clone(),
            ty,
            ConstructorInfo::new([], |args| Ok(Arc::new(args.len()) as AnyArc)),
            arguments,
            None,
        ))
    }

    #[test]
    fn arguments_are_emitted_left_to_right_before_construction() {
        let a = constructor("A", Lifetime::Transient, Vec::new());
        let b = constructor("B", Lifetime::Transient, Vec::new());
        let top = constructor("Top", Lifetime::Transient, vec![a, b]);

        let program = Emitter::emit(&top);
        assert_eq!(
            program.ops,
            vec![
                Op::Construct { ctor: 0, argc: 0 },
                Op::Construct { ctor: 1, argc: 0 },
                Op::Construct { ctor: 2, argc: 2 },
            ]
        );
        assert_eq!(program.ctors[2].0.to_string(), "Top");
    }

    #[test]
    fn cached_nodes_jump_past_their_body() {
        let leaf = constructor("Leaf", Lifetime::Transient, Vec::new());
        let scoped = constructor("Scoped", Lifetime::Scoped, vec![leaf]);

        let program = Emitter::emit(&scoped);
        assert_eq!(
            program.ops,
            vec![
                Op::EnterCache { key: 0, root: false, skip: 3 },
                Op::Construct { ctor: 0, argc: 0 },
                Op::Construct { ctor: 1, argc: 1 },
                Op::ExitCache { key: 0, probe: None },
            ]
        );
    }

    #[test]
    fn enumerables_collect_their_elements() {
        let ty = ServiceType::enumerable(ServiceType::named("E"));
        let elements = vec![
            constructor("E", Lifetime::Transient, Vec::new()),
            constructor("E", Lifetime::Transient, Vec::new()),
        ];
        let site = Arc::new(CallSite::new(
            ty.clone(),
            None,
            ResultCache::none(ty.clone()),
            CallSiteKind::Enumerable(crate::call_site::EnumerableCallSite {
                element_type: ServiceType::named("E"),
                elements,
            }),
        ));
        let program = Emitter::emit(&site);
        assert_eq!(program.ops.last(), Some(&Op::Collect(2)));
    }
}
