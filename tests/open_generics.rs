use ferrous_resolve::{
    AnyArc, ConstructorInfo, DiError, GenericParameter, ImplementationType, Lifetime, ParameterInfo, Resolver,
    ServiceCollection, ServiceType,
};
use std::sync::Arc;

/// What an activated generic implementation reports about itself.
#[derive(Debug)]
struct Closed {
    implementation: String,
    args: usize,
}

fn named(name: &str) -> ServiceType {
    ServiceType::named(name)
}

fn generic(name: &str, args: &[&str]) -> ServiceType {
    ServiceType::generic(name, args.iter().map(|a| ServiceType::named(*a)))
}

fn report(params: impl IntoIterator<Item = ParameterInfo>) -> ConstructorInfo {
    ConstructorInfo::new(params, |args| {
        Ok(Arc::new(Closed {
            implementation: args.implementation_type().to_string(),
            args: args.len(),
        }) as AnyArc)
    })
}

#[test]
fn test_open_generic_closes_on_request() {
    let mut sc = ServiceCollection::new();
    sc.register_type(ImplementationType::class(ServiceType::definition("List", 1)).constructor(report([])));
    sc.add_transient_type(ServiceType::definition("IList", 1), ServiceType::definition("List", 1));

    let sp = sc.build().unwrap();
    let ints = sp.get_as::<Closed>(&generic("IList", &["Int"])).unwrap();
    let strings = sp.get_as::<Closed>(&generic("IList", &["String"])).unwrap();

    assert_eq!(ints.implementation, "List<Int>");
    assert_eq!(strings.implementation, "List<String>");
}

#[test]
fn test_closed_constructor_parameters_are_substituted() {
    let mut sc = ServiceCollection::new();
    sc.add_instance(generic("Sink", &["Order"]), Arc::new("order sink"));
    sc.register_type(
        ImplementationType::class(ServiceType::definition("Handler", 1))
            .implements(ServiceType::generic("Handles", [ServiceType::param(0)]))
            .constructor(ConstructorInfo::new(
                [ParameterInfo::new("sink", ServiceType::generic("Sink", [ServiceType::param(0)]))],
                |args| Ok(args.arg::<&'static str>(0)? as AnyArc),
            )),
    );
    sc.add_scoped_type(ServiceType::definition("Handles", 1), ServiceType::definition("Handler", 1));

    let sp = sc.build().unwrap();
    let scope = sp.create_scope();
    assert_eq!(*scope.get_as::<&'static str>(&generic("Handles", &["Order"])).unwrap(), "order sink");

    match scope.resolve(&generic("Handles", &["Invoice"])) {
        Err(DiError::Unresolvable { parameter, implementation }) => {
            assert_eq!(parameter, generic("Sink", &["Invoice"]));
            assert_eq!(implementation, generic("Handler", &["Invoice"]));
        }
        other => panic!("expected Unresolvable, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_closed_generics_share_per_type_caches() {
    let mut sc = ServiceCollection::new();
    sc.register_type(ImplementationType::class(ServiceType::definition("Repo", 1)).constructor(report([])));
    sc.add_singleton_type(ServiceType::definition("Repo", 1), ServiceType::definition("Repo", 1));

    let sp = sc.build().unwrap();
    let users = generic("Repo", &["User"]);
    let orders = generic("Repo", &["Order"]);

    let a = sp.get_as::<Closed>(&users).unwrap();
    let b = sp.create_scope().get_as::<Closed>(&users).unwrap();
    let c = sp.get_as::<Closed>(&orders).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn test_constraint_failure_skips_descriptor() {
    let mut sc = ServiceCollection::new();
    sc.register_type(ImplementationType::class(named("Ping")).implements(named("Message")));
    sc.register_type(
        ImplementationType::class(ServiceType::definition("MessageHandler", 1))
            .generic_parameter(0, GenericParameter::new("T").constrained_to(named("Message")))
            .constructor(report([])),
    );
    sc.register_type(ImplementationType::class(ServiceType::definition("FallbackHandler", 1)).constructor(report([])));
    sc.add_transient_type(ServiceType::definition("Handler", 1), ServiceType::definition("FallbackHandler", 1));
    sc.add_transient_type(ServiceType::definition("Handler", 1), ServiceType::definition("MessageHandler", 1));

    let sp = sc.build().unwrap();

    // most recent registration wins when it can close the request
    let ping = sp.get_as::<Closed>(&generic("Handler", &["Ping"])).unwrap();
    assert_eq!(ping.implementation, "MessageHandler<Ping>");

    // otherwise the next older one is tried
    let other = sp.get_as::<Closed>(&generic("Handler", &["Int"])).unwrap();
    assert_eq!(other.implementation, "FallbackHandler<Int>");

    let all_ping = sp.get_all::<Closed>(&generic("Handler", &["Ping"])).unwrap();
    assert_eq!(all_ping.len(), 2);
    let all_int = sp.get_all::<Closed>(&generic("Handler", &["Int"])).unwrap();
    assert_eq!(all_int.len(), 1);
}

#[test]
fn test_constraint_referring_to_another_parameter() {
    // Converter<TFrom, TTo> where TFrom : Into<TTo>
    let mut sc = ServiceCollection::new();
    sc.register_type(
        ImplementationType::class(named("Celsius")).implements(ServiceType::generic("Into", [named("Kelvin")])),
    );
    sc.register_type(
        ImplementationType::class(ServiceType::definition("Converter", 2))
            .generic_parameter(
                0,
                GenericParameter::new("TFrom").constrained_to(ServiceType::generic("Into", [ServiceType::param(1)])),
            )
            .constructor(report([])),
    );
    sc.add_transient_type(ServiceType::definition("Convert", 2), ServiceType::definition("Converter", 2));

    let sp = sc.build().unwrap();
    assert!(sp.resolve(&generic("Convert", &["Celsius", "Kelvin"])).unwrap().is_some());
    assert!(sp.resolve(&generic("Convert", &["Celsius", "Fahrenheit"])).unwrap().is_none());
}

#[test]
fn test_partial_closure_through_implements_pattern() {
    // StringMap<TValue> : Map<String, TValue>
    let mut sc = ServiceCollection::new();
    sc.register_type(
        ImplementationType::class(ServiceType::definition("StringMap", 1))
            .implements(ServiceType::generic("Map", [named("String"), ServiceType::param(0)]))
            .constructor(report([])),
    );
    sc.add_transient_type(ServiceType::definition("Map", 2), ServiceType::definition("StringMap", 1));

    let sp = sc.build().unwrap();
    let closed = sp.get_as::<Closed>(&generic("Map", &["String", "Int"])).unwrap();
    assert_eq!(closed.implementation, "StringMap<Int>");
    assert_eq!(closed.args, 0);

    assert!(sp.resolve(&generic("Map", &["Int", "Int"])).unwrap().is_none());
}

#[test]
fn test_exact_registration_shadows_open_generic() {
    let mut sc = ServiceCollection::new();
    sc.register_type(ImplementationType::class(ServiceType::definition("List", 1)).constructor(report([])));
    sc.register_type(ImplementationType::class(named("SpecialList")).constructor(report([])));
    sc.add_transient_type(generic("IList", &["Int"]), named("SpecialList"));
    sc.add_transient_type(ServiceType::definition("IList", 1), ServiceType::definition("List", 1));

    let sp = sc.build().unwrap();
    assert_eq!(sp.get_as::<Closed>(&generic("IList", &["Int"])).unwrap().implementation, "SpecialList");
    assert_eq!(sp.get_as::<Closed>(&generic("IList", &["Byte"])).unwrap().implementation, "List<Byte>");
}

#[test]
fn test_open_service_requires_open_implementation() {
    let mut sc = ServiceCollection::new();
    sc.register_type(ImplementationType::class(named("Concrete")).constructor(report([])));
    sc.add_transient_type(ServiceType::definition("IList", 1), named("Concrete"));

    match sc.build() {
        Err(DiError::InvalidRegistration { service, reason }) => {
            assert_eq!(service, ServiceType::definition("IList", 1));
            assert!(reason.contains("open generic implementation"), "{}", reason);
        }
        other => panic!("expected InvalidRegistration, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_open_service_rejects_factories() {
    let mut sc = ServiceCollection::new();
    sc.add_factory(
        ServiceType::definition("IList", 1),
        ferrous_resolve::ServiceFactory::new(|_| Ok(Arc::new(()) as AnyArc)),
        Lifetime::Transient,
    );
    assert!(matches!(sc.build(), Err(DiError::InvalidRegistration { .. })));
}

#[test]
fn test_open_service_rejects_arity_mismatch() {
    let mut sc = ServiceCollection::new();
    sc.register_type(ImplementationType::class(ServiceType::definition("Pair", 2)).constructor(report([])));
    sc.add_transient_type(ServiceType::definition("IList", 1), ServiceType::definition("Pair", 2));

    match sc.build() {
        Err(DiError::InvalidRegistration { reason, .. }) => assert!(reason.contains("Arity"), "{}", reason),
        other => panic!("expected InvalidRegistration, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_open_definitions_cannot_be_resolved_directly() {
    let mut sc = ServiceCollection::new();
    sc.register_type(ImplementationType::class(ServiceType::definition("List", 1)).constructor(report([])));
    sc.add_transient_type(ServiceType::definition("IList", 1), ServiceType::definition("List", 1));

    let sp = sc.build().unwrap();
    assert!(sp.resolve(&ServiceType::definition("IList", 1)).unwrap().is_none());
    assert!(!sp.is_service(&ServiceType::definition("IList", 1)));
    assert!(sp.is_service(&generic("IList", &["Int"])));
}
