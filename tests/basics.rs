use ferrous_resolve::{
    AnyArc, BoxError, DiError, Lifetime, Resolver, Scope, ScopeFactory, ServiceCollection, ServiceFactory,
    ServiceType,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_concrete_singleton() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton(42usize);
    sc.add_singleton("hello".to_string());

    let sp = sc.build().unwrap();

    let num1 = sp.get_required::<usize>();
    let num2 = sp.get_required::<usize>();
    let str1 = sp.get_required::<String>();
    let str2 = sp.get_required::<String>();

    assert_eq!(*num1, 42);
    assert_eq!(*str1, "hello");
    assert!(Arc::ptr_eq(&num1, &num2));
    assert!(Arc::ptr_eq(&str1, &str2));
}

#[test]
fn test_unregistered_service() {
    let sp = ServiceCollection::new().build().unwrap();

    assert!(sp.resolve(&ServiceType::named("Missing")).unwrap().is_none());
    assert!(sp.try_get::<u32>().unwrap().is_none());
    match sp.get::<u32>() {
        Err(DiError::NotFound(service)) => assert_eq!(service, ServiceType::of::<u32>()),
        other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_factory_with_dependencies() {
    struct Config {
        port: u16,
    }

    struct Server {
        config: Arc<Config>,
        name: String,
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton(Config { port: 8080 });
    sc.add_singleton_factory::<Server, _>(|r| Server {
        config: r.get_required::<Config>(),
        name: "MyServer".to_string(),
    });

    let sp = sc.build().unwrap();
    let server = sp.get_required::<Server>();

    assert_eq!(server.config.port, 8080);
    assert_eq!(server.name, "MyServer");
}

#[test]
fn test_transient_creates_new_instances() {
    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<String, _>(move |_| {
        let n = c.fetch_add(1, Ordering::SeqCst) + 1;
        format!("instance-{}", n)
    });

    let sp = sc.build().unwrap();
    let first = sp.get_required::<String>();
    let second = sp.get_required::<String>();

    assert_eq!(*first, "instance-1");
    assert_eq!(*second, "instance-2");
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_singleton_factory_runs_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory::<u64, _>(move |_| c.fetch_add(1, Ordering::SeqCst) as u64);

    let sp = sc.build().unwrap();
    let scope = sp.create_scope();
    let a = sp.get_required::<u64>();
    let b = scope.get_required::<u64>();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_last_registration_wins() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton(1u8);
    sc.add_singleton(2u8);
    sc.add_singleton(3u8);

    let sp = sc.build().unwrap();
    assert_eq!(*sp.get_required::<u8>(), 3);
}

#[test]
fn test_named_instance_registration() {
    let port = ServiceType::named("Port");
    let mut sc = ServiceCollection::new();
    sc.add_instance(port.clone(), Arc::new(8080u16));

    let sp = sc.build().unwrap();
    assert_eq!(*sp.get_as::<u16>(&port).unwrap(), 8080);
    assert!(sp.is_service(&port));
    assert!(!sp.is_service(&ServiceType::named("Host")));
}

#[test]
fn test_type_mismatch_is_reported() {
    let port = ServiceType::named("Port");
    let mut sc = ServiceCollection::new();
    sc.add_instance(port.clone(), Arc::new(8080u16));

    let sp = sc.build().unwrap();
    match sp.get_as::<String>(&port) {
        Err(DiError::TypeMismatch { service, .. }) => assert_eq!(service, port),
        other => panic!("expected TypeMismatch, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_factory_error_is_preserved() {
    #[derive(Debug)]
    struct Unreachable;

    impl std::fmt::Display for Unreachable {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("database unreachable")
        }
    }

    impl std::error::Error for Unreachable {}

    let db = ServiceType::named("Database");
    let mut sc = ServiceCollection::new();
    sc.add_factory(
        db.clone(),
        ServiceFactory::new(|_| Err(Box::new(Unreachable) as BoxError)),
        Lifetime::Transient,
    );

    let sp = sc.build().unwrap();
    let err = sp.resolve_required(&db).unwrap_err();
    assert_eq!(err.to_string(), "database unreachable");
    assert!(err.downcast_construction_ref::<Unreachable>().is_some());
}

#[test]
fn test_nested_resolution_error_passes_through_factory() {
    let outer = ServiceType::named("Outer");
    let mut sc = ServiceCollection::new();
    sc.add_factory(
        outer.clone(),
        ServiceFactory::new(|r| {
            let inner = r.resolve_required(&ServiceType::named("Inner"))?;
            Ok(inner as AnyArc)
        }),
        Lifetime::Transient,
    );

    let sp = sc.build().unwrap();
    match sp.resolve_required(&outer) {
        Err(DiError::NotFound(service)) => assert_eq!(service.to_string(), "Inner"),
        other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_failed_singleton_is_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let a = attempts.clone();
    let flaky = ServiceType::named("Flaky");

    let mut sc = ServiceCollection::new();
    sc.add_factory(
        flaky.clone(),
        ServiceFactory::new(move |_| {
            if a.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("first attempt fails".into())
            } else {
                Ok(Arc::new(7u32) as AnyArc)
            }
        }),
        Lifetime::Singleton,
    );

    let sp = sc.build().unwrap();
    assert!(sp.resolve_required(&flaky).is_err());
    assert_eq!(*sp.get_as::<u32>(&flaky).unwrap(), 7);
    assert_eq!(*sp.get_as::<u32>(&flaky).unwrap(), 7);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_container_resolves_requesting_scope() {
    let sp = ServiceCollection::new().build().unwrap();
    let scope = sp.create_scope();

    let from_scope = scope.get_as::<Scope>(Scope::service_type()).unwrap();
    assert!(!from_scope.is_root());

    let from_root = sp.get_as::<Scope>(Scope::service_type()).unwrap();
    assert!(from_root.is_root());
}

#[test]
fn test_scope_factory_creates_scopes() {
    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();

    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<usize, _>(move |_| c.fetch_add(1, Ordering::SeqCst));

    let sp = sc.build().unwrap();
    let factory = sp.get_as::<ScopeFactory>(ScopeFactory::service_type()).unwrap();
    let first = factory.create_scope().unwrap();
    let second = factory.create_scope().unwrap();

    assert_ne!(*first.get_required::<usize>(), *second.get_required::<usize>());
    assert!(sp.is_service(ScopeFactory::service_type()));
}
