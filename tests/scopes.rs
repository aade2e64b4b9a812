use ferrous_resolve::{
    AnyArc, ConstructorInfo, ImplementationType, Lifetime, ParameterInfo, Resolver, ServiceCollection, ServiceType,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_scoped_lifetime() {
    struct RequestId(usize);

    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();

    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<RequestId, _>(move |_| RequestId(c.fetch_add(1, Ordering::SeqCst)));

    let sp = sc.build().unwrap();
    let scope1 = sp.create_scope();
    let scope2 = sp.create_scope();

    let a1 = scope1.get_required::<RequestId>();
    let a2 = scope1.get_required::<RequestId>();
    let b1 = scope2.get_required::<RequestId>();

    assert!(Arc::ptr_eq(&a1, &a2));
    assert!(!Arc::ptr_eq(&a1, &b1));
    assert_ne!(a1.0, b1.0);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_scoped_from_root_without_validation_behaves_as_singleton() {
    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();

    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<usize, _>(move |_| c.fetch_add(1, Ordering::SeqCst));

    let sp = sc.build().unwrap();
    let a = sp.get_required::<usize>();
    let b = sp.get_required::<usize>();
    let in_scope = sp.create_scope().get_required::<usize>();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &in_scope));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_scoped_with_singleton_dependency() {
    struct Config {
        name: &'static str,
    }

    struct Session {
        config: Arc<Config>,
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton(Config { name: "shared" });
    sc.add_scoped_factory::<Session, _>(|r| Session { config: r.get_required::<Config>() });

    let sp = sc.build().unwrap();
    let s1 = sp.create_scope().get_required::<Session>();
    let s2 = sp.create_scope().get_required::<Session>();

    assert!(!Arc::ptr_eq(&s1, &s2));
    assert!(Arc::ptr_eq(&s1.config, &s2.config));
    assert_eq!(s1.config.name, "shared");
}

#[test]
fn test_scoped_depending_on_scoped() {
    let unit_of_work = ServiceType::named("UnitOfWork");
    let repository = ServiceType::named("Repository");

    let mut sc = ServiceCollection::new();
    sc.register_type(
        ImplementationType::class(unit_of_work.clone())
            .constructor(ConstructorInfo::new([], |_| Ok(Arc::new(AtomicUsize::new(0)) as AnyArc))),
    );
    sc.register_type(ImplementationType::class(repository.clone()).constructor(ConstructorInfo::new(
        [ParameterInfo::new("uow", unit_of_work.clone())],
        |args| Ok(args.arg::<AtomicUsize>(0)? as AnyArc),
    )));
    sc.add_scoped_type(unit_of_work.clone(), unit_of_work.clone());
    sc.add_scoped_type(repository.clone(), repository.clone());

    let sp = sc.build().unwrap();
    let scope = sp.create_scope();
    let uow = scope.get_as::<AtomicUsize>(&unit_of_work).unwrap();
    let repo_uow = scope.get_as::<AtomicUsize>(&repository).unwrap();
    assert!(Arc::ptr_eq(&uow, &repo_uow));

    let other = sp.create_scope().get_as::<AtomicUsize>(&repository).unwrap();
    assert!(!Arc::ptr_eq(&uow, &other));
}

#[test]
fn test_mixed_lifetimes_in_scope() {
    let singleton_count = Arc::new(AtomicUsize::new(0));
    let scoped_count = Arc::new(AtomicUsize::new(0));
    let transient_count = Arc::new(AtomicUsize::new(0));

    struct Single;
    struct PerScope;
    struct Fresh;

    let mut sc = ServiceCollection::new();
    let c = singleton_count.clone();
    sc.add_singleton_factory::<Single, _>(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        Single
    });
    let c = scoped_count.clone();
    sc.add_scoped_factory::<PerScope, _>(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        PerScope
    });
    let c = transient_count.clone();
    sc.add_transient_factory::<Fresh, _>(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        Fresh
    });

    let sp = sc.build().unwrap();
    for _ in 0..3 {
        let scope = sp.create_scope();
        for _ in 0..2 {
            scope.get_required::<Single>();
            scope.get_required::<PerScope>();
            scope.get_required::<Fresh>();
        }
    }

    assert_eq!(singleton_count.load(Ordering::SeqCst), 1);
    assert_eq!(scoped_count.load(Ordering::SeqCst), 3);
    assert_eq!(transient_count.load(Ordering::SeqCst), 6);
}

#[test]
fn test_factory_context_resolves_in_requesting_scope() {
    struct Tenant(usize);
    struct Handler {
        tenant: Arc<Tenant>,
        from_root: bool,
    }

    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();

    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<Tenant, _>(move |_| Tenant(c.fetch_add(1, Ordering::SeqCst)));
    sc.add_transient_factory::<Handler, _>(|r| Handler { tenant: r.get_required::<Tenant>(), from_root: r.is_root() });

    let sp = sc.build().unwrap();
    let scope = sp.create_scope();
    let handler = scope.get_required::<Handler>();

    assert!(!handler.from_root);
    assert!(Arc::ptr_eq(&handler.tenant, &scope.get_required::<Tenant>()));
}

#[test]
fn test_nested_scopes_are_independent() {
    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<Vec<u8>, _>(|_| Vec::new());

    let sp = sc.build().unwrap();
    let outer = sp.create_scope();
    let inner = outer.create_scope();

    assert!(!inner.is_root());
    assert!(!Arc::ptr_eq(&outer.get_required::<Vec<u8>>(), &inner.get_required::<Vec<u8>>()));

    outer.dispose();
    assert!(inner.get::<Vec<u8>>().is_ok());
}

#[test]
fn test_scope_clones_share_cache() {
    let mut sc = ServiceCollection::new();
    sc.add_factory(
        ServiceType::named("Cart"),
        ferrous_resolve::ServiceFactory::new(|_| Ok(Arc::new(Vec::<u32>::new()) as AnyArc)),
        Lifetime::Scoped,
    );

    let sp = sc.build().unwrap();
    let scope = sp.create_scope();
    let clone = scope.clone();
    let cart = ServiceType::named("Cart");

    assert!(Arc::ptr_eq(
        &scope.get_as::<Vec<u32>>(&cart).unwrap(),
        &clone.get_as::<Vec<u32>>(&cart).unwrap()
    ));
}
