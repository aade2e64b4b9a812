use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_resolve::{
    AnyArc, ConstructorInfo, ExecutionMode, ImplementationType, Lifetime, ParameterInfo, ProviderOptions, Resolver,
    ServiceCollection, ServiceProvider, ServiceType,
};
use std::sync::Arc;

const MODES: [(&str, ExecutionMode); 4] = [
    ("interpreted", ExecutionMode::Interpreted),
    ("compiled_tree", ExecutionMode::CompiledTree),
    ("bytecode_emit", ExecutionMode::BytecodeEmit),
    ("adaptive", ExecutionMode::Adaptive),
];

fn ty(name: &str) -> ServiceType {
    ServiceType::named(name)
}

fn register(sc: &mut ServiceCollection, name: &str, deps: &[String], lifetime: Lifetime) {
    sc.register_type(ImplementationType::class(ty(name)).constructor(ConstructorInfo::new(
        deps.iter().map(|d| ParameterInfo::new(d.clone(), ty(d))).collect::<Vec<_>>(),
        |args| Ok(Arc::new(args.into_values()) as AnyArc),
    )));
    sc.add_type(ty(name), ty(name), lifetime);
}

/// A chain `Level0 <- Level1 <- ... <- Level{depth}`, each level taking
/// the previous one plus a shared singleton and a scoped service.
fn layered(depth: usize, mode: ExecutionMode) -> ServiceProvider {
    let mut sc = ServiceCollection::new();
    register(&mut sc, "Config", &[], Lifetime::Singleton);
    register(&mut sc, "Session", &[], Lifetime::Scoped);
    register(&mut sc, "Level0", &[], Lifetime::Transient);
    for level in 1..=depth {
        let deps = [format!("Level{}", level - 1), "Config".to_string(), "Session".to_string()];
        register(&mut sc, &format!("Level{}", level), &deps, Lifetime::Transient);
    }
    sc.build_with_options(ProviderOptions::new().execution_mode(mode)).unwrap()
}

// ===== Micro Benchmarks =====

fn bench_singleton_hit(c: &mut Criterion) {
    let mut sc = ServiceCollection::new();
    sc.add_singleton(42u64);
    let sp = sc.build().unwrap();

    // Prime the singleton
    let _ = sp.get::<u64>().unwrap();

    c.bench_function("singleton_hit_u64", |b| {
        b.iter(|| {
            let v = sp.get::<u64>().unwrap();
            black_box(v);
        })
    });
}

fn bench_transient_by_mode(c: &mut Criterion) {
    let mut group = c.benchmark_group("transient_depth_8");

    for (name, mode) in MODES {
        let sp = layered(8, mode);
        let scope = sp.create_scope();
        let top = ty("Level8");
        // warm up so adaptive has promoted and caches are built
        for _ in 0..4 {
            scope.resolve_required(&top).unwrap();
        }
        std::thread::sleep(std::time::Duration::from_millis(20));

        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| black_box(scope.resolve_required(&top).unwrap()))
        });
    }

    group.finish();
}

fn bench_first_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("first_resolution");

    for (name, mode) in MODES {
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter_batched(
                || layered(8, mode),
                |sp| black_box(sp.create_scope().resolve_required(&ty("Level8")).unwrap()),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_scope_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("scope_lifecycle");

    for (name, mode) in MODES {
        let sp = layered(4, mode);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                let scope = sp.create_scope();
                black_box(scope.resolve_required(&ty("Level4")).unwrap());
                scope.dispose();
            })
        });
    }

    group.finish();
}

fn bench_enumerable_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumerable");

    for count in [1usize, 10, 100] {
        let mut sc = ServiceCollection::new();
        for i in 0..count {
            sc.add_factory(
                ty("Handler"),
                ferrous_resolve::ServiceFactory::new(move |_| Ok(Arc::new(i) as AnyArc)),
                Lifetime::Transient,
            );
        }
        let sp = sc.build().unwrap();

        group.bench_with_input(BenchmarkId::new("resolve_all", count), &count, |b, _| {
            b.iter(|| black_box(sp.resolve_all(&ty("Handler")).unwrap()))
        });
    }

    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    let sp = layered(4, ExecutionMode::CompiledTree);
    let top = ty("Level4");

    for &thread_count in &[1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("transient_threads", thread_count),
            &thread_count,
            |b, &threads| {
                b.iter_custom(|iters| {
                    let start = std::time::Instant::now();
                    crossbeam_utils::thread::scope(|s| {
                        for _ in 0..threads {
                            let sp_ref = &sp;
                            let top = &top;
                            s.spawn(move |_| {
                                let scope = sp_ref.create_scope();
                                for _ in 0..iters / threads as u64 {
                                    black_box(scope.resolve_required(top).unwrap());
                                }
                            });
                        }
                    })
                    .unwrap();
                    start.elapsed()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    micro_benches,
    bench_singleton_hit,
    bench_transient_by_mode,
    bench_first_resolution,
    bench_enumerable_scaling
);

criterion_group!(macro_benches, bench_scope_lifecycle, bench_contention);

criterion_main!(micro_benches, macro_benches);
