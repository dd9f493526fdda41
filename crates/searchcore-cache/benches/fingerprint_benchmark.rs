use std::collections::HashSet;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use searchcore_cache::{InMemorySharedCache, QueryCache};
use searchcore_core::{fingerprint, Scope, SearchFilters, SearchRequest};
use tokio::runtime::Runtime;

fn sample_request(query: &str) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        scope: Scope::Workspace,
        project_id: None,
        include_dependencies: false,
        limit: 10,
        filters: SearchFilters::default(),
        similarity_threshold: None,
        recent_files: vec!["a.rs".into(), "b.rs".into()],
    }
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");
    group.bench_function("compute", |b| {
        let req = sample_request("find the auth middleware");
        b.iter(|| black_box(fingerprint(&req, "1.0.0")));
    });
    group.finish();
}

fn bench_query_cache(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("query_cache");

    for entries in [100, 1_000, 5_000].iter() {
        group.bench_with_input(BenchmarkId::new("set_then_get", entries), entries, |b, &entries| {
            b.to_async(&rt).iter(|| async move {
                let cache = QueryCache::new(
                    Arc::new(InMemorySharedCache::new()),
                    Arc::new(InMemorySharedCache::new()),
                );
                for i in 0..entries {
                    let req = sample_request(&format!("query number {i}"));
                    let fp = fingerprint(&req, "1.0.0");
                    cache
                        .set(fp.clone(), Vec::new(), Default::default(), HashSet::new())
                        .await
                        .unwrap();
                    black_box(cache.get(&fp).await);
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fingerprint, bench_query_cache);
criterion_main!(benches);
