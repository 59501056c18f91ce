//! Benchmarks for relation-path resolution and batched loading.
//!
//! ```bash
//! cargo bench -p eagerly-loader --bench tree_bench
//! ```

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use eagerly_loader::prelude::*;
use eagerly_loader::{EagerLoadSpec, build_tree, parse_arguments};

fn catalog() -> RelationRegistry {
    RelationRegistry::new()
        .with("User", RelationDescriptor::has_many("posts", "id", "Post", "user_id"))
        .with("User", RelationDescriptor::has_one("profile", "id", "Profile", "user_id"))
        .with("Post", RelationDescriptor::has_many("comments", "id", "Comment", "post_id"))
        .with("Post", RelationDescriptor::belongs_to("author", "user_id", "User", "id"))
        .with("Comment", RelationDescriptor::belongs_to("author", "user_id", "User", "id"))
}

fn spec(paths: &[&str]) -> EagerLoadSpec {
    let mut spec = EagerLoadSpec::new();
    for path in paths {
        spec.insert(*path, None);
    }
    spec
}

/// Benchmark argument parsing.
fn bench_parse_arguments(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_arguments");

    group.bench_function("flat_paths_4", |b| {
        b.iter(|| {
            black_box(parse_arguments(vec![
                "posts".into(),
                "posts.comments".into(),
                "posts.comments.author".into(),
                "profile".into(),
            ]))
        })
    });

    group.bench_function("map_with_constraints", |b| {
        b.iter(|| {
            let map = ArgMap::new()
                .path("profile")
                .constrained("posts", |q| {
                    q.limit(10);
                })
                .constrained("posts.comments", |q| {
                    q.order_by("id", SortOrder::Desc);
                });
            black_box(parse_arguments(vec![map.into()]))
        })
    });

    group.finish();
}

/// Benchmark tree resolution with shared prefixes.
fn bench_build_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_tree");
    let catalog = catalog();

    let shallow = spec(&["posts", "profile"]);
    group.bench_function("shallow", |b| {
        b.iter(|| black_box(build_tree("User", &shallow, &catalog)))
    });

    let shared = spec(&[
        "posts",
        "posts.author",
        "posts.comments",
        "posts.comments.author",
        "posts.comments.author.posts",
        "posts.comments.author.profile",
        "profile",
    ]);
    group.bench_function("shared_prefixes", |b| {
        b.iter(|| black_box(build_tree("User", &shared, &catalog)))
    });

    group.finish();
}

/// Benchmark executing a nested load against the in-memory store.
fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute");
    let Ok(rt) = tokio::runtime::Runtime::new() else {
        return;
    };

    for users in [10usize, 100] {
        let store = Arc::new(MemoryStore::new());
        let subject: Vec<EntityRef> = (0..users as i64)
            .map(|id| store.insert(Record::new("User").with("id", id)))
            .collect();
        for id in 0..(users as i64 * 5) {
            store.insert(Record::new("Post").with("id", id).with("user_id", id % users as i64));
            store.insert(Record::new("Comment").with("id", id).with("post_id", id));
        }
        let ctx = EagerContext::new(catalog(), store);

        group.throughput(Throughput::Elements(users as u64));
        group.bench_with_input(BenchmarkId::new("posts_comments", users), &subject, |b, subject| {
            b.to_async(&rt).iter(|| async {
                let loaded = Loader::load_collection(
                    &ctx,
                    subject.clone(),
                    vec!["posts.comments".into()],
                )
                .await;
                black_box(loaded)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse_arguments, bench_build_tree, bench_execute);
criterion_main!(benches);
