use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use engine::{Engine, MemStore, OrderedStore};
use overlay::{
    DocumentKey, IndexedOverlayStore, Mutation, MutationMap, OverlayStore, ResourcePath,
    UNKNOWN_BATCH_ID,
};
use tempfile::tempdir;

const N_BATCHES: i32 = 200;
const DOCS_PER_BATCH: usize = 10;
const MUTATION_SIZE: usize = 100;

fn batch_of(batch: i32) -> MutationMap {
    (0..DOCS_PER_BATCH)
        .map(|i| {
            let path = format!("users/u{}/posts/p{}", i, batch);
            (
                DocumentKey::parse(&path).unwrap(),
                Mutation::new(vec![b'x'; MUTATION_SIZE]),
            )
        })
        .collect()
}

fn populate<S: OrderedStore>(cache: &mut IndexedOverlayStore<S>) {
    for batch in 0..N_BATCHES {
        cache.save_overlays(batch, &batch_of(batch)).unwrap();
    }
}

fn save_mem_benchmark(c: &mut Criterion) {
    c.bench_function("save_2k_overlays_memstore", |b| {
        b.iter_batched(
            || IndexedOverlayStore::new(MemStore::new()),
            |mut cache| populate(&mut cache),
            BatchSize::SmallInput,
        );
    });
}

fn save_durable_benchmark(c: &mut Criterion) {
    c.bench_function("save_2k_overlays_engine", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let engine = Engine::new(
                    dir.path().join("bench.wal"),
                    dir.path().join("bench.snap"),
                    1024 * 1024,
                    false,
                )
                .unwrap();
                (dir, IndexedOverlayStore::new(engine))
            },
            |(_dir, mut cache)| populate(&mut cache),
            BatchSize::SmallInput,
        );
    });
}

fn group_page_benchmark(c: &mut Criterion) {
    let mut cache = IndexedOverlayStore::new(MemStore::new());
    populate(&mut cache);

    c.bench_function("group_scan_pages_of_50", |b| {
        b.iter(|| {
            let mut since = UNKNOWN_BATCH_ID;
            loop {
                let page = cache
                    .get_overlays_in_collection_group("posts", since, 50)
                    .unwrap();
                match page.values().map(|o| o.largest_batch_id).max() {
                    Some(top) => since = top,
                    None => break,
                }
            }
        });
    });
}

fn collection_scan_benchmark(c: &mut Criterion) {
    let mut cache = IndexedOverlayStore::new(MemStore::new());
    populate(&mut cache);
    let collection = ResourcePath::parse("users/u3/posts").unwrap();

    c.bench_function("collection_scan_200", |b| {
        b.iter(|| {
            let found = cache
                .get_overlays_in_collection(&collection, UNKNOWN_BATCH_ID)
                .unwrap();
            assert_eq!(found.len(), N_BATCHES as usize);
        });
    });
}

fn remove_benchmark(c: &mut Criterion) {
    c.bench_function("remove_all_batches", |b| {
        b.iter_batched(
            || {
                let mut cache = IndexedOverlayStore::new(MemStore::new());
                populate(&mut cache);
                cache
            },
            |mut cache| {
                for batch in 0..N_BATCHES {
                    cache.remove_overlays_for_batch(batch).unwrap();
                }
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    save_mem_benchmark,
    save_durable_benchmark,
    group_page_benchmark,
    collection_scan_benchmark,
    remove_benchmark
);
criterion_main!(benches);
