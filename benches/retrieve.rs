//! Benchmarks for retrieval and alignment.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};

use secgraph::align::{Projection, align};
use secgraph::embedding::EmbeddingSpace;
use secgraph::retrieve::{cosine_similarity, retrieve};

fn random_space(n: usize, dim: usize, seed: u64) -> EmbeddingSpace {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    EmbeddingSpace::from_pairs((0..n).map(|i| {
        let v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        (format!("http://example.org/network#E{i}"), v)
    }))
    .unwrap()
}

fn bench_cosine(c: &mut Criterion) {
    let space = random_space(2, 1536, 0);
    let (a, b) = (&space.keys()[0], &space.keys()[1]);
    let (a, b) = (space.get(a).unwrap(), space.get(b).unwrap());

    c.bench_function("cosine_1536", |bench| {
        bench.iter(|| black_box(cosine_similarity(a, b)))
    });
}

fn bench_retrieve(c: &mut Criterion) {
    let space = random_space(5_000, 1536, 1);
    let query = space.get(&space.keys()[42]).unwrap().to_vec();

    c.bench_function("retrieve_top5_5000x1536", |bench| {
        bench.iter(|| black_box(retrieve(&query, &space, 5)))
    });
}

fn bench_align(c: &mut Criterion) {
    let source = random_space(500, 64, 2);
    let target = random_space(500, 256, 3);

    c.bench_function("align_500_64_to_256", |bench| {
        bench.iter(|| black_box(align(&source, &target, Projection::LinearOnly).unwrap()))
    });
}

criterion_group!(benches, bench_cosine, bench_retrieve, bench_align);
criterion_main!(benches);
