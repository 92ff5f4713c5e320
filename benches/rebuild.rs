use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use stipple::cloud::{InMemoryCloud, LodSettings};
use stipple::core::types::Vec3;
use stipple::octree::Octree;

fn uniform_cloud(count: usize, seed: u64) -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Vec3::new(
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
            )
        })
        .collect()
}

fn bench_rebuild_10k(c: &mut Criterion) {
    let cloud = InMemoryCloud::new(uniform_cloud(10_000, 7), LodSettings::default()).unwrap();

    c.bench_function("rebuild_10k", |b| {
        b.iter(|| {
            let mut tree = Octree::new();
            tree.rebuild(black_box(&cloud)).unwrap();
            tree
        });
    });
}

fn bench_rebuild_100k(c: &mut Criterion) {
    let cloud = InMemoryCloud::new(uniform_cloud(100_000, 7), LodSettings::default()).unwrap();

    c.bench_function("rebuild_100k", |b| {
        b.iter(|| {
            let mut tree = Octree::new();
            tree.rebuild(black_box(&cloud)).unwrap();
            tree
        });
    });
}

fn bench_rebuild_100k_sprites(c: &mut Criterion) {
    let settings = LodSettings {
        uses_sprites: true,
        single_poly_sprite_min_lod: 2,
        ..LodSettings::default()
    };
    let cloud = InMemoryCloud::new(uniform_cloud(100_000, 7), settings).unwrap();

    c.bench_function("rebuild_100k_sprites", |b| {
        b.iter(|| {
            let mut tree = Octree::new();
            tree.rebuild(black_box(&cloud)).unwrap();
            tree
        });
    });
}

criterion_group!(
    benches,
    bench_rebuild_10k,
    bench_rebuild_100k,
    bench_rebuild_100k_sprites
);
criterion_main!(benches);
