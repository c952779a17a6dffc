use criterion::{criterion_group, criterion_main, Criterion};
use rand::SeedableRng;

pub fn conditionals_bench(c: &mut Criterion) {
    let num_blocks = match std::env::var("CONDITIONALS_N") {
        Ok(val) => match val.parse::<usize>() {
            Ok(val) => val,
            Err(_) => panic!["Failed to parse env var CONDITIONALS_N={val} as an integer"],
        },
        Err(_) => 2_000,
    };
    let mut rng = rand::prelude::StdRng::seed_from_u64(17);
    let tex_input = performance::generate_random_conditional_document(&mut rng, num_blocks, 6);

    let mut group = c.benchmark_group("conditionals");

    group.bench_function("conditionals_texpand", |b| {
        b.iter(|| performance::run_in_texpand(&tex_input))
    });

    if performance::host_has_pdftex() {
        group.bench_function("conditionals_pdftex", |b| {
            b.iter(|| {
                performance::run_in_pdftex(&tex_input);
            })
        });
    } else {
        println!("Skipping pdfTeX benchmark as pdfTeX is not installed (`which pdftex` failed).");
    }
}

criterion_group!(benches, conditionals_bench);
criterion_main!(benches);
