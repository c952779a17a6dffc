use criterion::{criterion_group, criterion_main, Criterion};
use texpand::token::trace;
use texpand::token::Namespace;
use texpand::token::Token;
use texpand_stdlib::script;

pub fn advance_bench(c: &mut Criterion) {
    let mut vm = performance::new_vm();
    vm.push_source("", r"\def\a{\advance\count 0 by 1}")
        .unwrap();
    script::run(&mut vm).unwrap();
    let a_cs = Token::new_control_sequence(
        vm.cs_name_interner()
            .get("a")
            .expect("a should have been interned already"),
        Namespace::ROOT,
        trace::Key::dummy(),
    );

    let mut group = c.benchmark_group("advance");
    group.sample_size(1000);
    let expansion = vec![a_cs; 1000];
    group.bench_function("advance", |b| {
        b.iter(|| {
            vm.push_back(&expansion);
            script::run(&mut vm).unwrap();
        })
    });
}

criterion_group!(benches, advance_bench);
criterion_main!(benches);
