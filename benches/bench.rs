use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dynsched::{config::ResourceConfig, simulate, trace::Trace};

/// Unrolled dot product, `n` iterations.
fn dotprod(n: u64) -> Trace {
    let mut s = String::new();
    for i in 0..n {
        s += &format!("flw f0,0(x10):{:#x}\n", 0x1000 + 4 * i);
        s += &format!("flw f1,0(x11):{:#x}\n", 0x8000 + 4 * i);
        s += "fmul.s f2,f0,f1\n";
        s += "fadd.s f3,f3,f2\n";
        s += "add x10,x10,x12\n";
        s += "add x11,x11,x12\n";
        s += "bne x10,x13,loop\n";
    }
    s += "fsw f3,0(x14):0x10000\n";
    s.parse().expect("failed to parse trace")
}

fn dotprod_large(c: &mut Criterion) {
    let config = ResourceConfig {
        reorder: 10,
        ..Default::default()
    };
    let trace = dotprod(2000);

    let mut group = c.benchmark_group("dotprod_large");
    group.sample_size(10);
    group.bench_function("dotprod 2000", |b| {
        b.iter(|| simulate(black_box(&config), trace.clone()).unwrap())
    });
    group.finish();
}

criterion_group!(benches, dotprod_large);
criterion_main!(benches);
