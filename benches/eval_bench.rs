use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sepia::{Environment, eval, parse_str};

const FIB: &str = "value fib = fn(n) { if (n < 2) { n } else { fib(n - 1) + fib(n - 2) } };";

const ARRAYS: &str = r#"
value map = fn(xs, g) {
    value iter = fn(xs, acc) {
        if (len(xs) == 0) { acc } else { iter(rest(xs), append(acc, g(first(xs)))) }
    };
    iter(xs, [])
};
value xs = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
"#;

fn bench_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("Evaluator");

    for n in [10, 20] {
        let (program, errors) = parse_str(&format!("{} fib({});", FIB, n));
        assert!(errors.is_empty());
        group.bench_with_input(BenchmarkId::new("fib", n), &program, |b, program| {
            b.iter(|| eval(black_box(program), &Environment::new()))
        });
    }

    let (program, errors) = parse_str(&format!("{} map(xs, fn(x) {{ x * x }});", ARRAYS));
    assert!(errors.is_empty());
    group.bench_function("map_squares", |b| {
        b.iter(|| eval(black_box(&program), &Environment::new()))
    });

    group.finish();
}

criterion_group!(benches, bench_eval);
criterion_main!(benches);
