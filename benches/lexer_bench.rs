use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sepia::{parse_str, tokenize};

// One screenful of typical code, repeated to get a measurable input.
const SNIPPET: &str = r#"
// Fibonacci, both block styles
value fib = fn(n) {
    if (n < 2) { n } else { fib(n - 1) + fib(n - 2) }
};
value fact = f(n) ->
    if (n is 0) -> 1 end else -> n * fact(n - 1) end
end;

value people = [{"name": "Ada", "age": 36}, {"name": "Alan", "age": 41}];
value total = 0;
update total = total + people[0]["age"] + people[1]["age"];
print("string with escapes \"\n\r\t\"", len("héllo"), total >= 77 and true);
"#;

fn bench_input(copies: usize) -> String {
    SNIPPET.repeat(copies)
}

fn bench_front_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("Front end");

    for copies in [1, 64] {
        let input = bench_input(copies);
        group.bench_with_input(BenchmarkId::new("tokenize", copies), &input, |b, input| {
            b.iter(|| tokenize(black_box(input)))
        });
        group.bench_with_input(BenchmarkId::new("parse", copies), &input, |b, input| {
            b.iter(|| parse_str(black_box(input)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_front_end);
criterion_main!(benches);
