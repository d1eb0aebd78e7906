//! Parse throughput benchmark over a synthetic list file.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use listfile::Parser;

fn synthetic_source(commands: usize) -> String {
    let mut source = String::new();
    for i in 0..commands {
        source.push_str(&format!(
            "set(var_{i} value_{i};other ${{var_{i}}})\n\
             message(\"item {i}: ${{var_{i}}} in $ENV{{HOME}}\")\n\
             add_thing([==[ raw payload {i} ]==] plain_{i})\n"
        ));
    }
    source
}

fn bench_parse(c: &mut Criterion) {
    let source = synthetic_source(200);
    c.bench_function("parse_600_commands", |b| {
        b.iter(|| {
            let mut parser = Parser::new(black_box(&source));
            parser.parse().expect("parse failed");
            parser.take_function_list()
        })
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
