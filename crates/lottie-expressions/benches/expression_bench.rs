//! Benchmarks for compiling and sampling expressions.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lottie_expressions::{
    EvaluationContext, ExpressionEvaluator, LayerObject, RunOptions, Script, StaticProperty,
};

const WIGGLE: &str = "wiggle(2, 30)";

const LOOP_SCRIPT: &str = r#"
var total = 0
for (let i = 0; i < 20; i++) {
    if (i % 3 == 0) continue
    total += Math.sin(i * time)
}
value + [total, 0]
"#;

const FUNCTION_SCRIPT: &str = r#"
function bounce(t, amp, freq, decay) {
    return amp * Math.sin(freq * t * 2 * Math.PI) / Math.exp(decay * t)
}
var n = bounce(time, 20, 3, 4)
[value[0], value[1] + n]
"#;

fn context(time: f64) -> EvaluationContext {
    let layer = LayerObject::new(1, "Bench");
    EvaluationContext::new(time, 30.0)
        .with_layer(std::sync::Arc::new(layer))
        .with_property(StaticProperty::shared(vec![100.0, 50.0]))
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_function_script", |b| {
        b.iter(|| black_box(Script::compile(black_box(FUNCTION_SCRIPT))))
    });
    c.bench_function("compile_loop_script", |b| {
        b.iter(|| black_box(Script::compile(black_box(LOOP_SCRIPT))))
    });
}

fn bench_run(c: &mut Criterion) {
    let ctx = context(1.25);
    let loop_script = Script::compile(LOOP_SCRIPT);
    let function_script = Script::compile(FUNCTION_SCRIPT);

    c.bench_function("run_loop_script", |b| {
        b.iter(|| black_box(loop_script.run(&ctx, RunOptions::default())))
    });
    c.bench_function("run_function_script", |b| {
        b.iter(|| black_box(function_script.run(&ctx, RunOptions::default())))
    });
}

fn bench_sample_frames(c: &mut Criterion) {
    let evaluator = ExpressionEvaluator::new();
    let contexts: Vec<_> = (0..60).map(|frame| context(frame as f64 / 30.0)).collect();

    c.bench_function("sample_wiggle_60_frames", |b| {
        b.iter(|| {
            for ctx in &contexts {
                black_box(evaluator.evaluate_on_property(WIGGLE, ctx));
            }
        })
    });
}

criterion_group!(benches, bench_compile, bench_run, bench_sample_frames);
criterion_main!(benches);
