use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use trellis_core::compile::{
    compile, Attribute, CompileOptions, ComponentSource, Expr, InlineComponent, Registry,
};
use trellis_core::runtime::{
    Component, ComponentDef, EmptyFragment, Fragment, Options, Props, Scheduler, Schema, State,
    Target,
};

struct Leaf;

impl ComponentDef for Leaf {
    fn name(&self) -> &str {
        "Leaf"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(["value"]).expect("schema"))
    }

    fn create_fragment(&self, _: &Component, _: &State) -> Box<dyn Fragment> {
        Box::new(EmptyFragment)
    }
}

fn app(children: usize, registry: &Registry) -> Arc<dyn ComponentDef> {
    let source = ComponentSource {
        name: "App".into(),
        fields: vec!["value".into()],
        defaults: Props::new(),
        children: (0..children)
            .map(|_| {
                InlineComponent::named("Leaf").attr(Attribute::named("value", Expr::ident("value")))
            })
            .collect(),
        each: Vec::new(),
    };
    compile(&source, registry, &CompileOptions::default())
        .expect("compile")
        .register()
}

fn flush_fan_out(c: &mut Criterion) {
    let registry = Registry::new();
    registry.register(Arc::new(Leaf));

    let mut group = c.benchmark_group("flush_fan_out");
    for children in [1usize, 16, 64] {
        let scheduler = Scheduler::new();
        let root = Component::new(
            &scheduler,
            app(children, &registry),
            Options::new().target(Target::new("body")),
        );
        let mut n = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(children), &children, |b, _| {
            b.iter(|| {
                n += 1;
                root.set("value", json!(n)).expect("set");
                scheduler.flush();
            });
        });
    }
    group.finish();
}

fn flush_single_leaf(c: &mut Criterion) {
    let scheduler = Scheduler::new();
    let leaf =
        Component::new(&scheduler, Arc::new(Leaf), Options::new().target(Target::new("body")));
    let mut n = 0u64;

    c.bench_function("flush_single_leaf", |b| {
        b.iter(|| {
            n += 1;
            leaf.set("value", json!(n)).expect("set");
            scheduler.flush();
        });
    });
}

criterion_group!(benches, flush_fan_out, flush_single_leaf);
criterion_main!(benches);
