//! Benchmarks for yamk core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::Path;
use yamk::core::dag::{Dag, Node};
use yamk::core::parser::{parse_cookbook, CookbookFormat};
use yamk::core::template::{Template, Vars};
use yamk::core::types::{Value, VarBlock};
use yamk::core::vars::{flatten_vars, Tier, VarTiers};

fn bench_template_evaluate(c: &mut Criterion) {
    let mut vars = Vars::new();
    vars.insert("prefix".to_string(), Value::from("/usr/local"));
    vars.insert("name".to_string(), Value::from("yam"));
    vars.insert("list".to_string(), Value::from(vec!["c", "a", "b"]));
    let base_dir = Path::new("/tmp");

    let mut group = c.benchmark_group("template_evaluate");
    for (label, input) in [
        ("plain", "cc -O2 -o main main.c"),
        ("vars", "${prefix}/bin/${name} --config ${prefix}/etc/${name}.conf"),
        ("escaped", "echo $${prefix} $$$${name} ${list:0}"),
        ("function", "$((sort ${list}))"),
    ] {
        let value = Value::from(input);
        group.bench_with_input(BenchmarkId::from_parameter(label), &value, |b, value| {
            let template = Template::new(&vars, base_dir);
            b.iter(|| black_box(template.evaluate(black_box(value)).unwrap()));
        });
    }
    group.finish();
}

fn bench_flatten_vars(c: &mut Criterion) {
    let block = |prefix: &str, n: usize| -> VarBlock {
        (0..n)
            .map(|i| (format!("{}{}", prefix, i), Value::from(format!("${{g{}}}-{}", i, prefix))))
            .collect()
    };
    let globals: VarBlock = (0..32)
        .map(|i| (format!("g{}", i), Value::from(format!("global-{}", i))))
        .collect();
    let tiers = VarTiers::new()
        .with(Tier::Global, globals)
        .with(Tier::Local, block("l", 32))
        .with(Tier::Arg, block("a", 8));

    c.bench_function("flatten_vars", |b| {
        b.iter(|| black_box(flatten_vars(black_box(&tiers), Path::new("/tmp")).unwrap()));
    });
}

fn bench_cookbook_parse(c: &mut Criterion) {
    let mut yaml = String::from("$globals:\n  vars:\n    prefix: /usr\n");
    for i in 0..50 {
        yaml.push_str(&format!(
            "target{i}:\n  phony: true\n  requires: [target{}]\n  commands:\n    - echo {i}\n",
            i + 1
        ));
    }

    c.bench_function("cookbook_parse_yaml", |b| {
        b.iter(|| black_box(parse_cookbook(black_box(&yaml), CookbookFormat::Yaml).unwrap()));
    });
}

/// Layered graph: every node of a layer requires every node of the next.
fn layered_dag(layers: usize, width: usize) -> Dag {
    let mut dag = Dag::new(Node::bare("root"));
    let mut previous = vec![dag.root()];
    for layer in 0..layers {
        let current: Vec<_> = (0..width)
            .map(|i| dag.add_node(Node::bare(&format!("n{}_{}", layer, i))))
            .collect();
        for &parent in &previous {
            for &child in current.iter().rev() {
                dag.add_requirement(parent, child);
            }
        }
        previous = current;
    }
    dag
}

fn bench_linearize(c: &mut Criterion) {
    let mut group = c.benchmark_group("linearize");
    for (layers, width) in [(5, 4), (10, 8), (20, 8)] {
        let label = format!("{}x{}", layers, width);
        group.bench_with_input(BenchmarkId::new("c3", &label), &(layers, width), |b, &(l, w)| {
            b.iter_batched(
                || layered_dag(l, w),
                |mut dag| black_box(dag.sort().unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });
        group.bench_with_input(
            BenchmarkId::new("topological", &label),
            &(layers, width),
            |b, &(l, w)| {
                b.iter_batched(
                    || layered_dag(l, w),
                    |mut dag| black_box(dag.topological_sort().unwrap()),
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_template_evaluate,
    bench_flatten_vars,
    bench_cookbook_parse,
    bench_linearize
);
criterion_main!(benches);
