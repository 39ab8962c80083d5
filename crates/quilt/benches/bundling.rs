use std::{fs, hint::black_box, path::Path};

use criterion::{Criterion, criterion_group, criterion_main};
use quilt::{Config, Package};
use tempfile::TempDir;

fn create_tree(root: &Path, directories: usize, files_per_directory: usize) {
    for dir in 0..directories {
        let dir_path = root.join(format!("feature_{dir}"));
        fs::create_dir_all(&dir_path).expect("Failed to create fixture directory");
        for file in 0..files_per_directory {
            let body = format!(
                "var helper = require('../feature_0/module_0');\nexports.value = {dir} * {file};\n"
            );
            fs::write(dir_path.join(format!("module_{file}.js")), body)
                .expect("Failed to write fixture module");
        }
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

fn benchmark_builds(c: &mut Criterion) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let lib = temp.path().join("lib");
    create_tree(&lib, 20, 25);
    let runtime = runtime();

    let mut group = c.benchmark_group("build");

    group.bench_function("cold", |b| {
        b.iter(|| {
            let mut package = Package::new(Config {
                paths: vec![lib.clone()],
                cache: false,
                ..Default::default()
            })
            .expect("Failed to create package");
            black_box(runtime.block_on(package.build()).expect("Build failed"))
        });
    });

    let mut warm = Package::new(Config {
        paths: vec![lib.clone()],
        ..Default::default()
    })
    .expect("Failed to create package");
    runtime.block_on(warm.build()).expect("Build failed");

    group.bench_function("warm", |b| {
        b.iter(|| black_box(runtime.block_on(warm.build()).expect("Build failed")));
    });

    group.finish();
}

criterion_group!(benches, benchmark_builds);
criterion_main!(benches);
