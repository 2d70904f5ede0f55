// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Backend Performance Benchmarks
//!
//! Runs a Gabor → KWTA frame at several image sizes on each backbone to find the
//! crossover where threading (and the GPU, when enabled) pays off.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use feagi_vision_core::testing::{bar_image, gabor_bank};
use feagi_vision_core::{Dims2, Geometry, KwtaParams, Operation};
use feagi_vision_engine::{
    BarrierPolicy, CPUBackend, ComputeBackend, ExecutionContext, VisionPipeline,
};

/// Square image of `side` pixels through pad → 4 Gabors → KWTA
fn create_test_pipeline(side: usize) -> VisionPipeline {
    let content = Dims2::splat(side);
    let geom = Geometry::with_content(Dims2::splat(0), Dims2::splat(2), Dims2::splat(6), content)
        .expect("geometry");
    let size = geom.output_size;

    let mut p = VisionPipeline::new(format!("bench_{}", side), 1).expect("pipeline");
    let raw = p.new_image(geom.input_size).expect("image");
    let padded = p.new_image(geom.input_size).expect("image");
    let filters = p.new_filters(4, geom.filter_size).expect("filters");
    let drive = p.new_values(size, 4).expect("values");
    let act = p.new_values(size, 4).expect("values");
    let inhibs = p.new_inhibs(size).expect("inhibs");
    let params = p.new_kwta(KwtaParams::default());
    p.set_filters(filters, gabor_bank(6, 4, 6.0, 0.3, 0.2, 0.0).view())
        .expect("filters");
    let image = bar_image(
        content,
        1,
        Dims2::new(side / 4, side / 3),
        Dims2::new(side / 2, side / 8),
        1.0,
        0.0,
    );
    p.set_image(raw, 0, image.view(), geom.border).expect("image");

    p.push(Operation::WrapPad {
        input: raw,
        output: padded,
        channels: 1,
        geom,
    })
    .expect("op");
    p.push(Operation::ConvolveImage {
        input: padded,
        channel: 0,
        filters,
        filter_count: 4,
        gain: 2.0,
        output: drive,
        geom,
    })
    .expect("op");
    p.push(Operation::Kwta {
        input: drive,
        ext_gi: None,
        output: act,
        inhibs,
        params,
        size,
        features: 4,
    })
    .expect("op");
    p
}

fn bench_backend(
    c: &mut Criterion,
    group_name: &str,
    make: impl Fn() -> Option<Box<dyn ComputeBackend>>,
) {
    let mut group = c.benchmark_group(group_name);
    let test_sizes = vec![(64, "64px"), (128, "128px"), (256, "256px"), (512, "512px")];

    for (side, label) in test_sizes {
        let mut pipeline = create_test_pipeline(side);
        let Some(backend) = make() else {
            println!("Backend unavailable, skipping {} {}", group_name, label);
            continue;
        };
        let mut ctx = ExecutionContext::new(backend, BarrierPolicy::Full);
        ctx.bind(&pipeline).expect("bind");

        group.throughput(Throughput::Elements(pipeline.work_items() as u64));
        group.bench_with_input(BenchmarkId::new("frame", label), &side, |b, _| {
            b.iter(|| black_box(ctx.run(&mut pipeline).expect("run").total_us));
        });
    }

    group.finish();
}

fn bench_sequential(c: &mut Criterion) {
    bench_backend(c, "sequential_backend", || {
        Some(Box::new(CPUBackend::sequential()) as Box<dyn ComputeBackend>)
    });
}

fn bench_thread_pool(c: &mut Criterion) {
    bench_backend(c, "cpu_backend", || {
        Some(Box::new(CPUBackend::new()) as Box<dyn ComputeBackend>)
    });
}

/// Benchmark GPU backend (if available)
#[cfg(feature = "gpu")]
fn bench_gpu(c: &mut Criterion) {
    use feagi_vision_engine::{is_gpu_available, WGPUBackend};

    if !is_gpu_available() {
        println!("GPU not available, skipping GPU benchmarks");
        return;
    }
    bench_backend(c, "gpu_backend", || {
        WGPUBackend::new()
            .ok()
            .map(|b| Box::new(b) as Box<dyn ComputeBackend>)
    });
}

/// Test backend auto-selection logic
fn bench_auto_selection(c: &mut Criterion) {
    use feagi_vision_engine::{select_backend, BackendConfig};

    let mut group = c.benchmark_group("auto_selection");
    for (work_items, label) in [(100_000, "small"), (10_000_000, "large")] {
        group.bench_with_input(
            BenchmarkId::new("select_backend", label),
            &work_items,
            |b, &work| {
                let config = BackendConfig::default();
                b.iter(|| black_box(select_backend(work, &config)));
            },
        );
    }
    group.finish();
}

#[cfg(feature = "gpu")]
criterion_group!(
    benches,
    bench_sequential,
    bench_thread_pool,
    bench_gpu,
    bench_auto_selection
);

#[cfg(not(feature = "gpu"))]
criterion_group!(
    benches,
    bench_sequential,
    bench_thread_pool,
    bench_auto_selection
);

criterion_main!(benches);
