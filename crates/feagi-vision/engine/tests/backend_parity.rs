// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Every backbone must agree with the sequential one on every output

use approx::assert_abs_diff_eq;
use feagi_vision_core::testing::{bar_image, gabor_bank};
use feagi_vision_core::{
    ConvergenceState, Dims2, Geometry, KwtaParams, Operation, ScalarReduce, ValueSlot,
};
use feagi_vision_engine::{
    BarrierPolicy, CPUBackend, ComputeBackend, ExecutionContext, VisionPipeline,
};

struct Built {
    pipeline: VisionPipeline,
    outputs: Vec<(ValueSlot, Dims2, usize)>,
}

/// Gabor → neighbor inhibition → KWTA → pool → log, two batch entries
fn build() -> Built {
    let content = Dims2::new(40, 32);
    let geom =
        Geometry::with_content(Dims2::splat(0), Dims2::splat(2), Dims2::splat(6), content).unwrap();
    let size = geom.output_size;
    let pooled = Dims2::new(size.x / 2, size.y / 2);

    let mut p = VisionPipeline::new("parity", 2).unwrap();
    let raw = p.new_image(geom.input_size).unwrap();
    let padded = p.new_image(geom.input_size).unwrap();
    let filters = p.new_filters(4, geom.filter_size).unwrap();
    let drive = p.new_values(size, 4).unwrap();
    let ext = p.new_values(size, 4).unwrap();
    let act = p.new_values(size, 4).unwrap();
    let pool = p.new_values(pooled, 4).unwrap();
    let logged = p.new_values(pooled, 4).unwrap();
    let inhibs = p.new_inhibs(size).unwrap();
    let params = p.new_kwta(KwtaParams::default());

    p.set_filters(filters, gabor_bank(6, 4, 6.0, 0.3, 0.2, 0.0).view())
        .unwrap();
    let horizontal = bar_image(content, 1, Dims2::new(0, 14), Dims2::new(40, 3), 1.0, 0.0);
    let vertical = bar_image(content, 1, Dims2::new(19, 0), Dims2::new(3, 32), 0.8, 0.1);
    p.set_image(raw, 0, horizontal.view(), geom.border).unwrap();
    p.set_image(raw, 1, vertical.view(), geom.border).unwrap();

    p.push(Operation::WrapPad {
        input: raw,
        output: padded,
        channels: 1,
        geom,
    })
    .unwrap();
    p.push(Operation::ConvolveImage {
        input: padded,
        channel: 0,
        filters,
        filter_count: 4,
        gain: 2.0,
        output: drive,
        geom,
    })
    .unwrap();
    p.push(Operation::NeighInhib4 {
        input: drive,
        output: ext,
        size,
        gi: 0.6,
    })
    .unwrap();
    p.push(Operation::Kwta {
        input: drive,
        ext_gi: Some(ext),
        output: act,
        inhibs,
        params,
        size,
        features: 4,
    })
    .unwrap();
    p.push(Operation::MaxPool {
        input: act,
        output: pool,
        input_size: size,
        output_size: pooled,
        pool: Dims2::splat(2),
        spacing: Dims2::splat(2),
        polarities: 2,
        features: 4,
    })
    .unwrap();
    p.push(Operation::LogValues {
        input: pool,
        output: logged,
        size: pooled,
        features: 4,
        gain: 3.0,
    })
    .unwrap();
    p.push_scalar_reduction(ScalarReduce::Max, logged, pooled, 4)
        .unwrap();

    Built {
        pipeline: p,
        outputs: vec![(drive, size, 4), (act, size, 4), (logged, pooled, 4)],
    }
}

fn run_on(backend: Box<dyn ComputeBackend>) -> (VisionPipeline, Vec<(ValueSlot, Dims2, usize)>) {
    let Built {
        mut pipeline,
        outputs,
    } = build();
    let mut ctx = ExecutionContext::new(backend, BarrierPolicy::Full);
    ctx.bind(&pipeline).unwrap();
    let stats = ctx.run(&mut pipeline).unwrap();
    assert_eq!(stats.ops.len(), pipeline.len());
    assert_eq!(stats.kwta.len(), 1);
    assert_eq!(stats.kwta[0].op_index, 3);
    assert_eq!(stats.kwta[0].outcomes.len(), 2);
    for outcome in &stats.kwta[0].outcomes {
        assert!(matches!(
            outcome.state,
            ConvergenceState::Converged { .. } | ConvergenceState::MaxItersReached { .. }
        ));
    }
    (pipeline, outputs)
}

fn assert_agree(
    reference: &VisionPipeline,
    other: &VisionPipeline,
    outputs: &[(ValueSlot, Dims2, usize)],
    epsilon: f32,
) {
    for &(slot, _, _) in outputs {
        for b in 0..2 {
            let a = reference.values(slot, b).unwrap();
            let c = other.values(slot, b).unwrap();
            assert_eq!(a.shape(), c.shape());
            for (x, y) in a.iter().zip(c.iter()) {
                assert_abs_diff_eq!(x, y, epsilon = epsilon);
            }
        }
    }
}

#[test]
fn test_sequential_and_pool_agree() {
    let (seq, outputs) = run_on(Box::new(CPUBackend::sequential()));
    let (par, _) = run_on(Box::new(CPUBackend::with_threads(3).unwrap()));
    assert_agree(&seq, &par, &outputs, 1e-5);
}

#[cfg(feature = "gpu")]
#[test]
fn test_sequential_and_wgpu_agree() {
    use feagi_vision_engine::{is_gpu_available, WGPUBackend};

    if !is_gpu_available() {
        eprintln!("no GPU adapter, skipping");
        return;
    }
    let (seq, outputs) = run_on(Box::new(CPUBackend::sequential()));
    let (gpu, _) = run_on(Box::new(WGPUBackend::new().unwrap()));
    assert_agree(&seq, &gpu, &outputs, 1e-4);
}

#[test]
fn test_batches_do_not_leak() {
    let (seq, outputs) = run_on(Box::new(CPUBackend::sequential()));
    let (drive, size, _) = outputs[0];
    let horizontal = seq.values(drive, 0).unwrap();
    let vertical = seq.values(drive, 1).unwrap();
    // different stimuli, different drive
    let differs = horizontal
        .iter()
        .zip(vertical.iter())
        .any(|(a, b)| (a - b).abs() > 1e-3);
    assert!(differs);
    assert_eq!(horizontal.shape()[0], size.y);
}
