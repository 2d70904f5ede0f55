// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end runs through an execution context

use feagi_vision_core::testing::{bar_image, dog_bank, DOG_NET};
use feagi_vision_core::{
    Dims2, Geometry, MotionDirection, MotionParams, Operation, ScalarReduce, VisionError,
};
use feagi_vision_engine::{
    BackendConfig, BackendType, BarrierPolicy, ExecutionContext, VisionPipeline,
};
use ndarray::s;

fn context(barrier: BarrierPolicy) -> ExecutionContext {
    ExecutionContext::from_config(BackendType::CPU, 0, &BackendConfig::default(), barrier).unwrap()
}

#[test]
fn test_dog_bar_through_pipeline() {
    let content = Dims2::splat(128);
    let geom =
        Geometry::with_content(Dims2::splat(0), Dims2::splat(4), Dims2::splat(12), content)
            .unwrap();
    let mut p = VisionPipeline::new("dog", 2).unwrap();
    let raw = p.new_image(geom.input_size).unwrap();
    let padded = p.new_image(geom.input_size).unwrap();
    let filters = p.new_filters(1, geom.filter_size).unwrap();
    let out = p.new_values(geom.output_size, 1).unwrap();
    let bank = dog_bank(12, 0.125, 0.25);
    p.set_filters(filters, bank.slice(s![DOG_NET..=DOG_NET, .., ..]))
        .unwrap();
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
        filter_count: 1,
        gain: 8.0,
        output: out,
        geom,
    })
    .unwrap();
    p.log_summary();

    // bar only in batch 0; batch 1 is blank
    let image = bar_image(content, 1, Dims2::new(60, 56), Dims2::new(8, 16), 1.0, 0.0);
    p.set_image(raw, 0, image.view(), geom.border).unwrap();

    let mut ctx = context(BarrierPolicy::Full);
    ctx.bind(&p).unwrap();
    let stats = ctx.run(&mut p).unwrap();
    assert_eq!(stats.ops.len(), 2);
    assert_eq!(stats.barriers, 1);
    assert!(stats.total_us >= 0.0);

    let on = p.values(out, 0).unwrap();
    let peak = on.slice(s![.., .., 0, 0]).fold(0.0f32, |m, &v| m.max(v));
    assert!(peak > 0.0);
    // bar spans output cells 15..17 horizontally and 14..18 vertically
    let center = on[[16, 15, 0, 0]].max(on[[16, 16, 0, 0]]);
    assert!(center > 0.0);
    assert_eq!(on[[0, 0, 0, 0]], 0.0);

    let blank = p.values(out, 1).unwrap();
    assert!(blank.iter().all(|&v| v == 0.0));
}

#[test]
fn test_rightward_motion_integrates_rightward() {
    let content = Dims2::splat(64);
    let geom =
        Geometry::with_content(Dims2::splat(0), Dims2::splat(2), Dims2::splat(8), content).unwrap();
    let size = geom.output_size;
    let params = MotionParams::default();

    let mut p = VisionPipeline::new("motion", 1).unwrap();
    let raw = p.new_image(geom.input_size).unwrap();
    let padded = p.new_image(geom.input_size).unwrap();
    let filters = p.new_filters(1, geom.filter_size).unwrap();
    let dog = p.new_values(size, 1).unwrap();
    let fast = p.new_values(size, 1).unwrap();
    let slow = p.new_values(size, 1).unwrap();
    let star = p.new_values(size, MotionDirection::COUNT).unwrap();
    let full_field = p.new_scalars(MotionDirection::COUNT).unwrap();
    let integrated = p.new_scalars(MotionDirection::COUNT + 1).unwrap();

    let bank = dog_bank(8, 0.125, 0.25);
    p.set_filters(filters, bank.slice(s![DOG_NET..=DOG_NET, .., ..]))
        .unwrap();
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
        filter_count: 1,
        gain: 4.0,
        output: dog,
        geom,
    })
    .unwrap();
    let energy = p
        .push_scalar_reduction(ScalarReduce::Sum, dog, size, 1)
        .unwrap();
    p.push(Operation::MotionIntegrate {
        input: dog,
        fast,
        slow,
        size,
        features: 1,
        params,
    })
    .unwrap();
    p.push(Operation::MotionStar {
        fast,
        slow,
        output: star,
        size,
        features: 1,
        params,
    })
    .unwrap();
    p.push(Operation::MotionFullField {
        star,
        output: full_field,
        size,
        features: 1,
    })
    .unwrap();
    p.push(Operation::MotionNormalize {
        energy,
        full_field,
        integrated,
        params,
    })
    .unwrap();

    let mut ctx = context(BarrierPolicy::DataDependent);
    ctx.bind(&p).unwrap();
    p.zero_state();
    for frame in 0..16 {
        // two content pixels (one output cell) per frame
        let origin = Dims2::new(8 + 2 * frame, 0);
        let image = bar_image(content, 1, origin, Dims2::new(8, 64), 1.0, 0.0);
        p.set_image(raw, 0, image.view(), geom.border).unwrap();
        ctx.run(&mut p).unwrap();
    }

    let left = p
        .scalar(integrated.offset(MotionDirection::Left as usize), 0)
        .unwrap();
    let right = p
        .scalar(integrated.offset(MotionDirection::Right as usize), 0)
        .unwrap();
    let energy_state = p
        .scalar(integrated.offset(MotionDirection::COUNT), 0)
        .unwrap();
    assert!(energy_state > 0.0);
    assert!(right > left, "right {} left {}", right, left);
}

#[test]
fn test_other_pipeline_needs_bind() {
    let mut a = VisionPipeline::new("a", 1).unwrap();
    let b = VisionPipeline::new("b", 1).unwrap();
    let mut ctx = context(BarrierPolicy::Full);
    ctx.bind(&b).unwrap();
    assert!(matches!(ctx.run(&mut a), Err(VisionError::NotBound(id)) if id == a.id()));
    ctx.bind(&a).unwrap();
    assert!(ctx.run(&mut a).is_ok());
    assert_eq!(ctx.switches(), 2);
}
