// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Standard pipelines end to end on the CPU backbones

use approx::assert_abs_diff_eq;
use feagi_vision::prelude::*;
use feagi_vision::vision_core::color::edge_average;
use feagi_vision::vision_core::testing::{bar_image, dog_bank, gabor_bank, DOG_NET, DOG_OFF, DOG_ON};
use ndarray::{s, Array3};

fn context(barrier: BarrierPolicy) -> ExecutionContext {
    ExecutionContext::from_config(BackendType::CPU, 0, &BackendConfig::default(), barrier).unwrap()
}

fn max_of(view: ndarray::ArrayView4<f32>) -> f32 {
    view.fold(f32::NEG_INFINITY, |m, &v| m.max(v))
}

#[test]
fn test_dog_grey_is_max_normalized() {
    let content = Dims2::splat(64);
    let bank = dog_bank(12, 0.125, 0.25);
    let mut dog = DogGrey::configure(
        DogGreyParams::default(),
        content,
        2,
        bank.slice(s![DOG_NET, .., ..]),
    )
    .unwrap();
    assert_eq!(dog.geometry().output_size, Dims2::splat(16));

    let bar = bar_image(content, 1, Dims2::new(28, 0), Dims2::new(8, 64), 1.0, 0.0);
    dog.set_image(0, bar.view()).unwrap();
    // batch 1 stays blank

    let mut ctx = context(BarrierPolicy::Full);
    let stats = dog.run(&mut ctx).unwrap();
    assert_eq!(stats.ops.len(), 6);

    let out = dog.output(0).unwrap();
    assert_eq!(out.dim(), (16, 16, 2, 1));
    assert_abs_diff_eq!(max_of(out), 1.0, epsilon = 1e-5);
    assert!(out.iter().all(|&v| v >= 0.0));

    // a zero maximum divides to zero, not NaN
    let blank = dog.output(1).unwrap();
    assert!(blank.iter().all(|&v| v == 0.0));
}

#[test]
fn test_dog_grey_rejects_wrong_content() {
    let bank = dog_bank(12, 0.125, 0.25);
    let mut dog = DogGrey::configure(
        DogGreyParams::default(),
        Dims2::splat(64),
        1,
        bank.slice(s![DOG_NET, .., ..]),
    )
    .unwrap();
    let small = Array3::<f32>::zeros((1, 32, 64));
    assert!(matches!(
        dog.set_image(0, small.view()),
        Err(VisionError::ShapeMismatch(_))
    ));
}

#[test]
fn test_dog_color_red_patch() {
    let content = Dims2::splat(64);
    let bank = dog_bank(12, 0.5, 0.5);
    let mut params = DogColorParams::default();
    params.kwta.on = false;
    let mut dog = DogColor::configure(
        params,
        content,
        1,
        bank.slice(s![DOG_ON, .., ..]),
        bank.slice(s![DOG_OFF, .., ..]),
    )
    .unwrap();

    // red square on black
    let mut rgb = Array3::<f32>::zeros((3, 64, 64));
    rgb.slice_mut(s![0, 16..48, 16..48]).fill(1.0);
    dog.set_image(0, rgb.view()).unwrap();
    dog.run(&mut context(BarrierPolicy::DataDependent)).unwrap();

    let out = dog.output(0).unwrap();
    assert_eq!(out.dim(), (4, 4, 2, 2));
    assert!(out[[2, 2, 0, DogColor::RED_GREEN]] > 0.0);
    assert_eq!(out[[2, 2, 1, DogColor::RED_GREEN]], 0.0);
}

#[test]
fn test_dog_color_with_kwta_stays_bounded() {
    let content = Dims2::splat(64);
    let bank = dog_bank(12, 0.5, 0.5);
    let mut dog = DogColor::configure(
        DogColorParams::default(),
        content,
        1,
        bank.slice(s![DOG_ON, .., ..]),
        bank.slice(s![DOG_OFF, .., ..]),
    )
    .unwrap();
    let mut rgb = Array3::<f32>::zeros((3, 64, 64));
    rgb.slice_mut(s![2, 16..48, 16..48]).fill(1.0);
    dog.set_image(0, rgb.view()).unwrap();
    let stats = dog.run(&mut context(BarrierPolicy::Full)).unwrap();
    assert_eq!(stats.kwta.len(), 1);
    assert!(dog
        .output(0)
        .unwrap()
        .iter()
        .all(|&v| (0.0..=1.0).contains(&v)));
}

#[test]
fn test_dog_color_kernel_mismatch() {
    let a = dog_bank(12, 0.5, 0.5);
    let b = dog_bank(8, 0.5, 0.5);
    let err = DogColor::configure(
        DogColorParams::default(),
        Dims2::splat(64),
        1,
        a.slice(s![DOG_ON, .., ..]),
        b.slice(s![DOG_OFF, .., ..]),
    )
    .unwrap_err();
    assert!(matches!(err, VisionError::ShapeMismatch(_)));
}

fn v1c_params() -> V1cParams {
    V1cParams {
        spacing: 2,
        ..V1cParams::default()
    }
}

#[test]
fn test_v1c_grey_line_features() {
    let content = Dims2::splat(32);
    let gabor = gabor_bank(6, 4, 6.0, 0.3, 0.2, 0.0);
    let mut v1c = V1cGrey::configure(v1c_params(), content, 1, gabor.view()).unwrap();
    assert_eq!(v1c.complex_geometry().output_size, Dims2::splat(8));

    let line = bar_image(content, 1, Dims2::new(0, 15), Dims2::new(32, 2), 1.0, 0.0);
    v1c.set_image(0, line.view()).unwrap();
    let stats = v1c.run(&mut context(BarrierPolicy::Full)).unwrap();
    assert_eq!(stats.kwta.len(), 1);

    let out = v1c.output(0).unwrap();
    assert_eq!(out.dim(), (8, 8, V1C_ROWS_GREY, 4));
    assert!(out.iter().all(|v| v.is_finite()));

    let pooled = out.slice(s![.., .., 3..5, ..]);
    let peak = pooled.fold(0.0f32, |m, &v| m.max(v));
    assert!(peak > 0.0);
    assert!(pooled.iter().all(|&v| (0.0..=1.0).contains(&v)));
    // far from the line
    for v in out.slice(s![0, 0, 3..5, ..]).iter() {
        assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-6);
    }
    // simple cells are the KWTA activations before pooling
    assert_eq!(v1c.simple(0).unwrap().dim(), (16, 16, 2, 4));
}

#[test]
fn test_v1c_rejects_wrong_angle_count() {
    let gabor = gabor_bank(6, 8, 6.0, 0.3, 0.2, 0.0);
    assert!(matches!(
        V1cGrey::configure(v1c_params(), Dims2::splat(32), 1, gabor.view()),
        Err(VisionError::InvalidParameter(_))
    ));
}

#[test]
fn test_v1c_color_rows_and_fade() {
    let content = Dims2::splat(32);
    let gabor = gabor_bank(6, 4, 6.0, 0.3, 0.2, 0.0);
    let image = bar_image(content, 3, Dims2::new(0, 15), Dims2::new(32, 2), 0.9, 0.2);

    for split_color in [true, false] {
        let params = V1cColorParams {
            v1c: v1c_params(),
            split_color,
            ..V1cColorParams::default()
        };
        let mut v1c = V1cColor::configure(params, content, 1, gabor.view()).unwrap();
        v1c.set_image(0, image.view()).unwrap();

        let expected = edge_average(image.view(), v1c.geometry().filter_right.x);
        let fade = v1c.fade_color(0).unwrap();
        for c in 0..3 {
            assert_abs_diff_eq!(fade[c], expected[c], epsilon = 1e-6);
        }

        let stats = v1c.run(&mut context(BarrierPolicy::DataDependent)).unwrap();
        // one KWTA per opponent channel
        assert_eq!(stats.kwta.len(), 3);
        let out = v1c.output(0).unwrap();
        assert_eq!(out.dim(), (8, 8, v1c.rows(), 4));
        assert_eq!(v1c.rows(), if split_color { 9 } else { 5 });
        assert!(out.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_motion_dog_rightward() {
    let content = Dims2::splat(64);
    let bank = dog_bank(8, 0.125, 0.25);
    let params = MotionDogParams {
        spacing: 2,
        star: true,
        ..MotionDogParams::default()
    };
    let mut motion =
        MotionDog::configure(params, content, 1, bank.slice(s![DOG_NET, .., ..])).unwrap();
    let mut ctx = context(BarrierPolicy::DataDependent);

    motion.reset();
    for frame in 0..16 {
        let bar = bar_image(content, 1, Dims2::new(8 + 2 * frame, 0), Dims2::new(8, 64), 1.0, 0.0);
        motion.set_image(0, bar.view()).unwrap();
        motion.run(&mut ctx).unwrap();
    }

    let signal = motion.signal(0).unwrap();
    assert!(signal.energy > 0.0);
    assert!(signal.horizontal() > 0.0, "{:?}", signal);
    assert_eq!(signal.direction(MotionDirection::Right), signal.right);

    let star = motion.star(0).unwrap().expect("star map configured");
    assert_eq!(star.dim(), (32, 32, 2, MotionDirection::COUNT));

    motion.reset();
    assert_eq!(motion.signal(0).unwrap(), MotionSignal::default());
    assert_eq!(motion.full_field(0).unwrap(), [0.0; 4]);
}

#[test]
fn test_pipelines_share_one_context() {
    let content = Dims2::splat(32);
    let dog_kernel = dog_bank(8, 0.125, 0.25);
    let gabor = gabor_bank(6, 4, 6.0, 0.3, 0.2, 0.0);
    let mut dog = DogGrey::configure(
        DogGreyParams {
            spacing: 2,
            ..DogGreyParams::default()
        },
        content,
        1,
        dog_kernel.slice(s![DOG_NET, .., ..]),
    )
    .unwrap();
    let mut v1c = V1cGrey::configure(v1c_params(), content, 1, gabor.view()).unwrap();
    let image = bar_image(content, 1, Dims2::new(10, 10), Dims2::new(6, 6), 1.0, 0.0);
    dog.set_image(0, image.view()).unwrap();
    v1c.set_image(0, image.view()).unwrap();

    let mut ctx = context(BarrierPolicy::Full);
    dog.run(&mut ctx).unwrap();
    v1c.run(&mut ctx).unwrap();
    dog.run(&mut ctx).unwrap();
    assert_eq!(ctx.switches(), 3);
    assert_eq!(ctx.bound_pipeline(), Some(dog.pipeline().id()));
}

#[test]
fn test_motion_dog_rejects_non_positive_taus() {
    let bank = dog_bank(8, 0.125, 0.25);
    for (fast, slow, integ) in [(0.0, 10.0, 5.0), (5.0, -1.0, 5.0), (5.0, 10.0, f32::NAN)] {
        let mut params = MotionDogParams::default();
        params.motion.fast_tau = fast;
        params.motion.slow_tau = slow;
        params.motion.integ_tau = integ;
        assert!(matches!(
            MotionDog::configure(params, Dims2::splat(32), 1, bank.slice(s![DOG_NET, .., ..])),
            Err(VisionError::InvalidParameter(_))
        ));
    }
}
