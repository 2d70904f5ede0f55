// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Operator chains driven through `operators::apply`, as a backend would run them

use approx::assert_abs_diff_eq;
use feagi_vision_core::operators;
use feagi_vision_core::testing::{bar_image, dog_bank, gabor_bank, DOG_NET};
use feagi_vision_core::{
    BufferRegistry, ConvergenceState, Dims2, Geometry, KwtaParams, Operation, SequentialRows,
    POLARITIES,
};
use ndarray::{s, Axis};

fn run_all(reg: &mut BufferRegistry, ops: &[Operation]) {
    for op in ops {
        op.validate(reg).unwrap();
        operators::apply(op, reg, &SequentialRows).unwrap();
    }
}

/// Content coordinate `(row, col)` under the kernel center of output `(y, x)`
fn center_of(geom: &Geometry, y: usize, x: usize) -> (f32, f32) {
    let (wy, wx) = geom.window_origin(y, x);
    let half_y = (geom.filter_size.y as f32 - 1.0) / 2.0;
    let half_x = (geom.filter_size.x as f32 - 1.0) / 2.0;
    (
        wy as f32 + half_y - geom.border.y as f32,
        wx as f32 + half_x - geom.border.x as f32,
    )
}

#[test]
fn test_dog_responds_at_bar_only() {
    let content = Dims2::splat(128);
    let geom =
        Geometry::with_content(Dims2::splat(0), Dims2::splat(4), Dims2::splat(12), content)
            .unwrap();
    assert_eq!(geom.output_size, Dims2::splat(32));

    let mut reg = BufferRegistry::new(1).unwrap();
    let raw = reg.new_image(geom.input_size).unwrap();
    let padded = reg.new_image(geom.input_size).unwrap();
    let filters = reg.new_filters(1, geom.filter_size).unwrap();
    let out = reg.new_values(geom.output_size, 1).unwrap();

    // 8 wide, 16 tall
    let (bar_x, bar_y) = (60usize, 56usize);
    let image = bar_image(content, 1, Dims2::new(bar_x, bar_y), Dims2::new(8, 16), 1.0, 0.0);
    reg.set_image(raw, 0, image.view(), geom.border).unwrap();
    let bank = dog_bank(12, 0.125, 0.25);
    reg.set_filters(filters, bank.slice(s![DOG_NET..=DOG_NET, .., ..]))
        .unwrap();

    run_all(
        &mut reg,
        &[
            Operation::WrapPad {
                input: raw,
                output: padded,
                channels: 1,
                geom,
            },
            Operation::ConvolveImage {
                input: padded,
                channel: 0,
                filters,
                filter_count: 1,
                gain: 8.0,
                output: out,
                geom,
            },
        ],
    );

    let values = reg.values.slot(out.0);
    let values = values.index_axis(Axis(0), 0);
    let argmax = |pol: usize| {
        let mut best = ((0, 0), f32::NEG_INFINITY);
        for y in 0..geom.output_size.y {
            for x in 0..geom.output_size.x {
                let v = values[[y, x, pol, 0]];
                if v > best.1 {
                    best = ((y, x), v);
                }
            }
        }
        best
    };
    let near_bar = |(cy, cx): (f32, f32), margin: f32| {
        cy >= bar_y as f32 - margin
            && cy <= (bar_y + 16) as f32 + margin
            && cx >= bar_x as f32 - margin
            && cx <= (bar_x + 8) as f32 + margin
    };

    let ((oy, ox), on_max) = argmax(0);
    assert!(on_max > 0.0);
    assert!(near_bar(center_of(&geom, oy, ox), 2.0));

    let ((fy, fx), off_max) = argmax(1);
    assert!(off_max > 0.0);
    let off_center = center_of(&geom, fy, fx);
    assert!(near_bar(off_center, 12.0));
    assert!(!near_bar(off_center, -2.0), "off response sits on the bar surround");

    assert_eq!(values[[0, 0, 0, 0]], 0.0);
    assert_eq!(values[[31, 31, 1, 0]], 0.0);
}

#[test]
fn test_gabor_kwta_peaks_on_line() {
    let content = Dims2::splat(32);
    let geom =
        Geometry::with_content(Dims2::splat(0), Dims2::splat(2), Dims2::splat(6), content).unwrap();
    let size = geom.output_size;

    let mut reg = BufferRegistry::new(1).unwrap();
    let raw = reg.new_image(geom.input_size).unwrap();
    let padded = reg.new_image(geom.input_size).unwrap();
    let filters = reg.new_filters(4, geom.filter_size).unwrap();
    let drive = reg.new_values(size, 4).unwrap();
    let ext = reg.new_values(size, 4).unwrap();
    let act = reg.new_values(size, 4).unwrap();
    let inhibs = reg.new_inhibs(size).unwrap();
    let params = reg.new_kwta(KwtaParams::default());

    // horizontal line across the middle
    let image = bar_image(content, 1, Dims2::new(0, 15), Dims2::new(32, 2), 1.0, 0.0);
    reg.set_image(raw, 0, image.view(), geom.border).unwrap();
    reg.set_filters(filters, gabor_bank(6, 4, 6.0, 0.3, 0.2, 0.0).view())
        .unwrap();

    run_all(
        &mut reg,
        &[
            Operation::WrapPad {
                input: raw,
                output: padded,
                channels: 1,
                geom,
            },
            Operation::ConvolveImage {
                input: padded,
                channel: 0,
                filters,
                filter_count: 4,
                gain: 2.0,
                output: drive,
                geom,
            },
            Operation::NeighInhib4 {
                input: drive,
                output: ext,
                size,
                gi: 0.6,
            },
        ],
    );
    let kwta = Operation::Kwta {
        input: drive,
        ext_gi: Some(ext),
        output: act,
        inhibs,
        params,
        size,
        features: 4,
    };
    kwta.validate(&reg).unwrap();
    let outcomes = operators::apply(&kwta, &mut reg, &SequentialRows).unwrap();
    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert!(outcome.rounds() <= KwtaParams::default().iters);
    assert!(matches!(
        outcome.state,
        ConvergenceState::Converged { .. } | ConvergenceState::MaxItersReached { .. }
    ));

    let act_v = reg.values.slot(act.0);
    let mut best = (0usize, f32::NEG_INFINITY);
    for ((_, y, _, _, _), &a) in act_v.indexed_iter() {
        assert!((0.0..=1.0).contains(&a));
        if a > best.1 {
            best = (y, a);
        }
    }
    assert!(best.1 > 0.0);
    // line sits on content rows 15..17, output rows 7..=8 center on it
    assert!((6..=9).contains(&best.0), "strongest unit on row {}", best.0);
    // far from the line nothing drives the units
    for p in 0..POLARITIES {
        for f in 0..4 {
            assert_abs_diff_eq!(act_v[[0, 1, 1, p, f]], 0.0, epsilon = 1e-6);
        }
    }
}

#[test]
fn test_slots_survive_growth_between_operations() {
    let mut reg = BufferRegistry::new(2).unwrap();
    let small = reg.new_values(Dims2::new(2, 2), 1).unwrap();
    reg.values.slot_mut(small.0)[[1, 1, 1, 0, 0]] = 7.0;
    // grows every trailing axis of the Values arena
    let big = reg.new_values(Dims2::new(9, 5), 6).unwrap();
    assert_eq!(reg.values.slot(small.0)[[1, 1, 1, 0, 0]], 7.0);

    run_all(
        &mut reg,
        &[Operation::MaxPolarity {
            input: small,
            output: big,
            size: Dims2::new(2, 2),
            features: 1,
        }],
    );
    assert_eq!(reg.values.slot(big.0)[[1, 1, 1, 0, 0]], 7.0);
    assert_eq!(reg.values.slot(big.0)[[0, 1, 1, 0, 0]], 0.0);
}
