// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Motion integration, star motion and full-field aggregation

use ndarray::{s, Zip};

use crate::exec::RowMap;
use crate::geometry::Dims2;
use crate::motion::{MotionDirection, MotionParams};
use crate::registry::{BufferRegistry, ScalarSlot, ValueSlot};

/// One frame of fast and slow integration of `input`
#[allow(clippy::too_many_arguments)]
pub fn integrate<M: RowMap>(
    reg: &mut BufferRegistry,
    input: ValueSlot,
    fast: ValueSlot,
    slow: ValueSlot,
    size: Dims2,
    features: usize,
    params: &MotionParams,
    rows: &M,
) {
    let (fast_dt, slow_dt) = (params.fast_dt(), params.slow_dt());
    for b in 0..reg.batch() {
        let src = reg
            .values
            .data()
            .slice(s![input.0, b, ..size.y, ..size.x, .., ..features])
            .to_owned();
        let (mut fast_v, mut slow_v) = reg.values.data_mut().multi_slice_mut((
            s![fast.0, b, ..size.y, ..size.x, .., ..features],
            s![slow.0, b, ..size.y, ..size.x, .., ..features],
        ));
        let work: Vec<_> = fast_v
            .outer_iter_mut()
            .zip(slow_v.outer_iter_mut())
            .zip(src.outer_iter())
            .collect();
        rows.map_rows(work, |((mut f, mut sl), v)| {
            Zip::from(&mut f)
                .and(&mut sl)
                .and(&v)
                .for_each(|f, sl, &v| {
                    *f = MotionParams::integrate(v, *f, fast_dt);
                    *sl = MotionParams::integrate(v, *sl, slow_dt);
                });
        });
    }
}

/// Star motion between each cell and its right and upper-row neighbors.
///
/// Output feature `f * 4 + d` holds direction `d` for source feature `f`. The last
/// row and column have no neighbor pair and stay zero.
#[allow(clippy::too_many_arguments)]
pub fn star<M: RowMap>(
    reg: &mut BufferRegistry,
    fast: ValueSlot,
    slow: ValueSlot,
    output: ValueSlot,
    size: Dims2,
    features: usize,
    params: &MotionParams,
    rows: &M,
) {
    let nd = MotionDirection::COUNT;
    for b in 0..reg.batch() {
        let values = reg.values.data();
        let fv = values
            .slice(s![fast.0, b, ..size.y, ..size.x, .., ..features])
            .to_owned();
        let sv = values
            .slice(s![slow.0, b, ..size.y, ..size.x, .., ..features])
            .to_owned();
        let mut dst = reg
            .values
            .data_mut()
            .slice_mut(s![output.0, b, ..size.y, ..size.x, .., ..features * nd]);
        let work: Vec<_> = dst.outer_iter_mut().enumerate().collect();
        rows.map_rows(work, |(y, mut row)| {
            row.fill(0.0);
            if y + 1 >= size.y {
                return;
            }
            for x in 0..size.x.saturating_sub(1) {
                for p in 0..fv.len_of(ndarray::Axis(2)) {
                    for f in 0..features {
                        let (fc, sc) = (fv[[y, x, p, f]], sv[[y, x, p, f]]);
                        let (left, right) =
                            params.star_pair(fc, sc, fv[[y, x + 1, p, f]], sv[[y, x + 1, p, f]]);
                        let (down, up) =
                            params.star_pair(fc, sc, fv[[y + 1, x, p, f]], sv[[y + 1, x, p, f]]);
                        row[[x, p, MotionDirection::Left.star_feature(f)]] = left;
                        row[[x, p, MotionDirection::Right.star_feature(f)]] = right;
                        row[[x, p, MotionDirection::Down.star_feature(f)]] = down;
                        row[[x, p, MotionDirection::Up.star_feature(f)]] = up;
                    }
                }
            }
        });
    }
}

/// Sum star motion per direction into `output..output+4`
pub fn full_field<M: RowMap>(
    reg: &mut BufferRegistry,
    star: ValueSlot,
    output: ScalarSlot,
    size: Dims2,
    features: usize,
    rows: &M,
) {
    let nd = MotionDirection::COUNT;
    for b in 0..reg.batch() {
        let src = reg
            .values
            .data()
            .slice(s![star.0, b, ..size.y, ..size.x, .., ..features * nd]);
        let work: Vec<_> = src.outer_iter().collect();
        let row_sums = rows.map_rows(work, |row| {
            let mut sums = [0.0f32; 4];
            for ((_, _, k), &v) in row.indexed_iter() {
                sums[k % nd] += v;
            }
            sums
        });
        let mut totals = [0.0f32; 4];
        for sums in &row_sums {
            for (t, s) in totals.iter_mut().zip(sums) {
                *t += s;
            }
        }
        let scalars = reg.scalars.data_mut();
        for (d, t) in totals.into_iter().enumerate() {
            scalars[[output.0 + d, b]] = t;
        }
    }
}

/// Integrate normalized full-field motion into `integrated..integrated+5`
pub fn normalize(
    reg: &mut BufferRegistry,
    energy: ScalarSlot,
    full_field: ScalarSlot,
    integrated: ScalarSlot,
    params: &MotionParams,
) {
    let scalars = reg.scalars.data_mut();
    for b in 0..scalars.len_of(ndarray::Axis(1)) {
        let e = scalars[[energy.0, b]];
        let raw: [f32; 4] = std::array::from_fn(|d| scalars[[full_field.0 + d, b]]);
        let mut state: [f32; 5] = std::array::from_fn(|i| scalars[[integrated.0 + i, b]]);
        params.full_field_step(e, &raw, &mut state);
        for (i, v) in state.into_iter().enumerate() {
            scalars[[integrated.0 + i, b]] = v;
        }
    }
}
