// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Element-wise transforms, scalar reductions, gathering and KWTA dispatch over
//! Values slots.

use ndarray::{s, Zip};

use crate::exec::RowMap;
use crate::geometry::Dims2;
use crate::inhibition::{run_pooled, KwtaOutcome, KwtaParams, PoolShape};
use crate::ops::ScalarReduce;
use crate::registry::{BufferRegistry, InhibSlot, ScalarSlot, Value4DSlot, ValueSlot, POLARITIES};

/// Apply a per-batch element function over `[..size][polarity][..features]`.
///
/// `per_batch(b)` builds the function used for batch entry `b`.
pub fn map_elementwise<M, F, G>(
    reg: &mut BufferRegistry,
    input: ValueSlot,
    output: ValueSlot,
    size: Dims2,
    features: usize,
    rows: &M,
    per_batch: F,
) where
    M: RowMap,
    F: Fn(usize) -> G,
    G: Fn(f32) -> f32 + Sync + Send,
{
    for b in 0..reg.batch() {
        let f = per_batch(b);
        let src = reg
            .values
            .data()
            .slice(s![input.0, b, ..size.y, ..size.x, .., ..features])
            .to_owned();
        let mut dst = reg
            .values
            .data_mut()
            .slice_mut(s![output.0, b, ..size.y, ..size.x, .., ..features]);
        let work: Vec<_> = dst.outer_iter_mut().zip(src.outer_iter()).collect();
        rows.map_rows(work, |(mut d, s)| {
            Zip::from(&mut d).and(&s).for_each(|d, &v| *d = f(v));
        });
    }
}

/// Reduce each row of the input into one partial scalar
pub fn agg_scalar<M: RowMap>(
    reg: &mut BufferRegistry,
    reduce: ScalarReduce,
    input: ValueSlot,
    size: Dims2,
    features: usize,
    partials: ScalarSlot,
    rows: &M,
) {
    for b in 0..reg.batch() {
        let src = reg
            .values
            .data()
            .slice(s![input.0, b, ..size.y, ..size.x, .., ..features]);
        let work: Vec<_> = src.outer_iter().collect();
        let row_partials = rows.map_rows(work, |row| match reduce {
            ScalarReduce::Max => row.fold(f32::NEG_INFINITY, |m, &v| m.max(v)),
            ScalarReduce::Sum | ScalarReduce::Mean => row.sum(),
        });
        let scalars = reg.scalars.data_mut();
        for (y, p) in row_partials.into_iter().enumerate() {
            scalars[[partials.0 + y, b]] = p;
        }
    }
}

/// Combine `count` partials into one scalar
pub fn finish_scalar(
    reg: &mut BufferRegistry,
    reduce: ScalarReduce,
    partials: ScalarSlot,
    count: usize,
    elements: usize,
    output: ScalarSlot,
) {
    let scalars = reg.scalars.data_mut();
    for b in 0..scalars.len_of(ndarray::Axis(1)) {
        let parts = (0..count).map(|i| scalars[[partials.0 + i, b]]);
        let total = match reduce {
            ScalarReduce::Max => parts.fold(f32::NEG_INFINITY, f32::max),
            ScalarReduce::Sum => parts.sum(),
            ScalarReduce::Mean => {
                let sum: f32 = parts.sum();
                if elements > 0 {
                    sum / elements as f32
                } else {
                    0.0
                }
            }
        };
        scalars[[output.0, b]] = total;
    }
}

/// Polarity 0 receives the max of both polarities; polarity 1 is cleared
pub fn max_polarity<M: RowMap>(
    reg: &mut BufferRegistry,
    input: ValueSlot,
    output: ValueSlot,
    size: Dims2,
    features: usize,
    rows: &M,
) {
    for b in 0..reg.batch() {
        let src = reg
            .values
            .data()
            .slice(s![input.0, b, ..size.y, ..size.x, .., ..features])
            .to_owned();
        let mut dst = reg
            .values
            .data_mut()
            .slice_mut(s![output.0, b, ..size.y, ..size.x, .., ..features]);
        let work: Vec<_> = dst.outer_iter_mut().zip(src.outer_iter()).collect();
        rows.map_rows(work, |(mut d, s)| {
            for x in 0..size.x {
                for f in 0..features {
                    d[[x, 0, f]] = s[[x, 0, f]].max(s[[x, 1, f]]);
                    d[[x, 1, f]] = 0.0;
                }
            }
        });
    }
}

pub fn max_copy<M: RowMap>(
    reg: &mut BufferRegistry,
    input_a: ValueSlot,
    input_b: ValueSlot,
    output: ValueSlot,
    size: Dims2,
    features: usize,
    rows: &M,
) {
    for b in 0..reg.batch() {
        let values = reg.values.data();
        let a = values
            .slice(s![input_a.0, b, ..size.y, ..size.x, .., ..features])
            .to_owned();
        let bv = values
            .slice(s![input_b.0, b, ..size.y, ..size.x, .., ..features])
            .to_owned();
        let mut dst = reg
            .values
            .data_mut()
            .slice_mut(s![output.0, b, ..size.y, ..size.x, .., ..features]);
        let work: Vec<_> = dst
            .outer_iter_mut()
            .zip(a.outer_iter())
            .zip(bv.outer_iter())
            .collect();
        rows.map_rows(work, |((mut d, ra), rb)| {
            Zip::from(&mut d)
                .and(&ra)
                .and(&rb)
                .for_each(|d, &x, &y| *d = x.max(y));
        });
    }
}

/// Copy `[Y][X][polarity][feature]` into unit rows `row_offset..` of a 4D slot
#[allow(clippy::too_many_arguments)]
pub fn to_4d<M: RowMap>(
    reg: &mut BufferRegistry,
    input: ValueSlot,
    output: Value4DSlot,
    size: Dims2,
    polarities: usize,
    features: usize,
    row_offset: usize,
    rows: &M,
) {
    for b in 0..reg.batch() {
        let src = reg
            .values
            .data()
            .slice(s![input.0, b, ..size.y, ..size.x, ..polarities, ..features]);
        let mut dst = reg.values4d.data_mut().slice_mut(s![
            output.0,
            b,
            ..size.y,
            ..size.x,
            row_offset..row_offset + polarities,
            ..features
        ]);
        let work: Vec<_> = dst.outer_iter_mut().zip(src.outer_iter()).collect();
        rows.map_rows(work, |(mut d, s)| d.assign(&s));
    }
}

/// Pooled KWTA for every batch entry; `[Y][X]` positions are the pools
#[allow(clippy::too_many_arguments)]
pub fn kwta<M: RowMap>(
    reg: &mut BufferRegistry,
    params: &KwtaParams,
    input: ValueSlot,
    ext_gi: Option<ValueSlot>,
    output: ValueSlot,
    inhibs: InhibSlot,
    size: Dims2,
    features: usize,
    rows: &M,
) -> Vec<KwtaOutcome> {
    let shape = PoolShape {
        pools: size,
        polarities: POLARITIES,
        features,
    };
    let mut outcomes = Vec::with_capacity(reg.batch());
    for b in 0..reg.batch() {
        let values = reg.values.data();
        let ge = values
            .slice(s![input.0, b, ..size.y, ..size.x, .., ..features])
            .to_owned();
        let ext = ext_gi.map(|e| {
            values
                .slice(s![e.0, b, ..size.y, ..size.x, .., ..features])
                .to_owned()
        });
        let act = reg
            .values
            .data_mut()
            .slice_mut(s![output.0, b, .., .., .., ..]);
        let inh = reg.inhibs.data_mut().slice_mut(s![inhibs.0, b, .., .., ..]);
        outcomes.push(run_pooled(
            params,
            shape,
            ge.view(),
            ext.as_ref().map(|e| e.view()),
            act,
            inh,
            rows,
        ));
    }
    outcomes
}
