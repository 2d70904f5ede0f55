// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Spatial max pooling over Values grids

use ndarray::s;

use crate::exec::RowMap;
use crate::geometry::Dims2;
use crate::registry::{BufferRegistry, ValueSlot};

#[derive(Debug, Clone, Copy)]
pub struct PoolSpec {
    pub input: ValueSlot,
    pub output: ValueSlot,
    pub input_size: Dims2,
    pub output_size: Dims2,
    pub pool: Dims2,
    pub spacing: Dims2,
    pub polarities: usize,
    pub features: usize,
}

/// Output `(y, x)` is the max over input rows `y*spacing.y .. +pool.y` and columns
/// `x*spacing.x .. +pool.x`; positions past the input edge are skipped and an empty
/// window yields zero.
pub fn max_pool<M: RowMap>(reg: &mut BufferRegistry, spec: PoolSpec, rows: &M) {
    let (iy, ix) = (spec.input_size.y, spec.input_size.x);
    let (oy, ox) = (spec.output_size.y, spec.output_size.x);
    let (np, nf) = (spec.polarities, spec.features);
    for b in 0..reg.batch() {
        let src = reg
            .values
            .data()
            .slice(s![spec.input.0, b, ..iy, ..ix, ..np, ..nf])
            .to_owned();
        let mut dst = reg
            .values
            .data_mut()
            .slice_mut(s![spec.output.0, b, ..oy, ..ox, ..np, ..nf]);
        let work: Vec<_> = dst.outer_iter_mut().enumerate().collect();
        rows.map_rows(work, |(y, mut row)| {
            let y0 = (y * spec.spacing.y).min(iy);
            let y1 = (y0 + spec.pool.y).min(iy);
            for x in 0..ox {
                let x0 = (x * spec.spacing.x).min(ix);
                let x1 = (x0 + spec.pool.x).min(ix);
                for p in 0..np {
                    for f in 0..nf {
                        let window = src.slice(s![y0..y1, x0..x1, p, f]);
                        row[[x, p, f]] = if window.is_empty() {
                            0.0
                        } else {
                            window.fold(f32::NEG_INFINITY, |m, &v| m.max(v))
                        };
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::SequentialRows;

    #[test]
    fn test_pool_never_exceeds_input_max() {
        let mut reg = BufferRegistry::new(1).unwrap();
        let input_size = Dims2::new(7, 6);
        let output_size = Dims2::new(4, 3);
        let a = reg.new_values(input_size, 2).unwrap();
        let o = reg.new_values(output_size, 2).unwrap();
        {
            let mut v = reg.values.slot_mut(a.0);
            for ((_, y, x, p, f), e) in v.indexed_iter_mut() {
                *e = ((y * 13 + x * 7 + p * 3 + f) % 17) as f32;
            }
        }
        let spec = PoolSpec {
            input: a,
            output: o,
            input_size,
            output_size,
            pool: Dims2::splat(4),
            spacing: Dims2::splat(2),
            polarities: 2,
            features: 2,
        };
        max_pool(&mut reg, spec, &SequentialRows);

        let src = reg.values.slot(a.0);
        let out = reg.values.slot(o.0);
        let global = src.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        for y in 0..output_size.y {
            for x in 0..output_size.x {
                for p in 0..2 {
                    for f in 0..2 {
                        let v = out[[0, y, x, p, f]];
                        assert!(v <= global);
                        let (y0, x0) = (2 * y, 2 * x);
                        let window =
                            src.slice(s![0, y0..(y0 + 4).min(6), x0..(x0 + 4).min(7), p, f]);
                        assert!(
                            window.iter().any(|&w| w == v),
                            "pooled value must come from its window"
                        );
                    }
                }
            }
        }
    }
}
