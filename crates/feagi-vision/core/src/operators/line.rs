// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fixed 4-orientation complex-cell rules.
//!
//! Feature `a` of the input is a line at angle `a * 45°`. Its unit step along the
//! line is `LINE_STEP[a]` as `(dy, dx)`; the orthogonal angle is `(a + 2) % 4`.
//! Neighbors outside the grid contribute nothing.

use ndarray::{s, Array4};

use crate::exec::RowMap;
use crate::geometry::Dims2;
use crate::ops::LINE_ANGLES;
use crate::registry::{BufferRegistry, ValueSlot, POLARITIES};

/// Step along each line angle, `(dy, dx)`
pub const LINE_STEP: [(isize, isize); LINE_ANGLES] = [(0, 1), (1, 1), (1, 0), (1, -1)];

#[inline]
pub fn orthogonal(angle: usize) -> usize {
    (angle + 2) % LINE_ANGLES
}

/// Value at `(y, x) + scale * step`, if inside `size`
#[inline]
#[allow(clippy::too_many_arguments)]
fn neighbor(
    grid: &Array4<f32>,
    size: Dims2,
    y: usize,
    x: usize,
    step: (isize, isize),
    scale: isize,
    polarity: usize,
    feature: usize,
) -> Option<f32> {
    let ny = y as isize + scale * step.0;
    let nx = x as isize + scale * step.1;
    if ny < 0 || nx < 0 || ny >= size.y as isize || nx >= size.x as isize {
        return None;
    }
    Some(grid[[ny as usize, nx as usize, polarity, feature]])
}

fn snapshot(reg: &BufferRegistry, slot: ValueSlot, b: usize, size: Dims2) -> Array4<f32> {
    reg.values
        .data()
        .slice(s![slot.0, b, ..size.y, ..size.x, .., ..LINE_ANGLES])
        .to_owned()
}

/// External inhibition: `gi` times the strongest same-angle response at the two
/// orthogonal neighbors, per polarity
pub fn neigh_inhib4<M: RowMap>(
    reg: &mut BufferRegistry,
    input: ValueSlot,
    output: ValueSlot,
    size: Dims2,
    gi: f32,
    rows: &M,
) {
    for b in 0..reg.batch() {
        let src = snapshot(reg, input, b, size);
        let mut dst = reg
            .values
            .data_mut()
            .slice_mut(s![output.0, b, ..size.y, ..size.x, .., ..LINE_ANGLES]);
        let work: Vec<_> = dst.outer_iter_mut().enumerate().collect();
        rows.map_rows(work, |(y, mut row)| {
            for x in 0..size.x {
                for p in 0..POLARITIES {
                    for a in 0..LINE_ANGLES {
                        let step = LINE_STEP[orthogonal(a)];
                        let fwd = neighbor(&src, size, y, x, step, 1, p, a).unwrap_or(0.0);
                        let back = neighbor(&src, size, y, x, step, -1, p, a).unwrap_or(0.0);
                        row[[x, p, a]] = gi * fwd.max(back);
                    }
                }
            }
        });
    }
}

/// Polarity 0 of the output is the mean of the center and its two neighbors
/// along the line; polarity 1 is cleared
pub fn len_sum4<M: RowMap>(
    reg: &mut BufferRegistry,
    input: ValueSlot,
    output: ValueSlot,
    size: Dims2,
    rows: &M,
) {
    for b in 0..reg.batch() {
        let src = snapshot(reg, input, b, size);
        let mut dst = reg
            .values
            .data_mut()
            .slice_mut(s![output.0, b, ..size.y, ..size.x, .., ..LINE_ANGLES]);
        let work: Vec<_> = dst.outer_iter_mut().enumerate().collect();
        rows.map_rows(work, |(y, mut row)| {
            for x in 0..size.x {
                for a in 0..LINE_ANGLES {
                    let step = LINE_STEP[a];
                    let center = src[[y, x, 0, a]];
                    let fwd = neighbor(&src, size, y, x, step, 1, 0, a).unwrap_or(0.0);
                    let back = neighbor(&src, size, y, x, step, -1, 0, a).unwrap_or(0.0);
                    row[[x, 0, a]] = (center + fwd + back) / 3.0;
                    row[[x, 1, a]] = 0.0;
                }
            }
        });
    }
}

/// End stopping: polarity `d` holds the response for the line ending in direction
/// `d` (0 = forward along the step, 1 = backward).
///
/// `es = max(0, min(lenSum(c), in(n, orth)) - in(n, a))` where `n` is the next
/// position along the line; zero when `n` lies outside the grid.
pub fn end_stop4<M: RowMap>(
    reg: &mut BufferRegistry,
    input: ValueSlot,
    len_sum: ValueSlot,
    output: ValueSlot,
    size: Dims2,
    rows: &M,
) {
    for b in 0..reg.batch() {
        let src = snapshot(reg, input, b, size);
        let ls = snapshot(reg, len_sum, b, size);
        let mut dst = reg
            .values
            .data_mut()
            .slice_mut(s![output.0, b, ..size.y, ..size.x, .., ..LINE_ANGLES]);
        let work: Vec<_> = dst.outer_iter_mut().enumerate().collect();
        rows.map_rows(work, |(y, mut row)| {
            for x in 0..size.x {
                for a in 0..LINE_ANGLES {
                    let step = LINE_STEP[a];
                    let orth = orthogonal(a);
                    let center = ls[[y, x, 0, a]];
                    for (d, scale) in [(0usize, 1isize), (1, -1)] {
                        let along = neighbor(&src, size, y, x, step, scale, 0, a);
                        let across = neighbor(&src, size, y, x, step, scale, 0, orth);
                        row[[x, d, a]] = match (along, across) {
                            (Some(on), Some(off)) => (center.min(off) - on).max(0.0),
                            _ => 0.0,
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

    fn grid_with_horizontal_line() -> (BufferRegistry, ValueSlot, ValueSlot, ValueSlot, Dims2) {
        let size = Dims2::new(7, 5);
        let mut reg = BufferRegistry::new(1).unwrap();
        let input = reg.new_values(size, LINE_ANGLES).unwrap();
        let ls = reg.new_values(size, LINE_ANGLES).unwrap();
        let out = reg.new_values(size, LINE_ANGLES).unwrap();
        {
            let mut v = reg.values.slot_mut(input.0);
            // horizontal segment on row 2, columns 1..=4, angle 0
            for x in 1..=4 {
                v[[0, 2, x, 0, 0]] = 1.0;
            }
            // vertical response just past the right end
            v[[0, 2, 5, 0, 2]] = 0.8;
        }
        (reg, input, ls, out, size)
    }

    #[test]
    fn test_len_sum_interior_vs_end() {
        let (mut reg, input, ls, _, size) = grid_with_horizontal_line();
        len_sum4(&mut reg, input, ls, size, &SequentialRows);
        let v = reg.values.slot(ls.0);
        assert!((v[[0, 2, 2, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((v[[0, 2, 4, 0, 0]] - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(v[[0, 2, 2, 0, 2]], 0.0);
    }

    #[test]
    fn test_end_stop_fires_at_line_end() {
        let (mut reg, input, ls, out, size) = grid_with_horizontal_line();
        len_sum4(&mut reg, input, ls, size, &SequentialRows);
        end_stop4(&mut reg, input, ls, out, size, &SequentialRows);
        let v = reg.values.slot(out.0);
        // right end: next along is empty, orthogonal response present
        assert!((v[[0, 2, 4, 0, 0]] - 2.0 / 3.0).abs() < 1e-6);
        // interior: continuation suppresses the end-stop response
        assert_eq!(v[[0, 2, 2, 0, 0]], 0.0);
    }

    #[test]
    fn test_neigh_inhib_reads_orthogonal_neighbors() {
        let (mut reg, input, _, out, size) = grid_with_horizontal_line();
        neigh_inhib4(&mut reg, input, out, size, 0.6, &SequentialRows);
        let v = reg.values.slot(out.0);
        // directly above and below the horizontal line
        assert!((v[[0, 1, 2, 0, 0]] - 0.6).abs() < 1e-6);
        assert!((v[[0, 3, 2, 0, 0]] - 0.6).abs() < 1e-6);
        // along the line itself there is no orthogonal neighbor
        assert_eq!(v[[0, 2, 2, 0, 0]], 0.0);
    }
}
