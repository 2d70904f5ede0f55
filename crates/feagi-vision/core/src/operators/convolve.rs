// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sliding-window convolution of image channels with filter banks.
//!
//! The window for output `(y, x)` starts at [`Geometry::window_origin`]; a signed
//! response `v` is written as `max(v, 0)` to polarity 0 and `max(-v, 0)` to
//! polarity 1.

use ndarray::{s, ArrayView2, Zip};

use crate::exec::RowMap;
use crate::geometry::Geometry;
use crate::registry::{BufferRegistry, FilterSlot, ImageSlot, ValueSlot};

#[derive(Debug, Clone, Copy)]
pub struct ImageConv {
    pub input: ImageSlot,
    pub channel: usize,
    pub filters: FilterSlot,
    pub filter_count: usize,
    pub gain: f32,
    pub output: ValueSlot,
}

#[derive(Debug, Clone, Copy)]
pub struct DiffConv {
    pub input_a: ImageSlot,
    pub channel_a: usize,
    pub input_b: ImageSlot,
    pub channel_b: usize,
    pub filters: FilterSlot,
    pub filter_a: usize,
    pub filter_b: usize,
    pub gain: f32,
    pub gain_on: f32,
    pub output: ValueSlot,
    pub feature: usize,
}

/// Dot product of the filter window at output `(y, x)` with `kernel`
#[inline]
fn window_dot(
    image: &ArrayView2<f32>,
    kernel: &ArrayView2<f32>,
    geom: &Geometry,
    y: usize,
    x: usize,
) -> f32 {
    let (wy, wx) = geom.window_origin(y, x);
    let (fy, fx) = (geom.filter_size.y, geom.filter_size.x);
    let window = image.slice(s![wy..wy + fy, wx..wx + fx]);
    Zip::from(&window)
        .and(kernel)
        .fold(0.0f32, |acc, &a, &k| acc + a * k)
}

#[inline]
fn polarities(v: f32) -> (f32, f32) {
    (v.max(0.0), (-v).max(0.0))
}

pub fn convolve_image<M: RowMap>(
    reg: &mut BufferRegistry,
    conv: ImageConv,
    geom: &Geometry,
    rows: &M,
) {
    let (fy, fx) = (geom.filter_size.y, geom.filter_size.x);
    let (oy, ox) = (geom.output_size.y, geom.output_size.x);
    let nf = conv.filter_count;
    let bank = reg.filters.slot(conv.filters.0);
    let kernels: Vec<ArrayView2<f32>> = (0..nf).map(|f| bank.slice(s![f, ..fy, ..fx])).collect();

    for b in 0..reg.batch() {
        let image = reg
            .images
            .data()
            .slice(s![conv.input.0, b, conv.channel, .., ..]);
        let mut out = reg
            .values
            .data_mut()
            .slice_mut(s![conv.output.0, b, ..oy, ..ox, .., ..nf]);
        let work: Vec<_> = out.outer_iter_mut().enumerate().collect();
        rows.map_rows(work, |(y, mut row)| {
            for x in 0..ox {
                for (f, kernel) in kernels.iter().enumerate() {
                    let v = conv.gain * window_dot(&image, kernel, geom, y, x);
                    let (on, off) = polarities(v);
                    row[[x, 0, f]] = on;
                    row[[x, 1, f]] = off;
                }
            }
        });
    }
}

pub fn convolve_diff<M: RowMap>(
    reg: &mut BufferRegistry,
    conv: DiffConv,
    geom: &Geometry,
    rows: &M,
) {
    let (fy, fx) = (geom.filter_size.y, geom.filter_size.x);
    let (oy, ox) = (geom.output_size.y, geom.output_size.x);
    let bank = reg.filters.slot(conv.filters.0);
    let kernel_a = bank.slice(s![conv.filter_a, ..fy, ..fx]);
    let kernel_b = bank.slice(s![conv.filter_b, ..fy, ..fx]);

    for b in 0..reg.batch() {
        let images = reg.images.data();
        let image_a = images.slice(s![conv.input_a.0, b, conv.channel_a, .., ..]);
        let image_b = images.slice(s![conv.input_b.0, b, conv.channel_b, .., ..]);
        let mut out = reg
            .values
            .data_mut()
            .slice_mut(s![conv.output.0, b, ..oy, ..ox, .., conv.feature]);
        let work: Vec<_> = out.outer_iter_mut().enumerate().collect();
        rows.map_rows(work, |(y, mut row)| {
            for x in 0..ox {
                let a = window_dot(&image_a, &kernel_a, geom, y, x);
                let bv = window_dot(&image_b, &kernel_b, geom, y, x);
                let (on, off) = polarities(conv.gain * (conv.gain_on * a - bv));
                row[[x, 0]] = on;
                row[[x, 1]] = off;
            }
        });
    }
}
