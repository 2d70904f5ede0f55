// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Border padding and colorspace decomposition over padded images

use ndarray::{s, Axis};

use crate::color::{lms_components as components, lms_opponents as opponents, srgb_to_lms};
use crate::exec::RowMap;
use crate::geometry::Geometry;
use crate::registry::{BufferRegistry, ImageSlot, ScalarSlot, IMAGE_CHANNELS};

/// Position in content coordinates for padded coordinate `p`, wrapping around
#[inline]
fn wrap(p: usize, border: usize, content: usize) -> usize {
    let rel = p as isize - border as isize;
    border + rel.rem_euclid(content as isize) as usize
}

/// Distance of `p` outside the content band, 0 inside
#[inline]
fn depth(p: usize, border: usize, content: usize) -> usize {
    if p < border {
        border - p
    } else if p >= border + content {
        p + 1 - border - content
    } else {
        0
    }
}

/// Copy content and fill the border, either wrapping or fading toward the color in
/// `fade..fade+3`
pub fn pad<M: RowMap>(
    reg: &mut BufferRegistry,
    input: ImageSlot,
    output: ImageSlot,
    channels: usize,
    fade: Option<ScalarSlot>,
    geom: &Geometry,
    rows: &M,
) {
    let (h, w) = (geom.input_size.y, geom.input_size.x);
    let content = geom.content_size();
    let border = geom.border;
    if content.x == 0 || content.y == 0 {
        return;
    }
    for b in 0..reg.batch() {
        let color: Option<[f32; IMAGE_CHANNELS]> = fade.map(|f| {
            let scalars = reg.scalars.data();
            [
                scalars[[f.0, b]],
                scalars[[f.0 + 1, b]],
                scalars[[f.0 + 2, b]],
            ]
        });
        let src = reg
            .images
            .data()
            .slice(s![input.0, b, .., ..h, ..w])
            .to_owned();
        let mut dst = reg
            .images
            .data_mut()
            .slice_mut(s![output.0, b, .., ..h, ..w]);
        let work: Vec<_> = dst.axis_iter_mut(Axis(1)).enumerate().collect();
        rows.map_rows(work, |(y, mut row)| {
            let sy = wrap(y, border.y, content.y);
            let dy = depth(y, border.y, content.y);
            for x in 0..w {
                let sx = wrap(x, border.x, content.x);
                let dx = depth(x, border.x, content.x);
                let mix = match color {
                    Some(_) if dy > 0 || dx > 0 => {
                        let py = if border.y > 0 { dy as f32 / border.y as f32 } else { 0.0 };
                        let px = if border.x > 0 { dx as f32 / border.x as f32 } else { 0.0 };
                        py.max(px).min(1.0)
                    }
                    _ => 0.0,
                };
                for c in 0..channels {
                    let v = src[[c, sy, sx]];
                    row[[c, x]] = match color {
                        Some(fc) => v + mix * (fc[c] - v),
                        None => v,
                    };
                }
            }
        });
    }
}

pub fn lms_opponents<M: RowMap>(
    reg: &mut BufferRegistry,
    input: ImageSlot,
    output: ImageSlot,
    gain: f32,
    geom: &Geometry,
    rows: &M,
) {
    let (h, w) = (geom.input_size.y, geom.input_size.x);
    for b in 0..reg.batch() {
        let src = reg
            .images
            .data()
            .slice(s![input.0, b, .., ..h, ..w])
            .to_owned();
        let mut dst = reg
            .images
            .data_mut()
            .slice_mut(s![output.0, b, .., ..h, ..w]);
        let work: Vec<_> = dst.axis_iter_mut(Axis(1)).enumerate().collect();
        rows.map_rows(work, |(y, mut row)| {
            for x in 0..w {
                let lms = srgb_to_lms(src[[0, y, x]], src[[1, y, x]], src[[2, y, x]]);
                let opp = opponents(lms, gain);
                for (c, v) in opp.into_iter().enumerate() {
                    row[[c, x]] = v;
                }
            }
        });
    }
}

pub fn lms_components<M: RowMap>(
    reg: &mut BufferRegistry,
    input: ImageSlot,
    red_green: ImageSlot,
    blue_yellow: ImageSlot,
    gain: f32,
    geom: &Geometry,
    rows: &M,
) {
    let (h, w) = (geom.input_size.y, geom.input_size.x);
    for b in 0..reg.batch() {
        let src = reg
            .images
            .data()
            .slice(s![input.0, b, .., ..h, ..w])
            .to_owned();
        let (mut rg, mut by) = reg.images.data_mut().multi_slice_mut((
            s![red_green.0, b, .., ..h, ..w],
            s![blue_yellow.0, b, .., ..h, ..w],
        ));
        let work: Vec<_> = rg
            .axis_iter_mut(Axis(1))
            .zip(by.axis_iter_mut(Axis(1)))
            .enumerate()
            .collect();
        rows.map_rows(work, |(y, (mut rg_row, mut by_row))| {
            for x in 0..w {
                let lms = srgb_to_lms(src[[0, y, x]], src[[1, y, x]], src[[2, y, x]]);
                let (lm, sy) = components(lms, gain);
                rg_row[[0, x]] = lm[0];
                rg_row[[1, x]] = lm[1];
                by_row[[0, x]] = sy[0];
                by_row[[1, x]] = sy[1];
            }
        });
    }
}
