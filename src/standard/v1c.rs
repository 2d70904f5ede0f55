// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! V1 complex-cell pipelines
//!
//! Simple cells are 4-angle Gabor responses, optionally sharpened by orthogonal
//! neighbor inhibition and KWTA. The complex stage pools them 2x2 and adds length
//! summation and end stopping. Output rows of the 4D result:
//!
//! ```text
//! 0      length sum
//! 1, 2   end stop (both directions along the line)
//! 3, 4   pooled simple cells (on, off)       grey, or color without split
//! 3..9   pooled simple cells per opponent    color with split: grey, red-green, blue-yellow
//! ```

use feagi_config::VisionConfig;
use feagi_vision_core::color::{edge_average, opponent};
use feagi_vision_core::ops::LINE_ANGLES;
use feagi_vision_core::{
    Dims2, FilterSlot, Geometry, ImageSlot, InhibSlot, KwtaParams, KwtaSlot, NeighInhib,
    Operation, Result, ScalarSlot, Value4DSlot, ValueSlot, VisionError, POLARITIES,
};
use feagi_vision_engine::VisionPipeline;
use ndarray::{s, ArrayView3, ArrayView4};

use super::{check_content, StandardPipeline};
use crate::settings;

/// 4D rows produced by [`V1cGrey`]
pub const V1C_ROWS_GREY: usize = 5;

/// Rows before the pooled simple cells
const COMPLEX_ROWS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct V1cParams {
    /// Simple-cell spacing; the complex stage always pools 2x2
    pub spacing: usize,
    /// Gabor convolution gain
    pub gain: f32,
    pub neigh_inhib: NeighInhib,
    /// Simple-cell competition; skipped when `kwta.on` is false
    pub kwta: KwtaParams,
}

impl Default for V1cParams {
    fn default() -> Self {
        Self {
            spacing: 4,
            gain: 2.0,
            neigh_inhib: NeighInhib::default(),
            kwta: KwtaParams::default(),
        }
    }
}

impl V1cParams {
    pub fn from_config(config: &VisionConfig) -> Self {
        Self {
            neigh_inhib: settings::neigh_inhib(&config.neigh_inhib),
            kwta: settings::kwta_params(&config.kwta),
            ..Self::default()
        }
    }
}

fn check_bank(bank: &ArrayView3<f32>) -> Result<Dims2> {
    let (n, y, x) = bank.dim();
    if n != LINE_ANGLES {
        return Err(VisionError::InvalidParameter(format!(
            "complex-cell rules need {} Gabor angles, got {}",
            LINE_ANGLES, n
        )));
    }
    Ok(Dims2::new(x, y))
}

/// Gabor convolution of one channel plus optional neighbor inhibition and KWTA
fn simple_cells(
    p: &mut VisionPipeline,
    params: &V1cParams,
    input: ImageSlot,
    channel: usize,
    filters: FilterSlot,
    geom: Geometry,
    competition: Option<(KwtaSlot, InhibSlot)>,
) -> Result<ValueSlot> {
    let size = geom.output_size;
    let drive = p.new_values(size, LINE_ANGLES)?;
    p.push(Operation::ConvolveImage {
        input,
        channel,
        filters,
        filter_count: LINE_ANGLES,
        gain: params.gain,
        output: drive,
        geom,
    })?;
    let Some((kwta, inhibs)) = competition else {
        return Ok(drive);
    };
    let ext_gi = if params.neigh_inhib.on {
        let ext = p.new_values(size, LINE_ANGLES)?;
        p.push(Operation::NeighInhib4 {
            input: drive,
            output: ext,
            size,
            gi: params.neigh_inhib.gi,
        })?;
        Some(ext)
    } else {
        None
    };
    let act = p.new_values(size, LINE_ANGLES)?;
    p.push(Operation::Kwta {
        input: drive,
        ext_gi,
        output: act,
        inhibs,
        params: kwta,
        size,
        features: LINE_ANGLES,
    })?;
    Ok(act)
}

/// KWTA parameter and inhibition slots shared by every simple-cell stage
fn competition(
    p: &mut VisionPipeline,
    params: &V1cParams,
    size: Dims2,
) -> Result<Option<(KwtaSlot, InhibSlot)>> {
    if !params.kwta.on {
        return Ok(None);
    }
    let inhibs = p.new_inhibs(size)?;
    Ok(Some((p.new_kwta(params.kwta), inhibs)))
}

/// Complex stage over `lines`, with each of `pooled` max-pooled into its own row pair
fn complex_cells(
    p: &mut VisionPipeline,
    simple: Dims2,
    lines: ValueSlot,
    pooled: &[ValueSlot],
) -> Result<(Geometry, Value4DSlot)> {
    let cgeom = Geometry::with_content(Dims2::splat(0), Dims2::splat(2), Dims2::splat(2), simple)?;
    let size = cgeom.output_size;
    let pool = |p: &mut VisionPipeline, input: ValueSlot, polarities: usize| -> Result<ValueSlot> {
        let output = p.new_values(size, LINE_ANGLES)?;
        p.push(Operation::MaxPool {
            input,
            output,
            input_size: simple,
            output_size: size,
            pool: Dims2::splat(2),
            spacing: Dims2::splat(2),
            polarities,
            features: LINE_ANGLES,
        })?;
        Ok(output)
    };

    let pooled_slots = pooled
        .iter()
        .map(|&input| pool(p, input, POLARITIES))
        .collect::<Result<Vec<_>>>()?;

    let merged = p.new_values(simple, LINE_ANGLES)?;
    p.push(Operation::MaxPolarity {
        input: lines,
        output: merged,
        size: simple,
        features: LINE_ANGLES,
    })?;
    let merged_pooled = pool(p, merged, 1)?;
    let len_sum = p.new_values(size, LINE_ANGLES)?;
    p.push(Operation::LenSum4 {
        input: merged_pooled,
        output: len_sum,
        size,
    })?;
    let end_stop = p.new_values(size, LINE_ANGLES)?;
    p.push(Operation::EndStop4 {
        input: merged_pooled,
        len_sum,
        output: end_stop,
        size,
    })?;

    let rows = COMPLEX_ROWS + POLARITIES * pooled.len();
    let out4 = p.new_values4d(size, Dims2::new(LINE_ANGLES, rows))?;
    let gather = [(len_sum, 1, 0), (end_stop, POLARITIES, 1)]
        .into_iter()
        .chain(
            pooled_slots
                .iter()
                .enumerate()
                .map(|(i, &slot)| (slot, POLARITIES, COMPLEX_ROWS + POLARITIES * i)),
        );
    for (input, polarities, row_offset) in gather {
        p.push(Operation::To4D {
            input,
            output: out4,
            size,
            polarities,
            features: LINE_ANGLES,
            row_offset,
        })?;
    }
    Ok((cgeom, out4))
}

/// Greyscale V1 complex-cell features
#[derive(Debug)]
pub struct V1cGrey {
    params: V1cParams,
    geom: Geometry,
    complex_geom: Geometry,
    pipeline: VisionPipeline,
    image: ImageSlot,
    simple: ValueSlot,
    output: Value4DSlot,
}

impl V1cGrey {
    /// Build the pipeline from a `[4][Y][X]` Gabor bank (angles 0, 45, 90, 135 degrees)
    pub fn configure(
        params: V1cParams,
        content: Dims2,
        batch: usize,
        gabor: ArrayView3<f32>,
    ) -> Result<Self> {
        let filter_size = check_bank(&gabor)?;
        let geom = Geometry::with_content(
            Dims2::splat(0),
            Dims2::splat(params.spacing),
            filter_size,
            content,
        )?;
        let mut p = VisionPipeline::new("v1c-grey", batch)?;
        let image = p.new_image(geom.input_size)?;
        let wrap = p.new_image(geom.input_size)?;
        let filters = p.new_filters(LINE_ANGLES, filter_size)?;
        p.set_filters(filters, gabor)?;

        p.push(Operation::WrapPad {
            input: image,
            output: wrap,
            channels: 1,
            geom,
        })?;
        let compete = competition(&mut p, &params, geom.output_size)?;
        let simple = simple_cells(&mut p, &params, wrap, 0, filters, geom, compete)?;
        let (complex_geom, output) = complex_cells(&mut p, geom.output_size, simple, &[simple])?;
        p.log_summary();

        Ok(Self {
            params,
            geom,
            complex_geom,
            pipeline: p,
            image,
            simple,
            output,
        })
    }

    pub fn params(&self) -> &V1cParams {
        &self.params
    }

    pub fn complex_geometry(&self) -> &Geometry {
        &self.complex_geom
    }

    pub fn set_image(&mut self, batch: usize, content: ArrayView3<f32>) -> Result<()> {
        check_content(&self.geom, &content, 1)?;
        self.pipeline.set_image(
            self.image,
            batch,
            content.slice(s![..1, .., ..]),
            self.geom.border,
        )
    }

    /// Simple-cell activity `[Y][X][polarity][angle]`
    pub fn simple(&self, batch: usize) -> Result<ArrayView4<'_, f32>> {
        self.pipeline.values(self.simple, batch)
    }

    /// `[poolY][poolX][row][angle]`
    pub fn output(&self, batch: usize) -> Result<ArrayView4<'_, f32>> {
        self.pipeline.values4d(self.output, batch)
    }
}

impl StandardPipeline for V1cGrey {
    fn pipeline(&self) -> &VisionPipeline {
        &self.pipeline
    }

    fn pipeline_mut(&mut self) -> &mut VisionPipeline {
        &mut self.pipeline
    }

    fn geometry(&self) -> &Geometry {
        &self.geom
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct V1cColorParams {
    pub v1c: V1cParams,
    /// Gain on the opponent channels
    pub color_gain: f32,
    /// Keep pooled simple cells of each opponent channel in separate rows
    pub split_color: bool,
}

impl Default for V1cColorParams {
    fn default() -> Self {
        Self {
            v1c: V1cParams::default(),
            color_gain: 8.0,
            split_color: true,
        }
    }
}

/// Color V1 complex-cell features over grey, red-green and blue-yellow opponents.
///
/// The image border fades toward the mean edge color of each input.
#[derive(Debug)]
pub struct V1cColor {
    params: V1cColorParams,
    geom: Geometry,
    complex_geom: Geometry,
    pipeline: VisionPipeline,
    image: ImageSlot,
    fade: ScalarSlot,
    output: Value4DSlot,
}

impl V1cColor {
    pub fn configure(
        params: V1cColorParams,
        content: Dims2,
        batch: usize,
        gabor: ArrayView3<f32>,
    ) -> Result<Self> {
        let filter_size = check_bank(&gabor)?;
        let v1c = &params.v1c;
        let geom = Geometry::with_content(
            Dims2::splat(0),
            Dims2::splat(v1c.spacing),
            filter_size,
            content,
        )?;
        let size = geom.output_size;
        let mut p = VisionPipeline::new("v1c-color", batch)?;
        let image = p.new_image(geom.input_size)?;
        let faded = p.new_image(geom.input_size)?;
        let lms = p.new_image(geom.input_size)?;
        let fade = p.new_scalars(3)?;
        let filters = p.new_filters(LINE_ANGLES, filter_size)?;
        p.set_filters(filters, gabor)?;

        p.push(Operation::FadePad {
            input: image,
            output: faded,
            channels: 3,
            fade,
            geom,
        })?;
        p.push(Operation::LmsOpponents {
            input: faded,
            output: lms,
            gain: params.color_gain,
            geom,
        })?;

        let compete = competition(&mut p, v1c, size)?;
        let mut simple = Vec::with_capacity(3);
        for channel in [opponent::GREY, opponent::RED_GREEN, opponent::BLUE_YELLOW] {
            simple.push(simple_cells(&mut p, v1c, lms, channel, filters, geom, compete)?);
        }
        let combined = p.new_values(size, LINE_ANGLES)?;
        p.push(Operation::MaxCopy {
            input_a: simple[0],
            input_b: simple[1],
            output: combined,
            size,
            features: LINE_ANGLES,
        })?;
        p.push(Operation::MaxCopy {
            input_a: simple[2],
            input_b: combined,
            output: combined,
            size,
            features: LINE_ANGLES,
        })?;

        let pooled: &[ValueSlot] = if params.split_color {
            &simple
        } else {
            std::slice::from_ref(&combined)
        };
        let (complex_geom, output) = complex_cells(&mut p, size, combined, pooled)?;
        p.log_summary();

        Ok(Self {
            params,
            geom,
            complex_geom,
            pipeline: p,
            image,
            fade,
            output,
        })
    }

    pub fn params(&self) -> &V1cColorParams {
        &self.params
    }

    pub fn complex_geometry(&self) -> &Geometry {
        &self.complex_geom
    }

    /// 4D rows of the output
    pub fn rows(&self) -> usize {
        if self.params.split_color {
            COMPLEX_ROWS + 3 * POLARITIES
        } else {
            V1C_ROWS_GREY
        }
    }

    /// Load RGB content for one batch entry and set its fade color
    pub fn set_image(&mut self, batch: usize, content: ArrayView3<f32>) -> Result<()> {
        check_content(&self.geom, &content, 3)?;
        let rgb = content.slice(s![..3, .., ..]);
        let color = edge_average(rgb, self.geom.filter_right.x);
        for (c, value) in color.into_iter().enumerate() {
            self.pipeline.set_scalar(self.fade.offset(c), batch, value)?;
        }
        self.pipeline
            .set_image(self.image, batch, rgb, self.geom.border)
    }

    /// Fade color `[r, g, b]` in effect for one batch entry
    pub fn fade_color(&self, batch: usize) -> Result<[f32; 3]> {
        Ok([
            self.pipeline.scalar(self.fade, batch)?,
            self.pipeline.scalar(self.fade.offset(1), batch)?,
            self.pipeline.scalar(self.fade.offset(2), batch)?,
        ])
    }

    /// `[poolY][poolX][row][angle]`
    pub fn output(&self, batch: usize) -> Result<ArrayView4<'_, f32>> {
        self.pipeline.values4d(self.output, batch)
    }
}

impl StandardPipeline for V1cColor {
    fn pipeline(&self) -> &VisionPipeline {
        &self.pipeline
    }

    fn pipeline_mut(&mut self) -> &mut VisionPipeline {
        &mut self.pipeline
    }

    fn geometry(&self) -> &Geometry {
        &self.geom
    }
}
