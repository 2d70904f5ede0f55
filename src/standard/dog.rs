// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Difference-of-Gaussians pipelines

use feagi_config::VisionConfig;
use feagi_vision_core::color::component;
use feagi_vision_core::{
    Dims2, Geometry, ImageSlot, KwtaParams, Operation, Result, ScalarReduce, ValueSlot,
    VisionError,
};
use feagi_vision_engine::VisionPipeline;
use ndarray::{s, stack, ArrayView2, ArrayView3, ArrayView4, Axis};

use super::{check_content, StandardPipeline};
use crate::settings;

fn kernel_size(kernel: &ArrayView2<f32>) -> Dims2 {
    Dims2::new(kernel.ncols(), kernel.nrows())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DogGreyParams {
    pub spacing: usize,
    /// Convolution gain
    pub gain: f32,
    /// Gain inside `ln(1 + gain * v)`
    pub log_gain: f32,
}

impl Default for DogGreyParams {
    fn default() -> Self {
        Self {
            spacing: 4,
            gain: 8.0,
            log_gain: 1.0,
        }
    }
}

/// Greyscale DoG filtering, log compressed and divided by the frame maximum
#[derive(Debug)]
pub struct DogGrey {
    params: DogGreyParams,
    geom: Geometry,
    pipeline: VisionPipeline,
    image: ImageSlot,
    output: ValueSlot,
}

impl DogGrey {
    /// Build the pipeline around a single net (on minus off) kernel
    pub fn configure(
        params: DogGreyParams,
        content: Dims2,
        batch: usize,
        kernel: ArrayView2<f32>,
    ) -> Result<Self> {
        let geom = Geometry::with_content(
            Dims2::splat(0),
            Dims2::splat(params.spacing),
            kernel_size(&kernel),
            content,
        )?;
        let size = geom.output_size;
        let mut p = VisionPipeline::new("dog-grey", batch)?;
        let image = p.new_image(geom.input_size)?;
        let wrap = p.new_image(geom.input_size)?;
        let filters = p.new_filters(1, geom.filter_size)?;
        let output = p.new_values(size, 1)?;
        p.set_filters(filters, kernel.insert_axis(Axis(0)))?;

        p.push(Operation::WrapPad {
            input: image,
            output: wrap,
            channels: 1,
            geom,
        })?;
        p.push(Operation::ConvolveImage {
            input: wrap,
            channel: 0,
            filters,
            filter_count: 1,
            gain: params.gain,
            output,
            geom,
        })?;
        p.push(Operation::LogValues {
            input: output,
            output,
            size,
            features: 1,
            gain: params.log_gain,
        })?;
        let max = p.push_scalar_reduction(ScalarReduce::Max, output, size, 1)?;
        p.push(Operation::NormDiv {
            scalar: max,
            input: output,
            output,
            size,
            features: 1,
        })?;
        p.log_summary();

        Ok(Self {
            params,
            geom,
            pipeline: p,
            image,
            output,
        })
    }

    pub fn params(&self) -> &DogGreyParams {
        &self.params
    }

    /// Load grey content (channel 0 of `content`) for one batch entry
    pub fn set_image(&mut self, batch: usize, content: ArrayView3<f32>) -> Result<()> {
        check_content(&self.geom, &content, 1)?;
        self.pipeline.set_image(
            self.image,
            batch,
            content.slice(s![..1, .., ..]),
            self.geom.border,
        )
    }

    /// `[Y][X][polarity][1]`
    pub fn output(&self, batch: usize) -> Result<ArrayView4<'_, f32>> {
        self.pipeline.values(self.output, batch)
    }
}

impl StandardPipeline for DogGrey {
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
pub struct DogColorParams {
    pub spacing: usize,
    /// Gain on the cone components, which are weaker than grey
    pub lms_gain: f32,
    /// Gain on the on-minus-off difference
    pub gain: f32,
    /// Weight of the on-center term
    pub gain_on: f32,
    /// Contrast enhancement across the two color features; skipped when `kwta.on` is false
    pub kwta: KwtaParams,
}

impl Default for DogColorParams {
    fn default() -> Self {
        let mut kwta = KwtaParams::default();
        kwta.layer.on = false;
        kwta.pool.gi = 1.2;
        kwta.update();
        Self {
            spacing: 16,
            lms_gain: 8.0,
            gain: 1.0,
            gain_on: 1.0,
            kwta,
        }
    }
}

impl DogColorParams {
    /// Defaults with the iteration settings of the `[kwta]` section
    pub fn from_config(config: &VisionConfig) -> Self {
        let mut params = Self::default();
        let kwta = settings::kwta_params(&config.kwta);
        params.kwta.on = kwta.on;
        params.kwta.iters = kwta.iters;
        params.kwta.del_act_thr = kwta.del_act_thr;
        params.kwta.act_tau = kwta.act_tau;
        params.kwta.update();
        params
    }
}

/// Red-green and blue-yellow center-surround color contrast
#[derive(Debug)]
pub struct DogColor {
    params: DogColorParams,
    geom: Geometry,
    pipeline: VisionPipeline,
    image: ImageSlot,
    output: ValueSlot,
}

impl DogColor {
    /// Feature index of red vs. green contrast
    pub const RED_GREEN: usize = 0;
    /// Feature index of blue vs. yellow contrast
    pub const BLUE_YELLOW: usize = 1;

    /// Build the pipeline from on-center and off-surround kernels of equal size
    pub fn configure(
        params: DogColorParams,
        content: Dims2,
        batch: usize,
        on: ArrayView2<f32>,
        off: ArrayView2<f32>,
    ) -> Result<Self> {
        if on.dim() != off.dim() {
            return Err(VisionError::ShapeMismatch(format!(
                "on kernel {:?} and off kernel {:?} differ",
                on.dim(),
                off.dim()
            )));
        }
        let bank = stack(Axis(0), &[on, off])
            .map_err(|e| VisionError::ShapeMismatch(e.to_string()))?;
        let geom = Geometry::with_content(
            Dims2::splat(0),
            Dims2::splat(params.spacing),
            kernel_size(&on),
            content,
        )?;
        let size = geom.output_size;
        let mut p = VisionPipeline::new("dog-color", batch)?;
        let image = p.new_image(geom.input_size)?;
        let wrap = p.new_image(geom.input_size)?;
        let red_green = p.new_image(geom.input_size)?;
        let blue_yellow = p.new_image(geom.input_size)?;
        let filters = p.new_filters(2, geom.filter_size)?;
        let contrast = p.new_values(size, 2)?;
        p.set_filters(filters, bank.view())?;

        p.push(Operation::WrapPad {
            input: image,
            output: wrap,
            channels: 3,
            geom,
        })?;
        p.push(Operation::LmsComponents {
            input: wrap,
            red_green,
            blue_yellow,
            gain: params.lms_gain,
            geom,
        })?;
        for (feature, img, center, surround) in [
            (Self::RED_GREEN, red_green, component::RED, component::GREEN),
            (Self::BLUE_YELLOW, blue_yellow, component::BLUE, component::YELLOW),
        ] {
            p.push(Operation::ConvolveDiff {
                input_a: img,
                channel_a: center,
                input_b: img,
                channel_b: surround,
                filters,
                filter_a: 0,
                filter_b: 1,
                gain: params.gain,
                gain_on: params.gain_on,
                output: contrast,
                feature,
                geom,
            })?;
        }

        let mut output = contrast;
        if params.kwta.on {
            let inhibs = p.new_inhibs(size)?;
            let kwta = p.new_kwta(params.kwta);
            output = p.new_values(size, 2)?;
            p.push(Operation::Kwta {
                input: contrast,
                ext_gi: None,
                output,
                inhibs,
                params: kwta,
                size,
                features: 2,
            })?;
        }
        p.log_summary();

        Ok(Self {
            params,
            geom,
            pipeline: p,
            image,
            output,
        })
    }

    pub fn params(&self) -> &DogColorParams {
        &self.params
    }

    /// Load RGB content for one batch entry
    pub fn set_image(&mut self, batch: usize, content: ArrayView3<f32>) -> Result<()> {
        check_content(&self.geom, &content, 3)?;
        self.pipeline.set_image(
            self.image,
            batch,
            content.slice(s![..3, .., ..]),
            self.geom.border,
        )
    }

    /// `[Y][X][polarity][feature]`; polarity 0 means the first color is stronger
    pub fn output(&self, batch: usize) -> Result<ArrayView4<'_, f32>> {
        self.pipeline.values(self.output, batch)
    }
}

impl StandardPipeline for DogColor {
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
