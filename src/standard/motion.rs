// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Full-field motion from DoG responses

use feagi_config::VisionConfig;
use feagi_vision_core::{
    Dims2, Geometry, ImageSlot, MotionDirection, MotionParams, Operation, Result, ScalarReduce,
    ScalarSlot, Value4DSlot, VisionError,
};
use feagi_vision_engine::VisionPipeline;
use ndarray::{s, ArrayView2, ArrayView3, ArrayView4, Axis};

use super::{check_content, StandardPipeline};
use crate::settings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionDogParams {
    pub spacing: usize,
    pub gain: f32,
    pub log_gain: f32,
    pub motion: MotionParams,
    /// Also gather the per-location star signals into a 4D output
    pub star: bool,
}

impl Default for MotionDogParams {
    fn default() -> Self {
        Self {
            spacing: 4,
            gain: 8.0,
            log_gain: 1.0,
            motion: MotionParams::default(),
            star: false,
        }
    }
}

impl MotionDogParams {
    pub fn from_config(config: &VisionConfig) -> Self {
        Self {
            motion: settings::motion_params(&config.motion),
            ..Self::default()
        }
    }
}

/// Integrated full-field motion of one batch entry
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionSignal {
    pub left: f32,
    pub right: f32,
    pub down: f32,
    pub up: f32,
    /// Integrated DoG energy the direction sums are normalized by
    pub energy: f32,
}

impl MotionSignal {
    /// Positive for net rightward motion
    pub fn horizontal(&self) -> f32 {
        self.right - self.left
    }

    /// Positive for net upward motion
    pub fn vertical(&self) -> f32 {
        self.up - self.down
    }

    pub fn direction(&self, dir: MotionDirection) -> f32 {
        match dir {
            MotionDirection::Left => self.left,
            MotionDirection::Right => self.right,
            MotionDirection::Down => self.down,
            MotionDirection::Up => self.up,
        }
    }
}

/// Frame-to-frame motion over a greyscale DoG map.
///
/// State carries across runs; call [`MotionDog::reset`] before a new sequence.
#[derive(Debug)]
pub struct MotionDog {
    params: MotionDogParams,
    geom: Geometry,
    pipeline: VisionPipeline,
    image: ImageSlot,
    full_field: ScalarSlot,
    integrated: ScalarSlot,
    star: Option<Value4DSlot>,
}

impl MotionDog {
    pub fn configure(
        params: MotionDogParams,
        content: Dims2,
        batch: usize,
        kernel: ArrayView2<f32>,
    ) -> Result<Self> {
        let taus = [
            params.motion.fast_tau,
            params.motion.slow_tau,
            params.motion.integ_tau,
        ];
        if !taus.iter().all(|&tau| tau > 0.0) {
            return Err(VisionError::InvalidParameter(format!(
                "motion time constants must be positive: {:?}",
                params.motion
            )));
        }
        let geom = Geometry::with_content(
            Dims2::splat(0),
            Dims2::splat(params.spacing),
            Dims2::new(kernel.ncols(), kernel.nrows()),
            content,
        )?;
        let size = geom.output_size;
        let motion = params.motion;
        let mut p = VisionPipeline::new("motion-dog", batch)?;
        let image = p.new_image(geom.input_size)?;
        let wrap = p.new_image(geom.input_size)?;
        let filters = p.new_filters(1, geom.filter_size)?;
        let dog = p.new_values(size, 1)?;
        let fast = p.new_values(size, 1)?;
        let slow = p.new_values(size, 1)?;
        let star = p.new_values(size, MotionDirection::COUNT)?;
        let full_field = p.new_scalars(MotionDirection::COUNT)?;
        let integrated = p.new_scalars(MotionDirection::COUNT + 1)?;
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
            output: dog,
            geom,
        })?;
        p.push(Operation::LogValues {
            input: dog,
            output: dog,
            size,
            features: 1,
            gain: params.log_gain,
        })?;
        let max = p.push_scalar_reduction(ScalarReduce::Max, dog, size, 1)?;
        p.push(Operation::NormDiv {
            scalar: max,
            input: dog,
            output: dog,
            size,
            features: 1,
        })?;
        let energy = p.push_scalar_reduction(ScalarReduce::Sum, dog, size, 1)?;
        p.push(Operation::MotionIntegrate {
            input: dog,
            fast,
            slow,
            size,
            features: 1,
            params: motion,
        })?;
        p.push(Operation::MotionStar {
            fast,
            slow,
            output: star,
            size,
            features: 1,
            params: motion,
        })?;
        p.push(Operation::MotionFullField {
            star,
            output: full_field,
            size,
            features: 1,
        })?;
        p.push(Operation::MotionNormalize {
            energy,
            full_field,
            integrated,
            params: motion,
        })?;

        let star4d = if params.star {
            let out4 = p.new_values4d(size, Dims2::new(MotionDirection::COUNT, 2))?;
            p.push(Operation::To4D {
                input: star,
                output: out4,
                size,
                polarities: 2,
                features: MotionDirection::COUNT,
                row_offset: 0,
            })?;
            Some(out4)
        } else {
            None
        };
        p.log_summary();

        Ok(Self {
            params,
            geom,
            pipeline: p,
            image,
            full_field,
            integrated,
            star: star4d,
        })
    }

    pub fn params(&self) -> &MotionDogParams {
        &self.params
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

    /// Zero integrators and full-field state for every batch entry
    pub fn reset(&mut self) {
        self.pipeline.zero_state();
    }

    /// This frame's un-normalized star sums, indexed by [`MotionDirection`]
    pub fn full_field(&self, batch: usize) -> Result<[f32; MotionDirection::COUNT]> {
        let mut out = [0.0; MotionDirection::COUNT];
        for dir in MotionDirection::ALL {
            out[dir as usize] = self
                .pipeline
                .scalar(self.full_field.offset(dir as usize), batch)?;
        }
        Ok(out)
    }

    /// Integrated, energy-normalized motion
    pub fn signal(&self, batch: usize) -> Result<MotionSignal> {
        let read = |i: usize| self.pipeline.scalar(self.integrated.offset(i), batch);
        Ok(MotionSignal {
            left: read(MotionDirection::Left as usize)?,
            right: read(MotionDirection::Right as usize)?,
            down: read(MotionDirection::Down as usize)?,
            up: read(MotionDirection::Up as usize)?,
            energy: read(MotionDirection::COUNT)?,
        })
    }

    /// `[Y][X][polarity][direction]` star map, when configured with `star`
    pub fn star(&self, batch: usize) -> Result<Option<ArrayView4<'_, f32>>> {
        self.star
            .map(|slot| self.pipeline.values4d(slot, batch))
            .transpose()
    }
}

impl StandardPipeline for MotionDog {
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
