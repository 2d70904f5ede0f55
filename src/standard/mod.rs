// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Standard Pipelines
//!
//! Ready-made operation chains for the common feature sets:
//!
//! | Pipeline | Input | Output |
//! |---|---|---|
//! | [`DogGrey`] | grey | `[Y][X][polarity][1]` log DoG, max-normalized |
//! | [`DogColor`] | RGB | `[Y][X][polarity][2]` red-green / blue-yellow contrast |
//! | [`V1cGrey`] | grey | `[poolY][poolX][5][4]` complex-cell features |
//! | [`V1cColor`] | RGB | `[poolY][poolX][5 or 9][4]` complex-cell features |
//! | [`MotionDog`] | grey | full-field motion per direction, optional star map |
//!
//! Every pipeline takes caller-supplied kernels; the filter size is the kernel size.
//! Images are unpadded `[channel][Y][X]` content of the configured size.

mod dog;
mod motion;
mod v1c;

pub use dog::{DogColor, DogColorParams, DogGrey, DogGreyParams};
pub use motion::{MotionDog, MotionDogParams, MotionSignal};
pub use v1c::{V1cColor, V1cColorParams, V1cGrey, V1cParams, V1C_ROWS_GREY};

use feagi_vision_core::{Geometry, Result, VisionError};
use feagi_vision_engine::{ExecutionContext, RunStats, VisionPipeline};
use ndarray::ArrayView3;

/// Shared surface of the standard pipelines
pub trait StandardPipeline {
    fn pipeline(&self) -> &VisionPipeline;

    fn pipeline_mut(&mut self) -> &mut VisionPipeline;

    /// Geometry of the first filtering stage (its border pads the input image)
    fn geometry(&self) -> &Geometry;

    /// Bind to `ctx` (free when already bound) and run one frame
    fn run(&mut self, ctx: &mut ExecutionContext) -> Result<RunStats> {
        ctx.bind(self.pipeline())?;
        ctx.run(self.pipeline_mut())
    }
}

/// Content must match the configured size and carry at least `channels` channels
fn check_content(geom: &Geometry, content: &ArrayView3<f32>, channels: usize) -> Result<()> {
    let (c, y, x) = content.dim();
    let expected = geom.content_size();
    if c < channels || y != expected.y || x != expected.x {
        return Err(VisionError::ShapeMismatch(format!(
            "image content [{}][{}][{}] does not match [{}][{}][{}]",
            c, y, x, channels, expected.y, expected.x
        )));
    }
    Ok(())
}
