// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Operations
//!
//! One variant per operator, each carrying only the slots and parameters it needs.
//! Operations are immutable once appended to a pipeline; per-frame inputs such as
//! the fade color travel through Scalars instead.
//!
//! Validation happens when an operation is appended: every slot must exist and its
//! shape hint must be large enough for the extents the operation touches. After
//! that the operator bodies index without bounds checks of their own.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VisionError};
use crate::geometry::{Dims2, Geometry};
use crate::motion::{MotionDirection, MotionParams};
use crate::registry::{
    ArenaKind, BufferRegistry, FilterSlot, ImageSlot, InhibSlot, KwtaSlot, ScalarSlot, SlotRef,
    Value4DSlot, ValueSlot, IMAGE_CHANNELS, POLARITIES,
};

/// Number of line orientations handled by the 4-angle operators
pub const LINE_ANGLES: usize = 4;

/// Reduction applied by `AggScalar` / `FinishScalar`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarReduce {
    Max,
    Sum,
    Mean,
}

/// Discriminant of [`Operation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    WrapPad,
    FadePad,
    LmsOpponents,
    LmsComponents,
    ConvolveImage,
    ConvolveDiff,
    LogValues,
    AggScalar,
    FinishScalar,
    NormDiv,
    NeighInhib4,
    Kwta,
    MaxPool,
    MaxPolarity,
    MaxCopy,
    LenSum4,
    EndStop4,
    To4D,
    MotionIntegrate,
    MotionStar,
    MotionFullField,
    MotionNormalize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Fill the border of `output` by wrapping content from the opposite side
    WrapPad {
        input: ImageSlot,
        output: ImageSlot,
        channels: usize,
        geom: Geometry,
    },
    /// Fill the border by fading wrapped content toward a per-batch color read
    /// from three consecutive scalars starting at `fade`
    FadePad {
        input: ImageSlot,
        output: ImageSlot,
        channels: usize,
        fade: ScalarSlot,
        geom: Geometry,
    },
    /// RGB → `[grey, red-green, blue-yellow]`
    LmsOpponents {
        input: ImageSlot,
        output: ImageSlot,
        gain: f32,
        geom: Geometry,
    },
    /// RGB → `[L, M]` and `[S, (L+M)/2]` images
    LmsComponents {
        input: ImageSlot,
        red_green: ImageSlot,
        blue_yellow: ImageSlot,
        gain: f32,
        geom: Geometry,
    },
    /// Apply `filter_count` kernels to one image channel
    ConvolveImage {
        input: ImageSlot,
        channel: usize,
        filters: FilterSlot,
        filter_count: usize,
        gain: f32,
        output: ValueSlot,
        geom: Geometry,
    },
    /// `gain * (gain_on * conv(A) - conv(B))` split into polarities, written to
    /// feature `feature` of `output`
    ConvolveDiff {
        input_a: ImageSlot,
        channel_a: usize,
        input_b: ImageSlot,
        channel_b: usize,
        filters: FilterSlot,
        filter_a: usize,
        filter_b: usize,
        gain: f32,
        gain_on: f32,
        output: ValueSlot,
        feature: usize,
        geom: Geometry,
    },
    /// `ln(1 + gain * v)`
    LogValues {
        input: ValueSlot,
        output: ValueSlot,
        size: Dims2,
        features: usize,
        gain: f32,
    },
    /// First reduction phase: one partial per row into `size.y` consecutive scalars
    AggScalar {
        reduce: ScalarReduce,
        input: ValueSlot,
        size: Dims2,
        features: usize,
        partials: ScalarSlot,
    },
    /// Second reduction phase over `count` partials
    FinishScalar {
        reduce: ScalarReduce,
        partials: ScalarSlot,
        count: usize,
        /// Element count divided out for `Mean`
        elements: usize,
        output: ScalarSlot,
    },
    /// Divide by a per-batch scalar (zero divisor yields zero)
    NormDiv {
        scalar: ScalarSlot,
        input: ValueSlot,
        output: ValueSlot,
        size: Dims2,
        features: usize,
    },
    /// Same-angle suppression from the two orthogonal neighbors, as external Gi
    NeighInhib4 {
        input: ValueSlot,
        output: ValueSlot,
        size: Dims2,
        gi: f32,
    },
    /// Pooled KWTA: `output` activations from `input` drive
    Kwta {
        input: ValueSlot,
        ext_gi: Option<ValueSlot>,
        output: ValueSlot,
        inhibs: InhibSlot,
        params: KwtaSlot,
        size: Dims2,
        features: usize,
    },
    MaxPool {
        input: ValueSlot,
        output: ValueSlot,
        input_size: Dims2,
        output_size: Dims2,
        /// Window extent
        pool: Dims2,
        /// Window step
        spacing: Dims2,
        polarities: usize,
        features: usize,
    },
    /// Max over the two polarities, written to polarity 0
    MaxPolarity {
        input: ValueSlot,
        output: ValueSlot,
        size: Dims2,
        features: usize,
    },
    /// Element-wise max of two value grids
    MaxCopy {
        input_a: ValueSlot,
        input_b: ValueSlot,
        output: ValueSlot,
        size: Dims2,
        features: usize,
    },
    /// Length summation along each of the 4 line angles
    LenSum4 {
        input: ValueSlot,
        output: ValueSlot,
        size: Dims2,
    },
    /// End stopping in both directions of each line angle
    EndStop4 {
        input: ValueSlot,
        len_sum: ValueSlot,
        output: ValueSlot,
        size: Dims2,
    },
    /// Gather `[Y][X][polarity][feature]` into rows `row_offset..` of a 4D output
    To4D {
        input: ValueSlot,
        output: Value4DSlot,
        size: Dims2,
        polarities: usize,
        features: usize,
        row_offset: usize,
    },
    /// One frame of fast/slow integration
    MotionIntegrate {
        input: ValueSlot,
        fast: ValueSlot,
        slow: ValueSlot,
        size: Dims2,
        features: usize,
        params: MotionParams,
    },
    /// Opponent star motion; output features are `features * 4`
    MotionStar {
        fast: ValueSlot,
        slow: ValueSlot,
        output: ValueSlot,
        size: Dims2,
        features: usize,
        params: MotionParams,
    },
    /// Sum star motion per direction into four consecutive scalars
    MotionFullField {
        star: ValueSlot,
        output: ScalarSlot,
        size: Dims2,
        features: usize,
    },
    /// Integrate full-field sums normalized by integrated energy into five
    /// consecutive scalars `[left, right, down, up, energy]`
    MotionNormalize {
        energy: ScalarSlot,
        full_field: ScalarSlot,
        integrated: ScalarSlot,
        params: MotionParams,
    },
}

impl Operation {
    pub fn kind(&self) -> OpKind {
        match self {
            Operation::WrapPad { .. } => OpKind::WrapPad,
            Operation::FadePad { .. } => OpKind::FadePad,
            Operation::LmsOpponents { .. } => OpKind::LmsOpponents,
            Operation::LmsComponents { .. } => OpKind::LmsComponents,
            Operation::ConvolveImage { .. } => OpKind::ConvolveImage,
            Operation::ConvolveDiff { .. } => OpKind::ConvolveDiff,
            Operation::LogValues { .. } => OpKind::LogValues,
            Operation::AggScalar { .. } => OpKind::AggScalar,
            Operation::FinishScalar { .. } => OpKind::FinishScalar,
            Operation::NormDiv { .. } => OpKind::NormDiv,
            Operation::NeighInhib4 { .. } => OpKind::NeighInhib4,
            Operation::Kwta { .. } => OpKind::Kwta,
            Operation::MaxPool { .. } => OpKind::MaxPool,
            Operation::MaxPolarity { .. } => OpKind::MaxPolarity,
            Operation::MaxCopy { .. } => OpKind::MaxCopy,
            Operation::LenSum4 { .. } => OpKind::LenSum4,
            Operation::EndStop4 { .. } => OpKind::EndStop4,
            Operation::To4D { .. } => OpKind::To4D,
            Operation::MotionIntegrate { .. } => OpKind::MotionIntegrate,
            Operation::MotionStar { .. } => OpKind::MotionStar,
            Operation::MotionFullField { .. } => OpKind::MotionFullField,
            Operation::MotionNormalize { .. } => OpKind::MotionNormalize,
        }
    }

    /// Slots read by this operation
    pub fn inputs(&self) -> Vec<SlotRef> {
        match self {
            Operation::WrapPad { input, .. }
            | Operation::LmsOpponents { input, .. }
            | Operation::LmsComponents { input, .. } => vec![input.slot_ref()],
            Operation::FadePad { input, fade, .. } => {
                let mut v = vec![input.slot_ref()];
                v.extend(scalar_range(*fade, IMAGE_CHANNELS));
                v
            }
            Operation::ConvolveImage { input, filters, .. } => {
                vec![input.slot_ref(), filters.slot_ref()]
            }
            Operation::ConvolveDiff {
                input_a,
                input_b,
                filters,
                ..
            } => vec![input_a.slot_ref(), input_b.slot_ref(), filters.slot_ref()],
            Operation::LogValues { input, .. }
            | Operation::AggScalar { input, .. }
            | Operation::NeighInhib4 { input, .. }
            | Operation::MaxPool { input, .. }
            | Operation::MaxPolarity { input, .. }
            | Operation::LenSum4 { input, .. }
            | Operation::To4D { input, .. } => vec![input.slot_ref()],
            Operation::FinishScalar {
                partials, count, ..
            } => scalar_range(*partials, *count).collect(),
            Operation::NormDiv { scalar, input, .. } => {
                vec![scalar.slot_ref(), input.slot_ref()]
            }
            Operation::Kwta { input, ext_gi, .. } => {
                let mut v = vec![input.slot_ref()];
                if let Some(e) = ext_gi {
                    v.push(e.slot_ref());
                }
                v
            }
            Operation::MaxCopy {
                input_a, input_b, ..
            } => vec![input_a.slot_ref(), input_b.slot_ref()],
            Operation::EndStop4 { input, len_sum, .. } => {
                vec![input.slot_ref(), len_sum.slot_ref()]
            }
            Operation::MotionIntegrate {
                input, fast, slow, ..
            } => vec![input.slot_ref(), fast.slot_ref(), slow.slot_ref()],
            Operation::MotionStar { fast, slow, .. } => vec![fast.slot_ref(), slow.slot_ref()],
            Operation::MotionFullField { star, .. } => vec![star.slot_ref()],
            Operation::MotionNormalize {
                energy,
                full_field,
                integrated,
                ..
            } => {
                let mut v = vec![energy.slot_ref()];
                v.extend(scalar_range(*full_field, MotionDirection::COUNT));
                v.extend(scalar_range(*integrated, MotionDirection::COUNT + 1));
                v
            }
        }
    }

    /// Slots written by this operation
    pub fn outputs(&self) -> Vec<SlotRef> {
        match self {
            Operation::WrapPad { output, .. }
            | Operation::FadePad { output, .. }
            | Operation::LmsOpponents { output, .. } => vec![output.slot_ref()],
            Operation::LmsComponents {
                red_green,
                blue_yellow,
                ..
            } => vec![red_green.slot_ref(), blue_yellow.slot_ref()],
            Operation::ConvolveImage { output, .. }
            | Operation::ConvolveDiff { output, .. }
            | Operation::LogValues { output, .. }
            | Operation::NormDiv { output, .. }
            | Operation::NeighInhib4 { output, .. }
            | Operation::MaxPool { output, .. }
            | Operation::MaxPolarity { output, .. }
            | Operation::MaxCopy { output, .. }
            | Operation::LenSum4 { output, .. }
            | Operation::EndStop4 { output, .. }
            | Operation::MotionStar { output, .. } => vec![output.slot_ref()],
            Operation::Kwta { output, inhibs, .. } => vec![output.slot_ref(), inhibs.slot_ref()],
            Operation::AggScalar { partials, size, .. } => {
                scalar_range(*partials, size.y).collect()
            }
            Operation::FinishScalar { output, .. } => vec![output.slot_ref()],
            Operation::To4D { output, .. } => vec![output.slot_ref()],
            Operation::MotionIntegrate { fast, slow, .. } => {
                vec![fast.slot_ref(), slow.slot_ref()]
            }
            Operation::MotionFullField { output, .. } => {
                scalar_range(*output, MotionDirection::COUNT).collect()
            }
            Operation::MotionNormalize { integrated, .. } => {
                scalar_range(*integrated, MotionDirection::COUNT + 1).collect()
            }
        }
    }

    /// Rows dispatched per batch entry
    pub fn run_count(&self) -> usize {
        match self {
            Operation::WrapPad { geom, .. }
            | Operation::FadePad { geom, .. }
            | Operation::LmsOpponents { geom, .. }
            | Operation::LmsComponents { geom, .. } => geom.input_size.y,
            Operation::ConvolveImage { geom, .. } | Operation::ConvolveDiff { geom, .. } => {
                geom.output_size.y
            }
            Operation::LogValues { size, .. }
            | Operation::AggScalar { size, .. }
            | Operation::NormDiv { size, .. }
            | Operation::NeighInhib4 { size, .. }
            | Operation::Kwta { size, .. }
            | Operation::MaxPolarity { size, .. }
            | Operation::MaxCopy { size, .. }
            | Operation::LenSum4 { size, .. }
            | Operation::EndStop4 { size, .. }
            | Operation::To4D { size, .. }
            | Operation::MotionIntegrate { size, .. }
            | Operation::MotionStar { size, .. }
            | Operation::MotionFullField { size, .. } => size.y,
            Operation::MaxPool { output_size, .. } => output_size.y,
            Operation::FinishScalar { .. } | Operation::MotionNormalize { .. } => 1,
        }
    }

    /// Output elements produced per batch entry; used for backend selection
    pub fn work_items(&self) -> usize {
        match self {
            Operation::WrapPad { geom, channels, .. }
            | Operation::FadePad { geom, channels, .. } => geom.input_size.area() * channels,
            Operation::LmsOpponents { geom, .. } | Operation::LmsComponents { geom, .. } => {
                geom.input_size.area() * IMAGE_CHANNELS
            }
            Operation::ConvolveImage {
                geom, filter_count, ..
            } => geom.output_size.area() * filter_count * geom.filter_size.area(),
            Operation::ConvolveDiff { geom, .. } => {
                geom.output_size.area() * 2 * geom.filter_size.area()
            }
            Operation::LogValues { size, features, .. }
            | Operation::AggScalar { size, features, .. }
            | Operation::NormDiv { size, features, .. }
            | Operation::MaxPolarity { size, features, .. }
            | Operation::MaxCopy { size, features, .. }
            | Operation::MotionIntegrate { size, features, .. }
            | Operation::MotionFullField { size, features, .. }
            | Operation::Kwta { size, features, .. } => size.area() * POLARITIES * features,
            Operation::MotionStar { size, features, .. } => {
                size.area() * POLARITIES * features * MotionDirection::COUNT
            }
            Operation::NeighInhib4 { size, .. }
            | Operation::LenSum4 { size, .. }
            | Operation::EndStop4 { size, .. } => size.area() * POLARITIES * LINE_ANGLES,
            Operation::MaxPool {
                output_size,
                pool,
                polarities,
                features,
                ..
            } => output_size.area() * pool.area() * polarities * features,
            Operation::To4D {
                size,
                polarities,
                features,
                ..
            } => size.area() * polarities * features,
            Operation::FinishScalar { count, .. } => *count,
            Operation::MotionNormalize { .. } => MotionDirection::COUNT + 1,
        }
    }

    /// Check every slot and extent against the registry
    pub fn validate(&self, reg: &BufferRegistry) -> Result<()> {
        for slot in self.inputs().into_iter().chain(self.outputs()) {
            reg.check(slot)?;
        }
        match self {
            Operation::WrapPad {
                input,
                output,
                channels,
                geom,
            }
            | Operation::FadePad {
                input,
                output,
                channels,
                geom,
                ..
            } => {
                distinct(input.slot_ref(), output.slot_ref())?;
                if *channels == 0 || *channels > IMAGE_CHANNELS {
                    return Err(VisionError::InvalidParameter(format!(
                        "padding channels must be 1..={}, got {}",
                        IMAGE_CHANNELS, channels
                    )));
                }
                image_fits(reg, *input, geom.input_size)?;
                image_fits(reg, *output, geom.input_size)
            }
            Operation::LmsOpponents {
                input,
                output,
                geom,
                ..
            } => {
                distinct(input.slot_ref(), output.slot_ref())?;
                image_fits(reg, *input, geom.input_size)?;
                image_fits(reg, *output, geom.input_size)
            }
            Operation::LmsComponents {
                input,
                red_green,
                blue_yellow,
                geom,
                ..
            } => {
                distinct(input.slot_ref(), red_green.slot_ref())?;
                distinct(input.slot_ref(), blue_yellow.slot_ref())?;
                distinct(red_green.slot_ref(), blue_yellow.slot_ref())?;
                image_fits(reg, *input, geom.input_size)?;
                image_fits(reg, *red_green, geom.input_size)?;
                image_fits(reg, *blue_yellow, geom.input_size)
            }
            Operation::ConvolveImage {
                input,
                channel,
                filters,
                filter_count,
                output,
                geom,
                ..
            } => {
                channel_ok(*channel)?;
                image_fits(reg, *input, geom.input_size)?;
                filters_fit(reg, *filters, *filter_count, geom.filter_size)?;
                values_fit(reg, *output, geom.output_size, *filter_count)
            }
            Operation::ConvolveDiff {
                input_a,
                channel_a,
                input_b,
                channel_b,
                filters,
                filter_a,
                filter_b,
                output,
                feature,
                geom,
                ..
            } => {
                channel_ok(*channel_a)?;
                channel_ok(*channel_b)?;
                image_fits(reg, *input_a, geom.input_size)?;
                image_fits(reg, *input_b, geom.input_size)?;
                filters_fit(reg, *filters, filter_a.max(filter_b) + 1, geom.filter_size)?;
                values_fit(reg, *output, geom.output_size, feature + 1)
            }
            Operation::LogValues {
                input,
                output,
                size,
                features,
                ..
            }
            | Operation::NormDiv {
                input,
                output,
                size,
                features,
                ..
            }
            | Operation::MaxPolarity {
                input,
                output,
                size,
                features,
            } => {
                values_fit(reg, *input, *size, *features)?;
                values_fit(reg, *output, *size, *features)
            }
            Operation::AggScalar {
                input,
                size,
                features,
                ..
            } => values_fit(reg, *input, *size, *features),
            Operation::FinishScalar {
                count, elements, reduce, ..
            } => {
                if *count == 0 {
                    return Err(VisionError::InvalidParameter(
                        "scalar reduction needs at least one partial".to_string(),
                    ));
                }
                if *reduce == ScalarReduce::Mean && *elements == 0 {
                    return Err(VisionError::InvalidParameter(
                        "mean reduction over zero elements".to_string(),
                    ));
                }
                Ok(())
            }
            Operation::NeighInhib4 {
                input,
                output,
                size,
                ..
            }
            | Operation::LenSum4 {
                input,
                output,
                size,
            } => {
                distinct(input.slot_ref(), output.slot_ref())?;
                values_fit(reg, *input, *size, LINE_ANGLES)?;
                values_fit(reg, *output, *size, LINE_ANGLES)
            }
            Operation::EndStop4 {
                input,
                len_sum,
                output,
                size,
            } => {
                distinct(input.slot_ref(), output.slot_ref())?;
                distinct(len_sum.slot_ref(), output.slot_ref())?;
                values_fit(reg, *input, *size, LINE_ANGLES)?;
                values_fit(reg, *len_sum, *size, LINE_ANGLES)?;
                values_fit(reg, *output, *size, LINE_ANGLES)
            }
            Operation::Kwta {
                input,
                ext_gi,
                output,
                inhibs,
                params,
                size,
                features,
            } => {
                distinct(input.slot_ref(), output.slot_ref())?;
                reg.kwta_params(*params)?;
                values_fit(reg, *input, *size, *features)?;
                values_fit(reg, *output, *size, *features)?;
                if let Some(e) = ext_gi {
                    distinct(e.slot_ref(), output.slot_ref())?;
                    values_fit(reg, *e, *size, *features)?;
                }
                let hint = reg.hint(inhibs.slot_ref()).unwrap_or(&[]);
                if hint.len() != 2 || size.y > hint[0] || size.x > hint[1] {
                    return Err(VisionError::ShapeMismatch(format!(
                        "inhibition slot {} {:?} cannot hold {} pools",
                        inhibs.0, hint, size
                    )));
                }
                Ok(())
            }
            Operation::MaxPool {
                input,
                output,
                input_size,
                output_size,
                pool,
                spacing,
                polarities,
                features,
            } => {
                distinct(input.slot_ref(), output.slot_ref())?;
                if spacing.x == 0 || spacing.y == 0 || pool.x == 0 || pool.y == 0 {
                    return Err(VisionError::InvalidParameter(format!(
                        "max pool window {} and spacing {} must be positive",
                        pool, spacing
                    )));
                }
                if *polarities == 0 || *polarities > POLARITIES {
                    return Err(VisionError::InvalidParameter(format!(
                        "polarities must be 1..={}, got {}",
                        POLARITIES, polarities
                    )));
                }
                let reach_y = output_size.y.saturating_sub(1) * spacing.y + pool.y;
                let reach_x = output_size.x.saturating_sub(1) * spacing.x + pool.x;
                if reach_y > input_size.y || reach_x > input_size.x {
                    return Err(VisionError::ShapeMismatch(format!(
                        "{} pools of {} at spacing {} overrun input {}",
                        output_size, pool, spacing, input_size
                    )));
                }
                values_fit(reg, *input, *input_size, *features)?;
                values_fit(reg, *output, *output_size, *features)
            }
            Operation::MaxCopy {
                input_a,
                input_b,
                output,
                size,
                features,
            } => {
                values_fit(reg, *input_a, *size, *features)?;
                values_fit(reg, *input_b, *size, *features)?;
                values_fit(reg, *output, *size, *features)
            }
            Operation::To4D {
                input,
                output,
                size,
                polarities,
                features,
                row_offset,
            } => {
                if *polarities == 0 || *polarities > POLARITIES {
                    return Err(VisionError::InvalidParameter(format!(
                        "polarities must be 1..={}, got {}",
                        POLARITIES, polarities
                    )));
                }
                values_fit(reg, *input, *size, *features)?;
                let hint = reg.hint(output.slot_ref()).unwrap_or(&[]);
                if hint.len() != 4
                    || size.y > hint[0]
                    || size.x > hint[1]
                    || row_offset + polarities > hint[2]
                    || *features > hint[3]
                {
                    return Err(VisionError::ShapeMismatch(format!(
                        "4D slot {} {:?} cannot hold rows {}..{} of {} features over {}",
                        output.0,
                        hint,
                        row_offset,
                        row_offset + polarities,
                        features,
                        size
                    )));
                }
                Ok(())
            }
            Operation::MotionIntegrate {
                input,
                fast,
                slow,
                size,
                features,
                params,
            } => {
                distinct(fast.slot_ref(), slow.slot_ref())?;
                distinct(input.slot_ref(), fast.slot_ref())?;
                distinct(input.slot_ref(), slow.slot_ref())?;
                motion_params_ok(params)?;
                values_fit(reg, *input, *size, *features)?;
                values_fit(reg, *fast, *size, *features)?;
                values_fit(reg, *slow, *size, *features)
            }
            Operation::MotionStar {
                fast,
                slow,
                output,
                size,
                features,
                ..
            } => {
                distinct(fast.slot_ref(), output.slot_ref())?;
                distinct(slow.slot_ref(), output.slot_ref())?;
                values_fit(reg, *fast, *size, *features)?;
                values_fit(reg, *slow, *size, *features)?;
                values_fit(reg, *output, *size, features * MotionDirection::COUNT)
            }
            Operation::MotionFullField {
                star,
                size,
                features,
                ..
            } => values_fit(reg, *star, *size, features * MotionDirection::COUNT),
            Operation::MotionNormalize { params, .. } => motion_params_ok(params),
        }
    }
}

fn scalar_range(first: ScalarSlot, count: usize) -> impl Iterator<Item = SlotRef> {
    (0..count).map(move |i| first.offset(i).slot_ref())
}

fn distinct(a: SlotRef, b: SlotRef) -> Result<()> {
    if a == b {
        return Err(VisionError::InvalidOperation(format!(
            "{} slot {} cannot be both read and written by this operation",
            a.arena, a.index
        )));
    }
    Ok(())
}

fn channel_ok(channel: usize) -> Result<()> {
    if channel >= IMAGE_CHANNELS {
        return Err(VisionError::InvalidParameter(format!(
            "image channel {} out of range (0..{})",
            channel, IMAGE_CHANNELS
        )));
    }
    Ok(())
}

fn motion_params_ok(params: &MotionParams) -> Result<()> {
    if params.fast_tau <= 0.0 || params.slow_tau <= 0.0 || params.integ_tau <= 0.0 {
        return Err(VisionError::InvalidParameter(format!(
            "motion time constants must be positive: {:?}",
            params
        )));
    }
    Ok(())
}

fn image_fits(reg: &BufferRegistry, slot: ImageSlot, size: Dims2) -> Result<()> {
    let hint = reg.hint(slot.slot_ref()).unwrap_or(&[]);
    if hint.len() != ArenaKind::Images.hint_len() || size.y > hint[0] || size.x > hint[1] {
        return Err(VisionError::ShapeMismatch(format!(
            "image slot {} {:?} smaller than {}",
            slot.0, hint, size
        )));
    }
    Ok(())
}

fn filters_fit(reg: &BufferRegistry, slot: FilterSlot, count: usize, size: Dims2) -> Result<()> {
    let hint = reg.hint(slot.slot_ref()).unwrap_or(&[]);
    if hint.len() != ArenaKind::Filters.hint_len()
        || count > hint[0]
        || size.y > hint[1]
        || size.x > hint[2]
    {
        return Err(VisionError::ShapeMismatch(format!(
            "filter slot {} {:?} cannot supply {} kernels of {}",
            slot.0, hint, count, size
        )));
    }
    Ok(())
}

fn values_fit(reg: &BufferRegistry, slot: ValueSlot, size: Dims2, features: usize) -> Result<()> {
    let hint = reg.hint(slot.slot_ref()).unwrap_or(&[]);
    if hint.len() != ArenaKind::Values.hint_len()
        || size.y > hint[0]
        || size.x > hint[1]
        || features > hint[2]
    {
        return Err(VisionError::ShapeMismatch(format!(
            "values slot {} {:?} cannot hold {} with {} features",
            slot.0, hint, size, features
        )));
    }
    Ok(())
}
