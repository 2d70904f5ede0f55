// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Operator Bodies
//!
//! Host implementations of every [`Operation`], written as "compute one output
//! row" closures handed to a [`RowMap`]. Each output element is written by exactly
//! one row, so sequential and threaded execution produce identical results.
//!
//! Inputs that live in the same arena as an output are snapshotted before the
//! output is borrowed mutably; this also makes in-place operations (same slot in
//! and out) well defined.

pub mod convolve;
pub mod image;
pub mod line;
pub mod motion;
pub mod pool;
pub mod values;

use crate::error::Result;
use crate::exec::RowMap;
use crate::inhibition::KwtaOutcome;
use crate::ops::Operation;
use crate::registry::BufferRegistry;

/// Execute one operation for every batch entry.
///
/// Returns the per-batch KWTA outcomes for `Kwta`, empty otherwise. The operation
/// must already have been validated against `reg`.
pub fn apply<M: RowMap>(
    op: &Operation,
    reg: &mut BufferRegistry,
    rows: &M,
) -> Result<Vec<KwtaOutcome>> {
    match op {
        Operation::WrapPad {
            input,
            output,
            channels,
            geom,
        } => image::pad(reg, *input, *output, *channels, None, geom, rows),
        Operation::FadePad {
            input,
            output,
            channels,
            fade,
            geom,
        } => image::pad(reg, *input, *output, *channels, Some(*fade), geom, rows),
        Operation::LmsOpponents {
            input,
            output,
            gain,
            geom,
        } => image::lms_opponents(reg, *input, *output, *gain, geom, rows),
        Operation::LmsComponents {
            input,
            red_green,
            blue_yellow,
            gain,
            geom,
        } => image::lms_components(reg, *input, *red_green, *blue_yellow, *gain, geom, rows),
        Operation::ConvolveImage {
            input,
            channel,
            filters,
            filter_count,
            gain,
            output,
            geom,
        } => convolve::convolve_image(
            reg,
            convolve::ImageConv {
                input: *input,
                channel: *channel,
                filters: *filters,
                filter_count: *filter_count,
                gain: *gain,
                output: *output,
            },
            geom,
            rows,
        ),
        Operation::ConvolveDiff {
            input_a,
            channel_a,
            input_b,
            channel_b,
            filters,
            filter_a,
            filter_b,
            gain,
            gain_on,
            output,
            feature,
            geom,
        } => convolve::convolve_diff(
            reg,
            convolve::DiffConv {
                input_a: *input_a,
                channel_a: *channel_a,
                input_b: *input_b,
                channel_b: *channel_b,
                filters: *filters,
                filter_a: *filter_a,
                filter_b: *filter_b,
                gain: *gain,
                gain_on: *gain_on,
                output: *output,
                feature: *feature,
            },
            geom,
            rows,
        ),
        Operation::LogValues {
            input,
            output,
            size,
            features,
            gain,
        } => {
            let gain = *gain;
            values::map_elementwise(reg, *input, *output, *size, *features, rows, |_| {
                move |v: f32| (1.0 + gain * v).ln()
            })
        }
        Operation::AggScalar {
            reduce,
            input,
            size,
            features,
            partials,
        } => values::agg_scalar(reg, *reduce, *input, *size, *features, *partials, rows),
        Operation::FinishScalar {
            reduce,
            partials,
            count,
            elements,
            output,
        } => values::finish_scalar(reg, *reduce, *partials, *count, *elements, *output),
        Operation::NormDiv {
            scalar,
            input,
            output,
            size,
            features,
        } => {
            let divisors: Vec<f32> = (0..reg.batch())
                .map(|b| reg.scalars.data()[[scalar.0, b]])
                .collect();
            values::map_elementwise(reg, *input, *output, *size, *features, rows, |b| {
                let d = divisors[b];
                move |v: f32| if d == 0.0 { 0.0 } else { v / d }
            })
        }
        Operation::NeighInhib4 {
            input,
            output,
            size,
            gi,
        } => line::neigh_inhib4(reg, *input, *output, *size, *gi, rows),
        Operation::Kwta {
            input,
            ext_gi,
            output,
            inhibs,
            params,
            size,
            features,
        } => {
            let params = *reg.kwta_params(*params)?;
            return Ok(values::kwta(
                reg, &params, *input, *ext_gi, *output, *inhibs, *size, *features, rows,
            ));
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
        } => pool::max_pool(
            reg,
            pool::PoolSpec {
                input: *input,
                output: *output,
                input_size: *input_size,
                output_size: *output_size,
                pool: *pool,
                spacing: *spacing,
                polarities: *polarities,
                features: *features,
            },
            rows,
        ),
        Operation::MaxPolarity {
            input,
            output,
            size,
            features,
        } => values::max_polarity(reg, *input, *output, *size, *features, rows),
        Operation::MaxCopy {
            input_a,
            input_b,
            output,
            size,
            features,
        } => values::max_copy(reg, *input_a, *input_b, *output, *size, *features, rows),
        Operation::LenSum4 {
            input,
            output,
            size,
        } => line::len_sum4(reg, *input, *output, *size, rows),
        Operation::EndStop4 {
            input,
            len_sum,
            output,
            size,
        } => line::end_stop4(reg, *input, *len_sum, *output, *size, rows),
        Operation::To4D {
            input,
            output,
            size,
            polarities,
            features,
            row_offset,
        } => values::to_4d(
            reg,
            *input,
            *output,
            *size,
            *polarities,
            *features,
            *row_offset,
            rows,
        ),
        Operation::MotionIntegrate {
            input,
            fast,
            slow,
            size,
            features,
            params,
        } => motion::integrate(reg, *input, *fast, *slow, *size, *features, params, rows),
        Operation::MotionStar {
            fast,
            slow,
            output,
            size,
            features,
            params,
        } => motion::star(reg, *fast, *slow, *output, *size, *features, params, rows),
        Operation::MotionFullField {
            star,
            output,
            size,
            features,
        } => motion::full_field(reg, *star, *output, *size, *features, rows),
        Operation::MotionNormalize {
            energy,
            full_field,
            integrated,
            params,
        } => motion::normalize(reg, *energy, *full_field, *integrated, params),
    }
    Ok(Vec::new())
}
